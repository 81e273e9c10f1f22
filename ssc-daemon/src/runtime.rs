use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use ssc_catalog::{fetch_object, Catalog, FetchedObject};
use ssc_core::Setting;
use ssc_renderer::Renderer;
use ssc_sync::{regenerate, RegenerateReport};

use crate::error::{io_err, DaemonError};
use crate::paths::{ensure_staging_dir, DEBOUNCE_RETENTION, DEBOUNCE_WINDOW, LANE_CAPACITY};
use crate::trigger::{is_hidden, TriggerEvent};

/// A setting to watch together with the catalog its triggers are fetched from.
#[derive(Clone)]
pub struct WatchTarget {
    pub setting: Setting,
    pub catalog: Arc<dyn Catalog>,
}

struct RegenerationJob {
    fetched: FetchedObject,
    respond_to: oneshot::Sender<Result<RegenerateReport, DaemonError>>,
}

/// Handle to a setting's single-writer lane. Jobs run one at a time in
/// submission order; each builds, finalizes, and merges before the next.
#[derive(Clone)]
pub struct RegenerationLane {
    tx: mpsc::Sender<RegenerationJob>,
}

impl RegenerationLane {
    /// Queue `fetched` for regeneration and wait for its outcome.
    pub async fn regenerate(&self, fetched: FetchedObject) -> Result<RegenerateReport, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(RegenerationJob {
                fetched,
                respond_to: tx,
            })
            .await
            .map_err(|_| DaemonError::ChannelClosed("regeneration queue"))?;

        rx.await
            .map_err(|_| DaemonError::ChannelClosed("regeneration response"))?
    }
}

/// Start watch mode and block the current thread until ctrl-c.
pub fn start_blocking(targets: Vec<WatchTarget>) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async move {
        let (shutdown_tx, _) = broadcast::channel::<()>(16);
        run(targets, shutdown_tx, None).await
    })
}

/// Watch every target's staging directory until `shutdown` fires.
///
/// Targets whose staging directory cannot be prepared are logged and
/// skipped. `ready` is signalled once every watcher is registered.
pub async fn run(
    targets: Vec<WatchTarget>,
    shutdown_tx: broadcast::Sender<()>,
    ready: Option<oneshot::Sender<()>>,
) -> Result<(), DaemonError> {
    let renderer = Arc::new(Renderer::new()?);
    let mut handles = Vec::new();
    let mut ready_rxs = Vec::new();

    for target in targets {
        let staging = match ensure_staging_dir(&target.setting) {
            Ok(staging) => staging,
            Err(err) => {
                tracing::error!(setting = %target.setting.name, error = %err, "cannot watch setting");
                continue;
            }
        };

        let (lane, lane_handle) = spawn_regeneration_lane(
            Arc::new(target.setting.clone()),
            renderer.clone(),
            shutdown_tx.subscribe(),
        );
        handles.push(("regeneration_lane", lane_handle));

        let (ready_tx, ready_rx) = oneshot::channel();
        ready_rxs.push(ready_rx);
        let watcher_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let result = watcher_task(target, staging, lane, shutdown_rx, ready_tx).await;
                let _ = shutdown.send(());
                result
            })
        };
        handles.push(("watcher", watcher_handle));
    }

    if handles.is_empty() {
        return Err(DaemonError::NothingToWatch);
    }

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping watch mode");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    for ready_rx in ready_rxs {
        let _ = ready_rx.await;
    }
    if let Some(ready) = ready {
        let _ = ready.send(());
    }

    let mut first_error = None;
    for (task, handle) in handles {
        if let Err(err) = handle_join(task, handle.await) {
            tracing::error!(task, error = %err, "task failed");
            first_error.get_or_insert(err);
        }
    }
    handle_join("signal_handler", signal_handle.await)?;
    first_error.map_or(Ok(()), Err)
}

/// Spawn the single-writer lane for `setting`.
pub fn spawn_regeneration_lane(
    setting: Arc<Setting>,
    renderer: Arc<Renderer>,
    shutdown_rx: broadcast::Receiver<()>,
) -> (RegenerationLane, JoinHandle<Result<(), DaemonError>>) {
    let (tx, rx) = mpsc::channel::<RegenerationJob>(LANE_CAPACITY);
    let handle = tokio::spawn(regeneration_lane_task(setting, renderer, rx, shutdown_rx));
    (RegenerationLane { tx }, handle)
}

async fn regeneration_lane_task(
    setting: Arc<Setting>,
    renderer: Arc<Renderer>,
    mut job_rx: mpsc::Receiver<RegenerationJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(RegenerationJob { fetched, respond_to }) = maybe_job else { break };

                let setting = setting.clone();
                let renderer = renderer.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    regenerate(&setting, &renderer, &fetched.object, &fetched.permissions)
                })
                .await;

                let outcome = match joined {
                    Ok(result) => result.map_err(DaemonError::from),
                    Err(err) => Err(DaemonError::Task(format!("regeneration join error: {err}"))),
                };
                let _ = respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn watcher_task(
    target: WatchTarget,
    staging: PathBuf,
    lane: RegenerationLane,
    mut shutdown_rx: broadcast::Receiver<()>,
    ready: oneshot::Sender<()>,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&staging, RecursiveMode::NonRecursive)?;
    tracing::info!(
        setting = %target.setting.name,
        staging = %staging.display(),
        "watching for trigger files",
    );
    let _ = ready.send(());

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };

                for path in event.paths {
                    if is_hidden(&path) {
                        continue;
                    }
                    match event.kind {
                        EventKind::Create(_) => {
                            if !path.is_file() || !should_process_event(&mut debounce, &path, Instant::now()) {
                                continue;
                            }
                            tokio::spawn(handle_trigger(target.clone(), lane.clone(), path));
                        }
                        EventKind::Modify(_) => {
                            tracing::debug!(path = %path.display(), "staging file changed");
                        }
                        EventKind::Remove(_) => {
                            forget_event(&mut debounce, &path);
                            tracing::info!(path = %path.display(), "staging file removed");
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_trigger(target: WatchTarget, lane: RegenerationLane, path: PathBuf) {
    match process_trigger(&target, &lane, &path).await {
        Ok(report) => tracing::info!(
            setting = %target.setting.name,
            stats = %report.stats,
            bundle = %report.merge.path.display(),
            fragments = report.merge.fragments,
            "regeneration complete",
        ),
        Err(DaemonError::Trigger(err)) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring staging file");
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "trigger abandoned");
        }
    }
}

/// Handle one trigger file: parse its name, fetch the object and its grants
/// in one catalog session, delete the file, then regenerate through `lane`.
///
/// A malformed name fails before any session is opened and leaves the file
/// in place. So does a failed fetch.
pub async fn process_trigger(
    target: &WatchTarget,
    lane: &RegenerationLane,
    path: &Path,
) -> Result<RegenerateReport, DaemonError> {
    let event = TriggerEvent::from_path(path)?;
    tracing::info!(setting = %target.setting.name, trigger = %event, "trigger received");

    let fetched = fetch_object(
        target.catalog.as_ref(),
        event.object_type,
        &event.object_name,
        target.setting.connection.request_timeout(),
    )
    .await?;

    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %err, "failed to delete trigger file");
    }

    lane.regenerate(fetched).await
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= DEBOUNCE_RETENTION);
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

/// A removed trigger may be re-created at once; the next create must not be
/// swallowed by the window of the one it replaced.
fn forget_event(debounce: &mut HashMap<PathBuf, Instant>, path: &Path) {
    debounce.remove(path);
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global `tracing` subscriber (`RUST_LOG`, default `info`) on
/// stderr. Repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
