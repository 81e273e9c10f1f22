//! Watch mode: staging-directory watcher, trigger parsing, and the
//! single-writer regeneration lane.

mod error;
pub mod paths;
mod runtime;
pub mod trigger;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, process_trigger, run, spawn_regeneration_lane, start_blocking, RegenerationLane,
    WatchTarget,
};
pub use trigger::{TriggerEvent, TriggerParseError};
