//! Shared entrypoints used by CLI and daemon: batch pull and single-object
//! regeneration.

use std::collections::BTreeSet;

use ssc_core::{Category, CatalogSnapshot, ObjectType, Setting, SqlObject, SqlPermission};
use ssc_renderer::{RenderError, Renderer};

use crate::error::SyncError;
use crate::merge::{merge_version, MergeReport};
use crate::reconciler::{Mode, OutputReconciler, ReconciliationStats, Tree};

/// Artifact file name: `{name}.sql` for procedures, `{schema}.{name}.sql` otherwise.
pub fn artifact_name(object: &SqlObject, object_type: ObjectType) -> String {
    match object_type {
        ObjectType::Procedure => format!("{}.sql", object.name),
        _ => format!("{}.{}.sql", object.schema, object.name),
    }
}

/// Outcome of a batch pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub stats: ReconciliationStats,
    /// Rows with object types ssc does not write.
    pub skipped: usize,
    /// Objects that failed to render or write; their old artifacts are kept.
    pub failed: usize,
}

/// Regenerate the current tree from a full catalog snapshot.
///
/// Runs one full reconciliation: artifacts no longer in the catalog are removed.
/// Data scripts are written only for tables the setting lists.
pub fn pull(
    setting: &Setting,
    renderer: &Renderer,
    snapshot: &CatalogSnapshot,
) -> Result<PullReport, SyncError> {
    let tree = Tree::Current;
    let mut reconciler =
        OutputReconciler::for_setting(setting, Category::all(), &[tree.clone()], Mode::Full);
    let mut report = PullReport::default();

    let mut objects: Vec<(&SqlObject, ObjectType)> = Vec::new();
    for object in &snapshot.objects {
        match object.object_type() {
            Some(object_type) => objects.push((object, object_type)),
            None => {
                tracing::debug!(object = %object.name, type_code = %object.type_code.trim(), "skipping unsupported object type");
                report.skipped += 1;
            }
        }
    }
    objects.sort_by(|a, b| (&a.0.schema, &a.0.name).cmp(&(&b.0.schema, &b.0.name)));

    let schemas: BTreeSet<&str> = objects
        .iter()
        .map(|(o, _)| o.schema.as_str())
        .chain(snapshot.tables.iter().map(|t| t.schema.as_str()))
        .chain(snapshot.types.iter().map(|t| t.schema.as_str()))
        .collect();
    for schema in schemas {
        let name = format!("{schema}.sql");
        let rendered = renderer.render_schema(schema);
        emit(&mut reconciler, &mut report, &tree, Category::Schemas, &name, rendered);
    }

    for table in &snapshot.tables {
        let name = format!("{}.{}.sql", table.schema, table.name);
        let rendered = renderer.render_table(table, snapshot, setting);
        emit(&mut reconciler, &mut report, &tree, Category::Tables, &name, rendered);
    }

    for ty in &snapshot.types {
        let name = format!("{}.{}.sql", ty.schema, ty.name);
        let rendered = renderer.render_type(ty, &snapshot.columns, setting);
        emit(&mut reconciler, &mut report, &tree, Category::Types, &name, rendered);
    }

    for (object, object_type) in objects {
        let name = artifact_name(object, object_type);
        let rendered = renderer.render_artifact(object, &snapshot.permissions, setting);
        emit(&mut reconciler, &mut report, &tree, object_type.category(), &name, rendered);
    }

    for data in snapshot.data.iter().filter(|d| setting.exports_data(&d.schema, &d.name)) {
        let name = format!("{}.{}.sql", data.schema, data.name);
        let rendered = renderer.render_data(data, setting);
        emit(&mut reconciler, &mut report, &tree, Category::Data, &name, rendered);
    }

    for job in &snapshot.jobs {
        let name = format!("{}.sql", job.name);
        let rendered =
            renderer.render_job(job, &snapshot.job_steps, &snapshot.job_schedules, setting);
        emit(&mut reconciler, &mut report, &tree, Category::Jobs, &name, rendered);
    }

    report.stats = reconciler.finalize();
    tracing::info!(setting = %setting.name, stats = %report.stats, "pull complete");
    Ok(report)
}

/// Write one rendered artifact. A render or write failure keeps the old file.
fn emit(
    reconciler: &mut OutputReconciler,
    report: &mut PullReport,
    tree: &Tree,
    category: Category,
    name: &str,
    rendered: Result<String, RenderError>,
) {
    let written = rendered
        .map_err(SyncError::from)
        .and_then(|content| reconciler.write(tree, category, name, &content));
    if let Err(e) = written {
        tracing::warn!(%category, artifact = name, error = %e, "failed to write artifact");
        reconciler.retain(tree, category, name);
        report.failed += 1;
    }
}

/// Outcome of a single-object regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateReport {
    pub stats: ReconciliationStats,
    pub merge: MergeReport,
}

/// Regenerate one object under the current tree and the current version's
/// tree, then rebuild the version bundle.
///
/// Nothing is pruned. Fails without merging if either write fails.
pub fn regenerate(
    setting: &Setting,
    renderer: &Renderer,
    object: &SqlObject,
    permissions: &[SqlPermission],
) -> Result<RegenerateReport, SyncError> {
    let object_type = object.object_type().ok_or_else(|| SyncError::UnsupportedType {
        name: object.name.clone(),
        type_code: object.type_code.trim().to_string(),
    })?;
    let content = renderer.render_artifact(object, permissions, setting)?;
    let category = object_type.category();
    let name = artifact_name(object, object_type);
    let version = setting.current_version.clone();
    let trees = [Tree::Version(version.clone()), Tree::Current];

    let mut reconciler = OutputReconciler::for_setting(setting, &[category], &trees, Mode::Targeted);
    let mut failed = 0;
    for tree in &trees {
        if let Err(e) = reconciler.write(tree, category, &name, &content) {
            tracing::error!(object = %object.name, ?tree, error = %e, "failed to write artifact");
            failed += 1;
        }
    }
    let stats = reconciler.finalize();
    if failed > 0 {
        return Err(SyncError::WritesFailed { name: object.name.clone(), failed });
    }

    let merge = merge_version(setting, renderer, &version)?;
    tracing::info!(object = %object.name, %stats, "regenerated");
    Ok(RegenerateReport { stats, merge })
}
