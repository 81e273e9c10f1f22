//! # ssc-sync
//!
//! Fingerprint-gated reconciliation of generated SQL artifacts.
//!
//! Call [`pull`] to regenerate the current tree from a catalog snapshot,
//! [`regenerate`] to rewrite a single object (watch mode, `pull-single`), or
//! [`merge_version`] to rebuild a version bundle.

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod merge;
pub mod pipeline;
pub mod reconciler;
pub mod writer;

pub use cache::FingerprintCache;
pub use error::SyncError;
pub use merge::{bundle_path, merge_version, MergeReport};
pub use pipeline::{artifact_name, pull, regenerate, PullReport, RegenerateReport};
pub use reconciler::{
    category_map, CategoryMap, Mode, OutputReconciler, ReconciliationStats, Tree, WriteOutcome,
};
