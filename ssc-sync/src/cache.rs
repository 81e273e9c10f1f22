//! Fingerprint cache: last-written fingerprint per artifact path.
//!
//! Persists a `CacheFile` JSON document at `<root>/.ssc/<setting>.json`.
//! Writes use the atomic `.tmp` + rename pattern of the config store.
//!
//! A reconciler reads the *previous* map and builds a *next* map; `write`
//! replaces the file with the next map wholesale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Directory under the output root holding ssc bookkeeping.
pub const STATE_DIR: &str = ".ssc";

/// Map of normalised artifact key to SHA-256 hex digest.
pub type Fingerprints = BTreeMap<String, String>;

/// On-disk cache payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheFile {
    pub synced_at: DateTime<Utc>,
    pub files: Fingerprints,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CacheCompat {
    Structured(CacheStructuredCompat),
    Legacy(Fingerprints),
}

#[derive(Debug, Deserialize)]
struct CacheStructuredCompat {
    pub synced_at: Option<DateTime<Utc>>,
    pub files: Fingerprints,
}

/// `<root>/.ssc/<setting>.json`
pub fn cache_path_at(root: &Path, setting_name: &str) -> PathBuf {
    root.join(STATE_DIR).join(format!("{setting_name}.json"))
}

#[derive(Debug, Clone)]
pub struct FingerprintCache {
    path: PathBuf,
    previous: Fingerprints,
    previous_synced_at: Option<DateTime<Utc>>,
    next: Fingerprints,
}

impl FingerprintCache {
    /// Load the cache at `path`.
    ///
    /// A missing file is an empty cache. A corrupt file is logged and treated
    /// as empty, so the next run reports every artifact as added.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (previous, previous_synced_at) = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<CacheCompat>(&contents) {
                Ok(CacheCompat::Structured(file)) => (file.files, file.synced_at),
                Ok(CacheCompat::Legacy(files)) => (files, None),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "fingerprint cache is corrupt; starting empty");
                    (Fingerprints::new(), None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Fingerprints::new(), None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "fingerprint cache is unreadable; starting empty");
                (Fingerprints::new(), None)
            }
        };
        Self { path, previous, previous_synced_at, next: Fingerprints::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the previous cache was written, if it recorded that.
    pub fn previous_synced_at(&self) -> Option<DateTime<Utc>> {
        self.previous_synced_at
    }

    /// Register or overwrite `key` in the next map.
    pub fn add(&mut self, key: impl Into<String>, fingerprint: impl Into<String>) {
        self.next.insert(key.into(), fingerprint.into());
    }

    /// `true` if `key` is absent from the previous map or its fingerprint differs.
    pub fn did_change(&self, key: &str, fingerprint: &str) -> bool {
        self.previous.get(key).map(String::as_str) != Some(fingerprint)
    }

    /// `true` if the previous map has an entry for `key`.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.previous.contains_key(key)
    }

    /// Copy the previous fingerprint for `key`, if any, into the next map.
    pub fn carry_forward(&mut self, key: &str) {
        if let Some(fp) = self.previous.get(key) {
            self.next.insert(key.to_string(), fp.clone());
        }
    }

    /// Copy every previous entry matching `keep` into the next map,
    /// without overwriting entries already added.
    pub fn carry_forward_where(&mut self, mut keep: impl FnMut(&str) -> bool) {
        for (key, fp) in &self.previous {
            if keep(key) {
                self.next.entry(key.clone()).or_insert_with(|| fp.clone());
            }
        }
    }

    /// Entries that `write` will persist.
    pub fn next(&self) -> &Fingerprints {
        &self.next
    }

    /// Atomically replace the cache file with the next map.
    pub fn write(&self) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid fingerprint cache path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let file = CacheFile { synced_at: Utc::now(), files: self.next.clone() };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}
