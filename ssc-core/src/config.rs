//! Config file loading and saving.
//!
//! # File layout
//!
//! ```text
//! ssc.json                  { "settings": [ { "name": "dev", ... } ] }
//!   or
//! ssc.json                  { "settings": "ssc-connections.json" }
//! ssc-connections.json      { "settings": [ ... ] }
//! ```
//!
//! `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
//! A settings file path is resolved relative to the config file's directory.
//!
//! # API pattern
//!
//! `load_at(path)` / `save` take explicit paths; `load()` uses [`DEFAULT_CONFIG_FILE`]
//! in the working directory. Tests always use the `_at` form.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::Setting;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ssc.json";

/// Settings file written by `init` when connections are kept separately.
pub const DEFAULT_CONNECTIONS_FILE: &str = "ssc-connections.json";

/// Where a config document keeps its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsSource {
    Inline(Vec<Setting>),
    File(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigDocument {
    settings: SettingsSource,
    /// Keys ssc does not interpret, preserved on save.
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsDocument {
    settings: Vec<Setting>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

/// A loaded configuration. Holds enough of the on-disk shape to write it back.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    document: ConfigDocument,
    /// Resolved settings file when `settings` is a path.
    settings_file: Option<(PathBuf, SettingsDocument)>,
}

impl Config {
    /// Load `ssc.json` from the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load a config file, following a `settings` file reference if present.
    ///
    /// Returns `ConfigError::NotFound` if either file is absent,
    /// `ConfigError::Json`/`Yaml` (with path + line context) if malformed.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let document: ConfigDocument = read_document(path)?;
        let settings_file = match &document.settings {
            SettingsSource::Inline(_) => None,
            SettingsSource::File(reference) => {
                let resolved = resolve_relative(path, reference);
                let settings: SettingsDocument = read_document(&resolved)?;
                Some((resolved, settings))
            }
        };
        Ok(Self { path: path.to_path_buf(), document, settings_file })
    }

    /// Write a new config holding `setting` at `path`.
    ///
    /// With `settings_file`, the setting goes to that file (relative to the
    /// config's directory) and the config only references it. Fails with
    /// `ConfigError::AlreadyExists` when `path` exists, unless `force`.
    pub fn init_at(
        path: &Path,
        settings_file: Option<&Path>,
        setting: Setting,
        force: bool,
    ) -> Result<Self, ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::AlreadyExists { path: path.to_path_buf() });
        }
        let (document, settings_file) = match settings_file {
            Some(reference) => {
                let resolved = resolve_relative(path, reference);
                let settings = SettingsDocument { settings: vec![setting], extra: BTreeMap::new() };
                let document = ConfigDocument {
                    settings: SettingsSource::File(reference.to_path_buf()),
                    extra: BTreeMap::new(),
                };
                (document, Some((resolved, settings)))
            }
            None => {
                let document = ConfigDocument {
                    settings: SettingsSource::Inline(vec![setting]),
                    extra: BTreeMap::new(),
                };
                (document, None)
            }
        };
        let config = Self { path: path.to_path_buf(), document, settings_file };
        if let Some((resolved, settings)) = &config.settings_file {
            write_document(resolved, settings)?;
        }
        write_document(path, &config.document)?;
        Ok(config)
    }

    /// Path this config was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All settings in declaration order.
    pub fn settings(&self) -> &[Setting] {
        match (&self.document.settings, &self.settings_file) {
            (SettingsSource::Inline(settings), _) => settings,
            (SettingsSource::File(_), Some((_, doc))) => &doc.settings,
            (SettingsSource::File(_), None) => &[],
        }
    }

    /// Select a setting by case-insensitive name, or the first one when `name` is `None`.
    pub fn setting(&self, name: Option<&str>) -> Result<&Setting, ConfigError> {
        let settings = self.settings();
        let found = match name {
            Some(wanted) => settings
                .iter()
                .find(|s| s.name.0.eq_ignore_ascii_case(wanted)),
            None => settings.first(),
        };
        match (found, name) {
            (Some(setting), _) => Ok(setting),
            (None, None) => Err(ConfigError::NoSettings { path: self.path.clone() }),
            (None, Some(wanted)) => Err(ConfigError::SettingNotFound {
                name: wanted.to_string(),
                available: self.available_names(),
            }),
        }
    }

    /// Set `currentVersion` on the named (or first) setting and save.
    ///
    /// Returns the previous version.
    pub fn bump(&mut self, name: Option<&str>, new_version: &str) -> Result<String, ConfigError> {
        let index = {
            let selected = self.setting(name)?;
            self.settings()
                .iter()
                .position(|s| s.name == selected.name)
                .unwrap_or_default()
        };
        let target = match (&mut self.document.settings, &mut self.settings_file) {
            (_, Some((_, doc))) => doc.settings.get_mut(index),
            (SettingsSource::Inline(settings), None) => settings.get_mut(index),
            (SettingsSource::File(_), None) => None,
        };
        let previous = match target {
            Some(setting) => std::mem::replace(&mut setting.current_version, new_version.to_string()),
            None => return Err(ConfigError::NoSettings { path: self.path.clone() }),
        };
        self.save()?;
        Ok(previous)
    }

    /// Atomically write the config (and referenced settings file) back to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        match &self.settings_file {
            Some((path, doc)) => write_document(path, doc),
            None => write_document(&self.path, &self.document),
        }
    }

    fn available_names(&self) -> String {
        let names: Vec<&str> = self.settings().iter().map(|s| s.name.0.as_str()).collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn resolve_relative(config_path: &Path, reference: &Path) -> PathBuf {
    if reference.is_absolute() {
        return reference.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(reference),
        None => reference.to_path_buf(),
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound { path: path.to_path_buf() })
        }
        Err(e) => return Err(io_err(path, e)),
    };
    if is_yaml(path) {
        serde_yaml::from_str(&contents)
            .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })
    } else {
        serde_json::from_str(&contents)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })
    }
}

/// Serialize → `.tmp` sibling → `chmod 0600` → `rename`.
///
/// Settings carry passwords, hence the restrictive mode.
fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), ConfigError> {
    let contents = if is_yaml(path) {
        serde_yaml::to_string(doc)
            .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })?
    } else {
        let mut json = serde_json::to_string_pretty(doc)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        json.push('\n');
        json
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp_path, contents).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryTarget;
    use tempfile::TempDir;

    const INLINE: &str = r#"{
  "settings": [
    {
      "name": "Dev",
      "connection": { "server": "localhost", "database": "app", "user": "sa", "password": "pw" },
      "output": { "root": "./sql", "procs": "./procs", "functions": "./functions" },
      "currentVersion": "1.0.0"
    },
    {
      "name": "prod",
      "connection": { "server": "db01", "database": "app" },
      "currentVersion": "2.0.0"
    }
  ]
}"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write");
        path
    }

    fn scaffold() -> Setting {
        let connection = serde_json::from_str(r#"{"server":"localhost","database":"app"}"#)
            .expect("connection");
        Setting::scaffold("dev", connection, "/work", "0.0.1")
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().expect("tempdir");
        let path = write(dir.path(), "ssc.json", INLINE);
        let err = Config::init_at(&path, None, scaffold(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists { .. }), "got: {err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), INLINE);

        Config::init_at(&path, None, scaffold(), true).expect("forced");
        let config = Config::load_at(&path).expect("load");
        assert_eq!(config.settings().len(), 1);
        assert_eq!(config.setting(None).unwrap().current_version, "0.0.1");
    }

    #[test]
    fn init_with_connections_file_writes_reference() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ssc.json");
        Config::init_at(&path, Some(Path::new(DEFAULT_CONNECTIONS_FILE)), scaffold(), false)
            .expect("init");

        let top = std::fs::read_to_string(&path).unwrap();
        assert!(top.contains(DEFAULT_CONNECTIONS_FILE), "{top}");
        let config = Config::load_at(&path).expect("load");
        assert_eq!(config.setting(Some("DEV")).unwrap().output.procs, CategoryTarget::enabled("./procs"));
    }

    #[test]
    fn setting_lookup_is_case_insensitive() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::load_at(&write(dir.path(), "ssc.json", INLINE)).expect("load");
        assert_eq!(config.setting(Some("dev")).unwrap().name.0, "Dev");
        assert_eq!(config.setting(Some("PROD")).unwrap().current_version, "2.0.0");
    }

    #[test]
    fn no_name_selects_first_setting() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::load_at(&write(dir.path(), "ssc.json", INLINE)).expect("load");
        assert_eq!(config.setting(None).unwrap().name.0, "Dev");
    }

    #[test]
    fn unknown_name_lists_available() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::load_at(&write(dir.path(), "ssc.json", INLINE)).expect("load");
        let err = config.setting(Some("qa")).unwrap_err();
        assert!(matches!(err, ConfigError::SettingNotFound { .. }), "got: {err}");
        assert!(err.to_string().contains("Dev, prod"));
    }

    #[test]
    fn request_timeout_defaults_to_five_seconds() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::load_at(&write(dir.path(), "ssc.json", INLINE)).expect("load");
        let setting = config.setting(Some("prod")).unwrap();
        assert_eq!(setting.connection.request_timeout_ms, 5000);
    }

    #[test]
    fn settings_file_reference_resolves_next_to_config() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "ssc-connections.json", INLINE);
        let path = write(dir.path(), "ssc.json", r#"{ "settings": "ssc-connections.json" }"#);
        let config = Config::load_at(&path).expect("load");
        assert_eq!(config.settings().len(), 2);
    }

    #[test]
    fn bump_persists_to_settings_file() {
        let dir = TempDir::new().expect("tempdir");
        let settings_path = write(dir.path(), "ssc-connections.json", INLINE);
        let path = write(dir.path(), "ssc.json", r#"{ "settings": "ssc-connections.json" }"#);

        let mut config = Config::load_at(&path).expect("load");
        let previous = config.bump(Some("prod"), "2.1.0").expect("bump");
        assert_eq!(previous, "2.0.0");

        let raw = std::fs::read_to_string(&settings_path).expect("read");
        assert!(raw.contains("2.1.0"));
        let top = std::fs::read_to_string(&path).expect("read");
        assert!(top.contains("ssc-connections.json"), "reference must survive: {top}");
    }

    #[test]
    fn yaml_config_is_supported() {
        let dir = TempDir::new().expect("tempdir");
        let yaml = "settings:\n  - name: dev\n    connection:\n      server: localhost\n      database: app\n    currentVersion: '1.0'\n    output:\n      root: ./sql\n      views: false\n";
        let path = write(dir.path(), "ssc.yaml", yaml);
        let config = Config::load_at(&path).expect("load");
        let setting = config.setting(None).unwrap();
        assert!(!setting.output.views.is_enabled());
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().expect("tempdir");
        let path = write(dir.path(), "ssc.json", INLINE);
        let mut config = Config::load_at(&path).expect("load");
        config.bump(None, "1.0.1").expect("bump");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!dir.path().join("ssc.json.tmp").exists());
    }
}
