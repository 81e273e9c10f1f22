//! Trigger file names: `<objectName>.<objectType>`, e.g. `usp_GetUser.P`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ssc_core::ObjectType;
use thiserror::Error;

/// A validated request to regenerate one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub object_name: String,
    pub object_type: ObjectType,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerParseError {
    #[error("trigger file name '{0}' is not of the form <object>.<type>")]
    Malformed(String),

    #[error("trigger file name '{file}' has unsupported object type '{type_code}'")]
    UnsupportedType { file: String, type_code: String },
}

impl TriggerEvent {
    /// Parse a staging file name. Requires exactly two non-empty
    /// dot-separated components and a known object type.
    pub fn parse(file_name: &str) -> Result<Self, TriggerParseError> {
        let malformed = || TriggerParseError::Malformed(file_name.to_string());
        let mut parts = file_name.split('.');
        let (Some(name), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        let (name, code) = (name.trim(), code.trim());
        if name.is_empty() || code.is_empty() {
            return Err(malformed());
        }
        let object_type = code.parse::<ObjectType>().map_err(|_| TriggerParseError::UnsupportedType {
            file: file_name.to_string(),
            type_code: code.to_string(),
        })?;
        Ok(Self { object_name: name.to_string(), object_type })
    }

    /// Parse the file-name component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, TriggerParseError> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => Self::parse(name),
            None => Err(TriggerParseError::Malformed(path.display().to_string())),
        }
    }
}

impl FromStr for TriggerEvent {
    type Err = TriggerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object_name, self.object_type)
    }
}

/// Dotfiles in the staging directory are never triggers.
pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
