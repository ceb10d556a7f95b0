//! Configuration consumed from the host runner.
//!
//! The engine owns none of this: the host resolves its own flags and config
//! files and hands a validated [`AcceptConfig`] to the session. The TOML
//! loading here exists for hosts that keep these settings in a config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::compare::CompareOptions;
use crate::session::CommitMode;
use crate::writer::WriteMode;

/// Session-wide settings: default comparison rules, when commits happen,
/// and where accepted output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcceptConfig {
    /// Default comparison options for examples that set none of their own.
    pub compare: CompareOptions,
    pub commit_mode: CommitMode,
    pub write_mode: WriteMode,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read accept config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse accept config TOML{}: {source}", path_suffix(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<AcceptConfig, ConfigError> {
    toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AcceptConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
