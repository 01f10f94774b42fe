//! Error types for partsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Missing or invalid settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading or writing the settings file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and serde_yaml line context.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No settings file at the expected location.
    #[error("settings not found at {path}")]
    SettingsNotFound { path: PathBuf },

    /// A required key is absent.
    #[error("missing '{0}' in settings")]
    MissingField(&'static str),

    /// A key is present but unusable.
    #[error("invalid '{field}' in settings: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A message could not be handed to the control task (its queue is closed).
#[derive(Debug, Error)]
#[error("control queue unreachable while delivering {0}")]
pub struct DispatchError(pub &'static str);

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
