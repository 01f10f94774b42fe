//! YAML settings file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.partsync/
//!   settings.yaml   (mode 0600)
//! ```
//!
//! ```yaml
//! poll_interval_secs: 150
//! presence_interval_ms: 1000
//! host_processes: [kicad, kicad.exe]
//! repository:
//!   name: KiCadPartsLibrary
//!   local_path: /home/me/kicad-parts
//!   remote_name: origin
//! ```
//!
//! Intervals below their floors are raised on read: 30 s for
//! `poll_interval_secs`, 100 ms for `presence_interval_ms`.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{RepositoryTarget, DEFAULT_REMOTE};

pub const SETTINGS_FILE: &str = "settings.yaml";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 150;
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PRESENCE_INTERVAL_MS: u64 = 1000;
pub const MIN_PRESENCE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_REPOSITORY_NAME: &str = "parts-library";

/// Process names treated as "the host application is running".
pub fn default_host_processes() -> Vec<String> {
    vec!["kicad".to_string(), "kicad.exe".to_string()]
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_presence_interval")]
    pub presence_interval_ms: u64,

    #[serde(default = "default_host_processes")]
    pub host_processes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositorySettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Absolute, or relative to the directory holding `settings.yaml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_name: Option<String>,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_presence_interval() -> u64 {
    DEFAULT_PRESENCE_INTERVAL_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            presence_interval_ms: DEFAULT_PRESENCE_INTERVAL_MS,
            host_processes: default_host_processes(),
            repository: None,
        }
    }
}

impl Settings {
    /// Poll interval with the 30 s floor applied.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Presence sampling interval with the 100 ms floor applied.
    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms.max(MIN_PRESENCE_INTERVAL_MS))
    }

    /// Resolve the tracked repository.
    ///
    /// `base` is the directory relative `local_path` values are resolved
    /// against (normally the settings directory).
    pub fn repository_target(&self, base: &Path) -> Result<RepositoryTarget, ConfigError> {
        let repo = self
            .repository
            .as_ref()
            .ok_or(ConfigError::MissingField("repository"))?;

        let local_path = repo
            .local_path
            .as_ref()
            .ok_or(ConfigError::MissingField("repository.local_path"))?;
        if local_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "repository.local_path",
                reason: "must be a non-empty path".to_string(),
            });
        }
        let local_path = if local_path.is_absolute() {
            local_path.clone()
        } else {
            base.join(local_path)
        };

        let remote_name = repo
            .remote_name
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REMOTE);

        let name = repo
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_REPOSITORY_NAME);

        Ok(RepositoryTarget::new(name, local_path).with_remote(remote_name))
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.partsync/`
pub fn partsync_root(home: &Path) -> PathBuf {
    home.join(".partsync")
}

/// `<home>/.partsync/settings.yaml` — pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    partsync_root(home).join(SETTINGS_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings from `<home>/.partsync/settings.yaml`.
///
/// Returns `ConfigError::SettingsNotFound` if absent, `ConfigError::Parse`
/// (with path + line context) if malformed.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    load_file(&settings_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

/// Load a settings file from an explicit path.
pub fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::SettingsNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings and resolve the repository target in one step, the way every
/// job and status check does before touching git.
pub fn load_target_from(path: &Path) -> Result<RepositoryTarget, ConfigError> {
    let settings = load_file(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    settings.repository_target(base)
}

/// Atomically save settings: serialize → `.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<PathBuf, ConfigError> {
    let root = partsync_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = settings_path_at(home);
    let tmp_path = path.with_file_name(format!("{SETTINGS_FILE}.tmp"));

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, settings)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
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
