//! Adapter settings with XDG Base Directory compliance.
//!
//! Timing constants for discovery, throttling and artwork live here so a
//! host update that shifts them does not require a rebuild.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::PathBuf,
    time::Duration,
};

use {
    parking_lot::{RwLock, RwLockReadGuard},
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

/// Error type for settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read or write settings file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize settings.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid settings value.
    #[error("Invalid settings value: {reason}")]
    InvalidValue { reason: String },
}

/// Serializable adapter settings with default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Selector of the host's root DOM element.
    pub root_selector: String,
    /// Give up on store discovery after this many milliseconds.
    pub locate_timeout_ms: u64,
    /// Interval between store discovery attempts.
    pub locate_poll_interval_ms: u64,
    /// Minimum spacing of throttled timeline events.
    pub timeline_throttle_ms: u64,
    /// How long a locally issued pause overrides a lagging "playing" snapshot.
    pub optimistic_pause_grace_ms: u64,
    /// Edge length in pixels requested from the image proxy.
    pub cover_size: u32,
    /// JPEG quality requested from the image proxy (1-100).
    pub cover_quality: u8,
    /// Timeout for a single artwork request.
    pub cover_timeout_ms: u64,
    /// Whether resolved artwork is transcoded into an embedded data URL.
    pub embed_covers: bool,
    /// Whether the system media controls are fed.
    pub smtc_enabled: bool,
    /// Whether the presence channel is fed.
    pub discord_rpc_enabled: bool,
    /// Log level forwarded to the native side.
    pub log_level: String,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            root_selector: "#root".to_string(),
            locate_timeout_ms: 10_000,
            locate_poll_interval_ms: 100,
            timeline_throttle_ms: 1_000,
            optimistic_pause_grace_ms: 3_000,
            cover_size: 500,
            cover_quality: 90,
            cover_timeout_ms: 10_000,
            embed_covers: true,
            smtc_enabled: true,
            discord_rpc_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

impl AdapterSettings {
    /// Checks every value against its permitted range.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |reason: &str| SettingsError::InvalidValue {
            reason: reason.to_string(),
        };

        if self.root_selector.trim().is_empty() {
            return Err(invalid("root_selector must not be empty"));
        }
        if self.locate_poll_interval_ms == 0 {
            return Err(invalid("locate_poll_interval_ms must be positive"));
        }
        if self.locate_timeout_ms < self.locate_poll_interval_ms {
            return Err(invalid(
                "locate_timeout_ms must not be shorter than the poll interval",
            ));
        }
        if self.timeline_throttle_ms == 0 {
            return Err(invalid("timeline_throttle_ms must be positive"));
        }
        if self.cover_size == 0 {
            return Err(invalid("cover_size must be positive"));
        }
        if !(1..=100).contains(&self.cover_quality) {
            return Err(invalid("cover_quality must be within 1..=100"));
        }
        Ok(())
    }

    /// Store discovery timeout.
    #[must_use]
    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    /// Store discovery poll interval.
    #[must_use]
    pub fn locate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.locate_poll_interval_ms)
    }

    /// Timeline throttle window.
    #[must_use]
    pub fn timeline_throttle(&self) -> Duration {
        Duration::from_millis(self.timeline_throttle_ms)
    }

    /// Optimistic pause grace window.
    #[must_use]
    pub fn optimistic_pause_grace(&self) -> Duration {
        Duration::from_millis(self.optimistic_pause_grace_ms)
    }

    /// Artwork request timeout.
    #[must_use]
    pub fn cover_timeout(&self) -> Duration {
        Duration::from_millis(self.cover_timeout_ms)
    }
}

/// Handles loading, saving, and validation of adapter settings.
#[derive(Debug)]
pub struct SettingsManager {
    /// Thread-safe settings storage.
    settings: RwLock<AdapterSettings>,
    /// Path to the configuration file on disk.
    config_path: PathBuf,
}

impl SettingsManager {
    /// Creates a new settings manager with the default config path.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if settings cannot be loaded from disk.
    pub fn new() -> Result<Self, SettingsError> {
        Self::with_config_path(get_config_path())
    }

    /// Creates a new settings manager with a custom config path.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Custom path for the settings file
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file exists but cannot be read, parsed
    /// or validated.
    pub fn with_config_path(config_path: PathBuf) -> Result<Self, SettingsError> {
        if let Some(parent) = config_path.parent() {
            create_dir_all(parent)?;
        }

        let settings = if config_path.exists() {
            debug!(path = ?config_path, "Loading adapter settings");
            let contents = read_to_string(&config_path)?;
            let settings: AdapterSettings = from_str(&contents)?;
            settings.validate()?;
            settings
        } else {
            debug!(path = ?config_path, "No settings file, using defaults");
            AdapterSettings::default()
        };

        Ok(SettingsManager {
            settings: RwLock::new(settings),
            config_path,
        })
    }

    /// Gets the current settings.
    pub fn get_settings(&self) -> RwLockReadGuard<'_, AdapterSettings> {
        self.settings.read()
    }

    /// Gets a copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> AdapterSettings {
        self.settings.read().clone()
    }

    /// Gets the configuration file path.
    pub fn get_config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Validates, applies and persists new settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if validation fails or the file cannot be written.
    /// Invalid settings are never applied.
    pub fn update_settings(&self, new_settings: AdapterSettings) -> Result<(), SettingsError> {
        new_settings.validate()?;
        *self.settings.write() = new_settings;
        self.save_settings()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        debug!(path = ?self.config_path, "Saving adapter settings");
        let contents = to_string_pretty(&*self.settings.read())?;
        write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Path of the settings file inside the XDG config directory.
#[must_use]
pub fn get_config_path() -> PathBuf {
    let mut config_dir = get_xdg_config_home();
    config_dir.push("inflink");
    config_dir.push("settings.json");
    config_dir
}

/// Uses `XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
fn get_xdg_config_home() -> PathBuf {
    if let Ok(config_home) = var("XDG_CONFIG_HOME")
        && !config_home.is_empty()
    {
        return PathBuf::from(config_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        return path;
    }

    PathBuf::from(".")
}
