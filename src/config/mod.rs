//! Adapter settings and their persistence.
//!
//! This module provides settings management with XDG Base Directory
//! compliance.

pub mod settings;

pub use settings::{AdapterSettings, SettingsError, SettingsManager, get_config_path};
