//! Inflink - media-session bridge for a desktop music client.
//!
//! Discovers the client's internal state container, normalizes two
//! incompatible host API generations into one canonical playback model,
//! and relays that model to a native transport-control component. Commands
//! flow the other way: canonical requests become host actions.

pub mod adapter;
pub mod artwork;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod locator;
pub mod logging;
pub mod model;
pub mod sync;

// Re-export key types for convenience
pub use {
    adapter::MediaAdapter,
    bridge::{BridgeCommand, ControlRequest, NativeBridge, Relay},
    config::{AdapterSettings, SettingsManager},
    error::{AdapterError, BridgeError, LocatorError, Result},
    host::{HostEnvironment, HostVersion},
    logging::{LoggingHandle, init_logging},
    model::{
        AdapterCommand, AdapterEvent, PlayMode, PlaybackStatus, RepeatMode, SongInfo,
        TimelineInfo, VolumeInfo,
    },
};
