//! Canonical model shared by every component of the adapter.

pub mod types;

pub use types::{
    AdapterCommand, AdapterEvent, PlayMode, PlaybackStatus, RepeatMode, SongInfo, TimelineInfo,
    VolumeInfo, clamp_volume, normalize_track_id,
};
