//! Canonical, host-version-independent playback model.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Metadata about the active track.
///
/// Rebuilt wholesale whenever the track identity changes; never patched in
/// place except for the cover once artwork resolution completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    /// Track title.
    pub song_name: String,
    /// Album title.
    pub album_name: String,
    /// Artist names joined with " / ".
    pub author_name: String,
    /// Cover reference: a remote URL, or a data URL once embedded.
    pub cover_url: String,
    /// Stable numeric identity of the track.
    pub track_id: u64,
    /// Duration in milliseconds, when the host reports one.
    pub duration_ms: Option<u64>,
}

impl SongInfo {
    /// Whether `cover_url` already holds an embedded image.
    #[must_use]
    pub fn has_embedded_cover(&self) -> bool {
        self.cover_url.starts_with("data:")
    }
}

/// Playback status as exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Audio is playing.
    Playing,
    /// Audio is paused or stopped.
    Paused,
}

impl PlaybackStatus {
    /// Maps a playing flag onto a status.
    #[must_use]
    pub const fn from_playing(is_playing: bool) -> Self {
        if is_playing { Self::Playing } else { Self::Paused }
    }

    /// Whether this status is `Playing`.
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Position and length of the active track, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInfo {
    pub current_time: u64,
    pub total_time: u64,
}

/// Repeat behavior of the canonical play mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Play the list once, in order.
    None,
    /// Repeat the current track.
    Track,
    /// Repeat the whole list.
    List,
    /// Host-specific recommendation mode.
    #[serde(rename = "AI")]
    Ai,
}

/// Canonical play mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayMode {
    pub is_shuffling: bool,
    pub repeat_mode: RepeatMode,
}

impl PlayMode {
    /// Non-shuffled mode with the given repeat behavior.
    #[must_use]
    pub const fn repeating(repeat_mode: RepeatMode) -> Self {
        Self {
            is_shuffling: false,
            repeat_mode,
        }
    }
}

impl Default for PlayMode {
    fn default() -> Self {
        Self::repeating(RepeatMode::None)
    }
}

/// Output volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    /// Volume in `0.0..=1.0`.
    pub volume: f64,
    pub is_muted: bool,
}

impl Default for VolumeInfo {
    fn default() -> Self {
        Self {
            volume: 1.0,
            is_muted: false,
        }
    }
}

/// Canonical notification delivered to subscribers of the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    SongChange(SongInfo),
    PlayStateChange(PlaybackStatus),
    PlayModeChange(PlayMode),
    TimelineUpdate(TimelineInfo),
    VolumeChange(VolumeInfo),
}

/// Command accepted by the adapter facade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdapterCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    /// Seek to an absolute position in milliseconds.
    SeekTo(u64),
    ToggleShuffle,
    ToggleRepeat,
    SetRepeatMode(RepeatMode),
    /// Set the volume; clamped to `0.0..=1.0`.
    SetVolume(f64),
    ToggleMute,
}

/// Normalizes a host track identifier into its numeric form.
///
/// Hosts report the id as a number in some slices and as a decimal string
/// in others.
#[must_use]
pub fn normalize_track_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Clamps a host-reported volume into `0.0..=1.0`.
#[must_use]
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
