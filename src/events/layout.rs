//! Positional payload layouts of the host's low-level playback callbacks.

use {serde_json::Value, thiserror::Error};

use crate::{host::HostVersion, model::PlaybackStatus};

/// Canonical notification derived from a raw host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    PlayStateChange(PlaybackStatus),
    /// Playback position in milliseconds.
    ProgressUpdate(u64),
    /// Position after a seek, in milliseconds.
    SeekUpdate(u64),
}

/// Kinds of internal notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalEventKind {
    PlayState,
    Progress,
    Seek,
}

/// Why a raw payload was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("argument {index} missing (got {len} arguments)")]
    MissingArgument { index: usize, len: usize },
    #[error("argument {index} has unexpected value {value}")]
    InvalidValue { index: usize, value: String },
}

/// Where one event's interesting value sits and in which unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSlot {
    /// Fully qualified registry name, `"namespace.onEventName"`.
    pub name: &'static str,
    /// Index of the argument carrying the value.
    pub index: usize,
    /// Whether time values are reported in seconds rather than milliseconds.
    pub seconds: bool,
}

/// Callback names and argument positions for one host generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLayout {
    pub play_state: EventSlot,
    pub progress: EventSlot,
    pub seek: EventSlot,
}

const V3_LAYOUT: PayloadLayout = PayloadLayout {
    play_state: EventSlot {
        name: "audioplayer.onPlayState",
        index: 2,
        seconds: false,
    },
    progress: EventSlot {
        name: "audioplayer.onPlayProgress",
        index: 1,
        seconds: true,
    },
    seek: EventSlot {
        name: "audioplayer.onSeek",
        index: 2,
        seconds: true,
    },
};

const V2_LAYOUT: PayloadLayout = PayloadLayout {
    play_state: EventSlot {
        name: "audioplayer.onPlayState",
        index: 1,
        seconds: false,
    },
    progress: EventSlot {
        name: "audioplayer.onPlayProgress",
        index: 1,
        seconds: true,
    },
    seek: EventSlot {
        name: "audioplayer.onSeek",
        index: 1,
        seconds: false,
    },
};

impl PayloadLayout {
    #[must_use]
    pub const fn for_version(version: HostVersion) -> Self {
        match version {
            HostVersion::V2 => V2_LAYOUT,
            HostVersion::V3 => V3_LAYOUT,
        }
    }

    #[must_use]
    pub const fn slot(&self, kind: InternalEventKind) -> EventSlot {
        match kind {
            InternalEventKind::PlayState => self.play_state,
            InternalEventKind::Progress => self.progress,
            InternalEventKind::Seek => self.seek,
        }
    }

    /// Converts a raw positional payload into a canonical event.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError` if the expected argument is missing or malformed.
    pub fn parse(&self, kind: InternalEventKind, args: &[Value]) -> Result<InternalEvent, PayloadError> {
        let slot = self.slot(kind);
        let value = args.get(slot.index).ok_or(PayloadError::MissingArgument {
            index: slot.index,
            len: args.len(),
        })?;
        let invalid = || PayloadError::InvalidValue {
            index: slot.index,
            value: value.to_string(),
        };

        match kind {
            InternalEventKind::PlayState => parse_play_state(value)
                .map(InternalEvent::PlayStateChange)
                .ok_or_else(invalid),
            InternalEventKind::Progress => parse_time(value, slot.seconds)
                .map(InternalEvent::ProgressUpdate)
                .ok_or_else(invalid),
            InternalEventKind::Seek => parse_time(value, slot.seconds)
                .map(InternalEvent::SeekUpdate)
                .ok_or_else(invalid),
        }
    }
}

fn parse_time(value: &Value, seconds: bool) -> Option<u64> {
    let raw = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let millis = if seconds { raw * 1000.0 } else { raw };
    Some(millis.round() as u64)
}

/// Play-state codes arrive as `2` (playing) / `1` (paused), as words, or as
/// `"<id>|<word>|<n>"`.
fn parse_play_state(value: &Value) -> Option<PlaybackStatus> {
    match value {
        Value::Number(number) => match number.as_u64()? {
            1 => Some(PlaybackStatus::Paused),
            2 => Some(PlaybackStatus::Playing),
            _ => None,
        },
        Value::String(text) => text.split('|').find_map(|part| {
            match part.trim().to_ascii_lowercase().as_str() {
                "play" | "playing" | "resume" => Some(PlaybackStatus::Playing),
                "pause" | "paused" | "stop" | "stopped" | "ended" => Some(PlaybackStatus::Paused),
                _ => None,
            }
        }),
        _ => None,
    }
}
