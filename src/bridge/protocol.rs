//! JSON contract of the native transport-control component.

use serde::{Deserialize, Deserializer, Serialize, de::Error as DeError};

use crate::model::{PlayMode, PlaybackStatus, SongInfo, TimelineInfo};

/// Starts the native side.
pub const CMD_INITIALIZE: &str = "inflink.initialize";
/// Stops the native side and releases its resources.
pub const CMD_SHUTDOWN: &str = "inflink.shutdown";
/// Delivers one [`BridgeCommand`] envelope.
pub const CMD_DISPATCH: &str = "inflink.dispatch";
/// Changes the native log level.
pub const CMD_SET_LOG_LEVEL: &str = "inflink.set_log_level";

/// Where the native side should take the cover image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CoverSource {
    /// Remote image URL.
    Url(String),
    /// Base64-encoded image bytes, without the data URL prefix.
    Base64(String),
}

impl CoverSource {
    /// Classifies a cover reference; data URLs carry their bytes inline.
    #[must_use]
    pub fn from_reference(reference: &str) -> Self {
        match reference
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
        {
            Some((_, encoded)) => Self::Base64(encoded.to_string()),
            None => Self::Url(reference.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPayload {
    pub song_name: String,
    pub author_name: String,
    pub album_name: String,
    pub cover: CoverSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_cover_url: Option<String>,
    pub ncm_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl MetadataPayload {
    /// Builds the payload for a track.
    ///
    /// # Arguments
    ///
    /// * `song` - The track, possibly carrying an embedded cover.
    /// * `original_cover_url` - Remote cover URL the embedded image came from.
    #[must_use]
    pub fn from_song(song: &SongInfo, original_cover_url: Option<String>) -> Self {
        Self {
            song_name: song.song_name.clone(),
            author_name: song.author_name.clone(),
            album_name: song.album_name.clone(),
            cover: CoverSource::from_reference(&song.cover_url),
            original_cover_url,
            ncm_id: Some(song.track_id),
            duration: song.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayStatePayload {
    pub status: PlaybackStatus,
}

/// Envelope accepted by [`CMD_DISPATCH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BridgeCommand {
    Metadata(MetadataPayload),
    PlayState(PlayStatePayload),
    Timeline(TimelineInfo),
    PlayMode(PlayMode),
    EnableSmtc,
    DisableSmtc,
    EnableDiscordRpc,
    DisableDiscordRpc,
}

impl BridgeCommand {
    /// Envelope type tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "Metadata",
            Self::PlayState(_) => "PlayState",
            Self::Timeline(_) => "Timeline",
            Self::PlayMode(_) => "PlayMode",
            Self::EnableSmtc => "EnableSmtc",
            Self::DisableSmtc => "DisableSmtc",
            Self::EnableDiscordRpc => "EnableDiscordRpc",
            Self::DisableDiscordRpc => "DisableDiscordRpc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Success,
    Error,
}

/// Reply of every native command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResult {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: CommandStatus::Success,
            message: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            message: Some(message.into()),
        }
    }
}

/// Control request raised by the operating system's media controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    Play,
    Pause,
    Stop,
    NextSong,
    PreviousSong,
    ToggleShuffle,
    ToggleRepeat,
    Seek {
        #[serde(deserialize_with = "position_from_float")]
        position_ms: u64,
    },
}

/// The native side reports positions as floating-point milliseconds.
fn position_from_float<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let position = f64::deserialize(deserializer)?;
    if !position.is_finite() || position < 0.0 {
        return Err(D::Error::custom(format!("invalid seek position {position}")));
    }
    Ok(position.round() as u64)
}

/// Structured log record produced by the native side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub target: String,
}

/// Anything that arrives on the inbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Control(ControlRequest),
    Log(LogRecord),
}
