//! Closed set of host-level commands and their per-version encodings.

use serde_json::{Value, json};

use crate::{host::HostVersion, sync::play_mode::HostPlayMode};

/// Operation the reconcilers issue against the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Seek { position_ms: u64, duration_ms: u64 },
    SetPlayMode(HostPlayMode),
    /// Volume in `0.0..=1.0`.
    SetVolume(f64),
}

/// Primitive host call a [`HostCommand`] expands into.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    /// Action object for the state container.
    Dispatch(Value),
    /// String-keyed command on the legacy player.
    PlayerCommand(&'static str),
    /// Seek on the legacy player, as a ratio of the track length.
    SeekRatio(f64),
    /// Volume setter on the legacy player.
    SetPlayerVolume(f64),
}

impl HostCommand {
    /// Expands the command into the host calls for one version.
    #[must_use]
    pub fn to_ops(self, version: HostVersion) -> Vec<HostOp> {
        match version {
            HostVersion::V3 => self.v3_ops(),
            HostVersion::V2 => self.v2_ops(),
        }
    }

    fn v3_ops(self) -> Vec<HostOp> {
        let action = |kind: &str| HostOp::Dispatch(json!({ "type": kind }));
        match self {
            Self::Play => vec![action("playing/resume")],
            Self::Pause => vec![action("playing/pause")],
            Self::Stop => vec![action("playing/pause"), v3_seek(0)],
            Self::Next => vec![action("playing/switchNext")],
            Self::Previous => vec![action("playing/switchPrev")],
            Self::Seek { position_ms, .. } => vec![v3_seek(position_ms)],
            Self::SetPlayMode(mode) => vec![HostOp::Dispatch(json!({
                "type": "playing/switchPlayingMode",
                "payload": { "playingMode": mode.as_host_str(HostVersion::V3) },
            }))],
            Self::SetVolume(volume) => vec![HostOp::Dispatch(json!({
                "type": "playing/setVolume",
                "payload": { "volume": volume },
            }))],
        }
    }

    fn v2_ops(self) -> Vec<HostOp> {
        match self {
            Self::Play => vec![HostOp::PlayerCommand("play")],
            Self::Pause => vec![HostOp::PlayerCommand("pause")],
            Self::Stop => vec![HostOp::PlayerCommand("stop")],
            Self::Next => vec![HostOp::PlayerCommand("next")],
            Self::Previous => vec![HostOp::PlayerCommand("prev")],
            Self::Seek {
                position_ms,
                duration_ms,
            } => {
                if duration_ms == 0 {
                    return Vec::new();
                }
                let ratio = (position_ms as f64 / duration_ms as f64).clamp(0.0, 1.0);
                vec![HostOp::SeekRatio(ratio)]
            }
            Self::SetPlayMode(mode) => vec![HostOp::Dispatch(json!({
                "type": "playing/setPlayMode",
                "payload": { "playMode": mode.as_host_str(HostVersion::V2) },
            }))],
            Self::SetVolume(volume) => vec![HostOp::SetPlayerVolume(volume)],
        }
    }
}

/// The V3 host takes positions in seconds.
fn v3_seek(position_ms: u64) -> HostOp {
    HostOp::Dispatch(json!({
        "type": "playing/setPlayingPosition",
        "payload": { "duration": position_ms as f64 / 1000.0 },
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        host::HostVersion,
        sync::{
            command::{HostCommand, HostOp},
            play_mode::HostPlayMode,
        },
    };

    #[test]
    fn test_v3_stop_is_pause_and_rewind() {
        assert_eq!(
            HostCommand::Stop.to_ops(HostVersion::V3),
            vec![
                HostOp::Dispatch(json!({"type": "playing/pause"})),
                HostOp::Dispatch(json!({
                    "type": "playing/setPlayingPosition",
                    "payload": {"duration": 0.0}
                })),
            ]
        );
    }

    #[test]
    fn test_v3_play_mode_uses_host_string() {
        assert_eq!(
            HostCommand::SetPlayMode(HostPlayMode::TrackLoop).to_ops(HostVersion::V3),
            vec![HostOp::Dispatch(json!({
                "type": "playing/switchPlayingMode",
                "payload": {"playingMode": "playOneCycle"}
            }))]
        );
    }

    #[test]
    fn test_v2_seek_is_a_ratio() {
        let seek = HostCommand::Seek {
            position_ms: 30_000,
            duration_ms: 120_000,
        };
        assert_eq!(seek.to_ops(HostVersion::V2), vec![HostOp::SeekRatio(0.25)]);

        let unknown_length = HostCommand::Seek {
            position_ms: 30_000,
            duration_ms: 0,
        };
        assert!(unknown_length.to_ops(HostVersion::V2).is_empty());
    }

    #[test]
    fn test_v2_transport_commands() {
        let names: Vec<HostOp> = [
            HostCommand::Play,
            HostCommand::Pause,
            HostCommand::Stop,
            HostCommand::Next,
            HostCommand::Previous,
        ]
        .into_iter()
        .flat_map(|command| command.to_ops(HostVersion::V2))
        .collect();
        assert_eq!(
            names,
            vec![
                HostOp::PlayerCommand("play"),
                HostOp::PlayerCommand("pause"),
                HostOp::PlayerCommand("stop"),
                HostOp::PlayerCommand("next"),
                HostOp::PlayerCommand("prev"),
            ]
        );
        assert_eq!(
            HostCommand::SetVolume(0.4).to_ops(HostVersion::V2),
            vec![HostOp::SetPlayerVolume(0.4)]
        );
    }
}
