//! Translation between the host's flat play-mode enum and [`PlayMode`].
//!
//! The transition rules mirror the host's own transport buttons: repeat
//! always leaves shuffle for plain sequential playback, and leaving shuffle
//! through the shuffle button restores whatever mode was active before.

use crate::{
    host::HostVersion,
    model::{PlayMode, RepeatMode},
};

/// Flat play mode as stored by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlayMode {
    /// Sequential, no repeat.
    Order,
    ListLoop,
    TrackLoop,
    Shuffle,
    /// Recommendation-driven heart mode.
    Ai,
    /// Personal radio. Entered only from host UI, never produced here.
    Radio,
}

impl HostPlayMode {
    pub const ALL: [Self; 6] = [
        Self::Order,
        Self::ListLoop,
        Self::TrackLoop,
        Self::Shuffle,
        Self::Ai,
        Self::Radio,
    ];

    /// Raw string the host uses for this mode.
    #[must_use]
    pub const fn as_host_str(self, version: HostVersion) -> &'static str {
        match (version, self) {
            (HostVersion::V3, Self::Order) => "playOrder",
            (HostVersion::V3, Self::ListLoop) => "playCycle",
            (HostVersion::V3, Self::TrackLoop) => "playOneCycle",
            (HostVersion::V3, Self::Shuffle) => "playRandom",
            (HostVersion::V3, Self::Ai) => "playAi",
            (HostVersion::V3, Self::Radio) => "playFm",
            (HostVersion::V2, Self::Order) => "order",
            (HostVersion::V2, Self::ListLoop) => "loop",
            (HostVersion::V2, Self::TrackLoop) => "singleloop",
            (HostVersion::V2, Self::Shuffle) => "shuffle",
            (HostVersion::V2, Self::Ai) => "ai",
            (HostVersion::V2, Self::Radio) => "fm",
        }
    }

    /// Parses a raw host mode string.
    #[must_use]
    pub fn from_host_str(version: HostVersion, raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_host_str(version) == raw)
    }
}

/// Maps a host mode onto the canonical pair.
#[must_use]
pub const fn to_canonical(mode: HostPlayMode) -> PlayMode {
    match mode {
        HostPlayMode::Order => PlayMode::repeating(RepeatMode::None),
        HostPlayMode::ListLoop | HostPlayMode::Radio => PlayMode::repeating(RepeatMode::List),
        HostPlayMode::TrackLoop => PlayMode::repeating(RepeatMode::Track),
        HostPlayMode::Ai => PlayMode::repeating(RepeatMode::Ai),
        HostPlayMode::Shuffle => PlayMode {
            is_shuffling: true,
            repeat_mode: RepeatMode::List,
        },
    }
}

/// Maps a canonical pair onto the host mode. Never yields `Radio`.
#[must_use]
pub const fn from_canonical(mode: PlayMode) -> HostPlayMode {
    if mode.is_shuffling {
        return HostPlayMode::Shuffle;
    }
    match mode.repeat_mode {
        RepeatMode::None => HostPlayMode::Order,
        RepeatMode::List => HostPlayMode::ListLoop,
        RepeatMode::Track => HostPlayMode::TrackLoop,
        RepeatMode::Ai => HostPlayMode::Ai,
    }
}

/// Computes play-mode transitions, remembering the mode active before shuffle.
#[derive(Debug, Default, Clone)]
pub struct PlayModeController {
    before_shuffle: Option<HostPlayMode>,
}

impl PlayModeController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode restored when shuffle is toggled off.
    #[must_use]
    pub const fn remembered(&self) -> Option<HostPlayMode> {
        self.before_shuffle
    }

    /// Enters shuffle, or leaves it for the remembered mode.
    pub fn toggle_shuffle(&mut self, current: HostPlayMode) -> HostPlayMode {
        if current == HostPlayMode::Shuffle {
            self.before_shuffle.take().unwrap_or(HostPlayMode::ListLoop)
        } else {
            self.before_shuffle = remember(current);
            HostPlayMode::Shuffle
        }
    }

    /// Cycles `Order -> ListLoop -> TrackLoop -> Order`; leaves shuffle for `Order`.
    pub fn toggle_repeat(&mut self, current: HostPlayMode) -> HostPlayMode {
        match current {
            HostPlayMode::Shuffle => {
                self.before_shuffle = None;
                HostPlayMode::Order
            }
            HostPlayMode::Order => HostPlayMode::ListLoop,
            HostPlayMode::ListLoop => HostPlayMode::TrackLoop,
            HostPlayMode::TrackLoop | HostPlayMode::Ai | HostPlayMode::Radio => HostPlayMode::Order,
        }
    }

    /// Sets the repeat behavior directly, always leaving shuffle.
    pub fn set_repeat_mode(&mut self, current: HostPlayMode, repeat_mode: RepeatMode) -> HostPlayMode {
        if current == HostPlayMode::Shuffle {
            self.before_shuffle = None;
        }
        from_canonical(PlayMode::repeating(repeat_mode))
    }

    /// Keeps the memory coherent with a mode change reported by the host.
    pub fn observe(&mut self, previous: Option<HostPlayMode>, current: HostPlayMode) {
        match (previous, current) {
            (_, mode) if mode != HostPlayMode::Shuffle => self.before_shuffle = None,
            (Some(previous), _) if previous != HostPlayMode::Shuffle => {
                self.before_shuffle = remember(previous);
            }
            _ => {}
        }
    }
}

fn remember(mode: HostPlayMode) -> Option<HostPlayMode> {
    (mode != HostPlayMode::Radio).then_some(mode)
}

#[cfg(test)]
mod tests {
    use crate::{
        host::HostVersion,
        model::{PlayMode, RepeatMode},
        sync::play_mode::{HostPlayMode, PlayModeController, from_canonical, to_canonical},
    };

    #[test]
    fn test_host_strings_round_trip() {
        for version in [HostVersion::V2, HostVersion::V3] {
            for mode in HostPlayMode::ALL {
                let raw = mode.as_host_str(version);
                assert_eq!(HostPlayMode::from_host_str(version, raw), Some(mode));
            }
        }
        assert_eq!(HostPlayMode::from_host_str(HostVersion::V3, "order"), None);
    }

    #[test]
    fn test_canonical_round_trip() {
        let reachable = [
            PlayMode::repeating(RepeatMode::None),
            PlayMode::repeating(RepeatMode::List),
            PlayMode::repeating(RepeatMode::Track),
            PlayMode::repeating(RepeatMode::Ai),
            PlayMode {
                is_shuffling: true,
                repeat_mode: RepeatMode::List,
            },
        ];
        for mode in reachable {
            assert_eq!(to_canonical(from_canonical(mode)), mode);
        }
        for mode in HostPlayMode::ALL {
            if mode != HostPlayMode::Radio {
                assert_eq!(from_canonical(to_canonical(mode)), mode);
            }
        }
    }

    #[test]
    fn test_radio_is_never_produced() {
        assert_eq!(from_canonical(to_canonical(HostPlayMode::Radio)), HostPlayMode::ListLoop);
        let mut controller = PlayModeController::new();
        for mode in HostPlayMode::ALL {
            assert_ne!(controller.toggle_shuffle(mode), HostPlayMode::Radio);
            assert_ne!(controller.toggle_repeat(mode), HostPlayMode::Radio);
        }
    }

    #[test]
    fn test_shuffle_memory() {
        for start in [
            HostPlayMode::Order,
            HostPlayMode::ListLoop,
            HostPlayMode::TrackLoop,
            HostPlayMode::Ai,
        ] {
            let mut controller = PlayModeController::new();
            let shuffled = controller.toggle_shuffle(start);
            assert_eq!(shuffled, HostPlayMode::Shuffle);
            assert_eq!(controller.toggle_shuffle(shuffled), start);
            assert_eq!(controller.remembered(), None);
        }
    }

    #[test]
    fn test_leaving_shuffle_without_memory_defaults_to_list_loop() {
        let mut controller = PlayModeController::new();
        assert_eq!(controller.toggle_shuffle(HostPlayMode::Shuffle), HostPlayMode::ListLoop);
    }

    #[test]
    fn test_repeat_exits_shuffle_and_clears_memory() {
        let mut controller = PlayModeController::new();
        let shuffled = controller.toggle_shuffle(HostPlayMode::TrackLoop);

        let next = controller.toggle_repeat(shuffled);
        assert_eq!(to_canonical(next), PlayMode::repeating(RepeatMode::None));
        assert_eq!(controller.remembered(), None);

        assert_eq!(controller.toggle_shuffle(next), HostPlayMode::Shuffle);
        assert_eq!(controller.remembered(), Some(HostPlayMode::Order));
    }

    #[test]
    fn test_repeat_cycle() {
        let mut controller = PlayModeController::new();
        let mut mode = HostPlayMode::Order;
        let mut seen = Vec::new();
        for _ in 0..3 {
            mode = controller.toggle_repeat(mode);
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![HostPlayMode::ListLoop, HostPlayMode::TrackLoop, HostPlayMode::Order]
        );
        assert_eq!(controller.toggle_repeat(HostPlayMode::Ai), HostPlayMode::Order);
    }

    #[test]
    fn test_set_repeat_mode_forces_shuffle_off() {
        let mut controller = PlayModeController::new();
        let shuffled = controller.toggle_shuffle(HostPlayMode::ListLoop);
        let next = controller.set_repeat_mode(shuffled, RepeatMode::Track);
        assert_eq!(next, HostPlayMode::TrackLoop);
        assert_eq!(controller.remembered(), None);
    }

    #[test]
    fn test_observe_host_driven_changes() {
        let mut controller = PlayModeController::new();
        controller.observe(Some(HostPlayMode::TrackLoop), HostPlayMode::Shuffle);
        assert_eq!(controller.remembered(), Some(HostPlayMode::TrackLoop));
        assert_eq!(controller.toggle_shuffle(HostPlayMode::Shuffle), HostPlayMode::TrackLoop);

        controller.observe(Some(HostPlayMode::Order), HostPlayMode::Shuffle);
        controller.observe(Some(HostPlayMode::Shuffle), HostPlayMode::ListLoop);
        assert_eq!(controller.remembered(), None);
    }
}
