//! Diff-and-emit state shared by both reconciler variants.
//!
//! Reconcilers turn host state into a [`HostSnapshot`] and feed it here
//! together with internal events and local commands. `SyncCore` remembers
//! what it last dispatched and emits an [`AdapterEvent`] only when a derived
//! value actually changes, so redelivering the same snapshot is harmless.
//!
//! The state lock is never held while events are published or while the
//! cover resolver is called.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use {
    parking_lot::Mutex,
    tokio::{sync::broadcast::Sender, time::Instant},
    tracing::{debug, trace},
};

use crate::{
    artwork::CoverResolver,
    config::AdapterSettings,
    error::{AdapterError, ErrorReporter, Result},
    host::{HostVersion, ResumePosition},
    model::{
        AdapterCommand, AdapterEvent, PlayMode, PlaybackStatus, SongInfo, TimelineInfo, VolumeInfo,
        clamp_volume,
    },
    sync::{
        command::HostCommand,
        play_mode::{HostPlayMode, PlayModeController, to_canonical},
        throttle::TimelineThrottle,
    },
};

/// Version-independent view of one host state notification.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    /// Active track, `None` when nothing is loaded.
    pub song: Option<SongInfo>,
    pub playing: bool,
    pub play_mode: Option<HostPlayMode>,
    /// Host volume in `0.0..=1.0`, when the variant can read it.
    pub volume: Option<f64>,
}

/// Last dispatched values and the bookkeeping around them.
struct SyncState {
    song: Option<SongInfo>,
    status: Option<PlaybackStatus>,
    play_mode: Option<HostPlayMode>,
    volume: Option<VolumeInfo>,
    timeline: TimelineInfo,
    throttle: TimelineThrottle,
    pause_grace_until: Option<Instant>,
    pending_resume: Option<ResumePosition>,
    suppress_zero_progress: bool,
    muted_volume: Option<f64>,
    controller: PlayModeController,
    read_error: Option<AdapterError>,
}

impl SyncState {
    fn on_track_change(&mut self, song: SongInfo) {
        self.timeline = TimelineInfo {
            current_time: 0,
            total_time: song.duration_ms.unwrap_or(0),
        };
        if let Some(resume) = self.pending_resume.take()
            && resume.track_id == song.track_id
        {
            debug!(
                track_id = song.track_id,
                position_ms = resume.position_ms,
                "Seeding timeline from resume position"
            );
            self.timeline.current_time = resume.position_ms;
            self.suppress_zero_progress = true;
        }
        self.throttle.reset();
        self.song = Some(song);
    }

    fn reconcile_status(&mut self, observed: PlaybackStatus, now: Instant) -> Option<PlaybackStatus> {
        if let Some(until) = self.pause_grace_until {
            if observed.is_playing() && now < until {
                trace!("Ignoring playing state inside optimistic pause window");
                return None;
            }
            self.pause_grace_until = None;
        }
        if self.status == Some(observed) {
            return None;
        }
        self.status = Some(observed);
        Some(observed)
    }

    fn reconcile_volume(&mut self, volume: f64) -> Option<VolumeInfo> {
        let volume = clamp_volume(volume);
        if volume > 0.0 {
            self.muted_volume = None;
        }
        let info = VolumeInfo {
            volume,
            is_muted: volume == 0.0,
        };
        if self.volume == Some(info) {
            return None;
        }
        self.volume = Some(info);
        Some(info)
    }

    fn host_play_mode(&self) -> HostPlayMode {
        self.play_mode.unwrap_or(HostPlayMode::Order)
    }
}

/// Shared reconciliation engine.
pub struct SyncCore {
    version: HostVersion,
    state: Mutex<SyncState>,
    events: Sender<AdapterEvent>,
    resolver: Option<CoverResolver>,
    pause_grace: Duration,
    this: Weak<SyncCore>,
}

impl SyncCore {
    /// Creates the core.
    ///
    /// # Arguments
    ///
    /// * `version` - Host generation, used in logs.
    /// * `settings` - Throttle and grace windows.
    /// * `resolver` - Cover resolver, or `None` to keep remote cover references.
    /// * `resume` - Position persisted by the previous host session.
    /// * `events` - Channel the canonical events are published on.
    #[must_use]
    pub fn new(
        version: HostVersion,
        settings: &AdapterSettings,
        resolver: Option<CoverResolver>,
        resume: Option<ResumePosition>,
        events: Sender<AdapterEvent>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            version,
            state: Mutex::new(SyncState {
                song: None,
                status: None,
                play_mode: None,
                volume: None,
                timeline: TimelineInfo::default(),
                throttle: TimelineThrottle::new(settings.timeline_throttle()),
                pause_grace_until: None,
                pending_resume: resume,
                suppress_zero_progress: false,
                muted_volume: None,
                controller: PlayModeController::new(),
                read_error: None,
            }),
            events,
            resolver,
            pause_grace: settings.optimistic_pause_grace(),
            this: this.clone(),
        })
    }

    /// Diffs a full snapshot against the last dispatched values.
    pub fn apply_snapshot(&self, snapshot: HostSnapshot) {
        let now = Instant::now();
        let (events, new_song) = {
            let mut state = self.state.lock();
            state.read_error = None;
            let mut events = Vec::new();
            let mut new_song = None;

            if let Some(song) = snapshot.song {
                let current_id = state.song.as_ref().map(|current| current.track_id);
                if current_id == Some(song.track_id) {
                    if let Some(duration) = song.duration_ms
                        && state.timeline.total_time != duration
                    {
                        state.timeline.total_time = duration;
                    }
                } else {
                    debug!(track_id = song.track_id, version = %self.version, "Track changed");
                    state.on_track_change(song.clone());
                    events.push(AdapterEvent::SongChange(song.clone()));
                    events.push(AdapterEvent::TimelineUpdate(state.timeline));
                    new_song = Some(song);
                }
            }

            let observed = PlaybackStatus::from_playing(snapshot.playing);
            if let Some(status) = state.reconcile_status(observed, now) {
                events.push(AdapterEvent::PlayStateChange(status));
            }

            if let Some(mode) = snapshot.play_mode
                && state.play_mode != Some(mode)
            {
                let previous = state.play_mode.replace(mode);
                state.controller.observe(previous, mode);
                events.push(AdapterEvent::PlayModeChange(to_canonical(mode)));
            }

            if let Some(volume) = snapshot.volume
                && let Some(info) = state.reconcile_volume(volume)
            {
                events.push(AdapterEvent::VolumeChange(info));
            }

            (events, new_song)
        };

        self.publish(events);
        if let Some(song) = new_song {
            self.request_cover(song);
        }
    }

    /// Records a failed snapshot read; last known good state is kept.
    pub fn record_read_error(&self, error: AdapterError) {
        ErrorReporter::warn(&error, "Skipping host notification");
        self.state.lock().read_error = Some(error);
    }

    /// Handles a progress notification.
    ///
    /// # Arguments
    ///
    /// * `position_ms` - Reported position.
    /// * `duration_ms` - Track length, when the notification source knows it.
    pub fn on_progress(&self, position_ms: u64, duration_ms: Option<u64>) {
        let now = Instant::now();
        let event = {
            let mut state = self.state.lock();
            if state.suppress_zero_progress {
                state.suppress_zero_progress = false;
                if position_ms == 0 {
                    trace!("Suppressed zero progress after resume");
                    return;
                }
            }
            state.timeline.current_time = position_ms;
            if let Some(duration) = duration_ms.filter(|duration| *duration > 0) {
                state.timeline.total_time = duration;
            }
            let timeline = state.timeline;
            state
                .throttle
                .should_emit(now)
                .then_some(AdapterEvent::TimelineUpdate(timeline))
        };
        self.publish(event);
    }

    /// Records a track length learned outside a snapshot. Emits nothing.
    pub fn set_duration(&self, duration_ms: u64) {
        let mut state = self.state.lock();
        if state.song.is_some() && duration_ms > 0 {
            state.timeline.total_time = duration_ms;
        }
    }

    /// Handles a seek, bypassing the throttle.
    pub fn on_seek(&self, position_ms: u64) {
        let now = Instant::now();
        let timeline = {
            let mut state = self.state.lock();
            state.suppress_zero_progress = false;
            state.timeline.current_time = position_ms;
            state.throttle.force(now);
            state.timeline
        };
        self.publish(Some(AdapterEvent::TimelineUpdate(timeline)));
    }

    /// Handles a play-state notification from the internal event channel.
    pub fn on_play_state(&self, status: PlaybackStatus) {
        let event = self
            .state
            .lock()
            .reconcile_status(status, Instant::now())
            .map(AdapterEvent::PlayStateChange);
        self.publish(event);
    }

    /// Handles a volume reading outside a full snapshot.
    pub fn on_volume(&self, volume: f64) {
        let event = self
            .state
            .lock()
            .reconcile_volume(volume)
            .map(AdapterEvent::VolumeChange);
        self.publish(event);
    }

    /// Translates a canonical command into host commands.
    ///
    /// Applies the local side of the command first: an optimistic pause,
    /// the new seek position, or the remembered volume for mute.
    pub fn plan(&self, command: AdapterCommand) -> Vec<HostCommand> {
        let now = Instant::now();
        let mut events = Vec::new();

        let commands = {
            let mut state = self.state.lock();
            match command {
                AdapterCommand::Play => {
                    state.pause_grace_until = None;
                    vec![HostCommand::Play]
                }
                AdapterCommand::Pause | AdapterCommand::Stop => {
                    state.pause_grace_until = Some(now + self.pause_grace);
                    if state.status != Some(PlaybackStatus::Paused) {
                        state.status = Some(PlaybackStatus::Paused);
                        events.push(AdapterEvent::PlayStateChange(PlaybackStatus::Paused));
                    }
                    if command == AdapterCommand::Stop {
                        state.timeline.current_time = 0;
                        state.throttle.force(now);
                        events.push(AdapterEvent::TimelineUpdate(state.timeline));
                        vec![HostCommand::Stop]
                    } else {
                        vec![HostCommand::Pause]
                    }
                }
                AdapterCommand::Next => vec![HostCommand::Next],
                AdapterCommand::Previous => vec![HostCommand::Previous],
                AdapterCommand::SeekTo(position_ms) => {
                    let duration_ms = state.timeline.total_time;
                    let position_ms = if duration_ms > 0 {
                        position_ms.min(duration_ms)
                    } else {
                        position_ms
                    };
                    state.suppress_zero_progress = false;
                    state.timeline.current_time = position_ms;
                    state.throttle.force(now);
                    events.push(AdapterEvent::TimelineUpdate(state.timeline));
                    vec![HostCommand::Seek {
                        position_ms,
                        duration_ms,
                    }]
                }
                AdapterCommand::ToggleShuffle => {
                    let current = state.host_play_mode();
                    vec![HostCommand::SetPlayMode(state.controller.toggle_shuffle(current))]
                }
                AdapterCommand::ToggleRepeat => {
                    let current = state.host_play_mode();
                    vec![HostCommand::SetPlayMode(state.controller.toggle_repeat(current))]
                }
                AdapterCommand::SetRepeatMode(repeat_mode) => {
                    let current = state.host_play_mode();
                    vec![HostCommand::SetPlayMode(
                        state.controller.set_repeat_mode(current, repeat_mode),
                    )]
                }
                AdapterCommand::SetVolume(volume) => {
                    let volume = clamp_volume(volume);
                    if volume > 0.0 {
                        state.muted_volume = None;
                    }
                    vec![HostCommand::SetVolume(volume)]
                }
                AdapterCommand::ToggleMute => {
                    let current = state.volume.unwrap_or_default();
                    if current.is_muted {
                        let restored = state.muted_volume.take().unwrap_or(1.0);
                        vec![HostCommand::SetVolume(restored)]
                    } else {
                        state.muted_volume = Some(current.volume);
                        vec![HostCommand::SetVolume(0.0)]
                    }
                }
            }
        };

        self.publish(events);
        commands
    }

    /// Active track.
    ///
    /// # Errors
    ///
    /// Returns the last read error if no track was ever read, otherwise
    /// `AdapterError::SongNotFound`.
    pub fn current_song(&self) -> Result<SongInfo> {
        let state = self.state.lock();
        match (&state.song, &state.read_error) {
            (Some(song), _) => Ok(song.clone()),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(AdapterError::SongNotFound {
                reason: "no track loaded".to_string(),
            }),
        }
    }

    /// Last dispatched status; `Paused` until the host reports one.
    #[must_use]
    pub fn playback_status(&self) -> PlaybackStatus {
        self.state.lock().status.unwrap_or(PlaybackStatus::Paused)
    }

    /// Position and length of the active track.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::TimelineNotAvailable` while no track is loaded.
    pub fn timeline(&self) -> Result<TimelineInfo> {
        let state = self.state.lock();
        if state.song.is_none() {
            return Err(AdapterError::TimelineNotAvailable);
        }
        Ok(state.timeline)
    }

    /// Last observed play mode; the default until the host reports one.
    #[must_use]
    pub fn play_mode(&self) -> PlayMode {
        self.state
            .lock()
            .play_mode
            .map(to_canonical)
            .unwrap_or_default()
    }

    /// Last observed volume; full and unmuted until the host reports one.
    #[must_use]
    pub fn volume(&self) -> VolumeInfo {
        self.state.lock().volume.unwrap_or_default()
    }

    /// Cancels pending cover work.
    pub fn dispose(&self) {
        if let Some(resolver) = &self.resolver {
            resolver.cancel();
        }
    }

    fn request_cover(&self, song: SongInfo) {
        let Some(resolver) = &self.resolver else {
            return;
        };
        let this = self.this.clone();
        resolver.resolve(
            song,
            Box::new(move |resolved| {
                if let Some(core) = this.upgrade() {
                    core.on_cover_resolved(resolved);
                }
            }),
        );
    }

    /// Re-emits the song with its embedded cover if it is still current.
    fn on_cover_resolved(&self, resolved: SongInfo) {
        let event = {
            let mut state = self.state.lock();
            let updated = state
                .song
                .as_ref()
                .filter(|current| {
                    current.track_id == resolved.track_id && current.cover_url != resolved.cover_url
                })
                .map(|current| SongInfo {
                    cover_url: resolved.cover_url,
                    ..current.clone()
                });
            if let Some(song) = &updated {
                state.song = Some(song.clone());
            }
            updated.map(AdapterEvent::SongChange)
        };
        self.publish(event);
    }

    fn publish(&self, events: impl IntoIterator<Item = AdapterEvent>) {
        for event in events {
            trace!(?event, "Publishing adapter event");
            let _ = self.events.send(event);
        }
    }
}
