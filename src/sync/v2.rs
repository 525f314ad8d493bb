//! Reconciler for the legacy 2.x host.
//!
//! The legacy store carries track identity, play state and mode, but not a
//! reliable position or the volume. Those are read from the imperative
//! player object instead: position whenever a progress notification
//! arrives, volume on every reconciliation and from its change listener.

use std::sync::{Arc, Weak};

use {
    parking_lot::Mutex,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    error::{AdapterError, Result},
    events::{InternalEvent, InternalEventAdapter, InternalEventKind, SubscriptionId},
    host::{CallbackToken, HostVersion, LegacyPlayer, StateContainer, Subscription},
    model::{AdapterCommand, SongInfo, normalize_track_id},
    sync::{
        HostOp, HostSnapshot, Reconciler, SyncCore,
        play_mode::HostPlayMode,
        v3::{check_id, join_names, positive, text},
    },
};

pub struct V2Reconciler {
    store: Arc<dyn StateContainer>,
    player: Arc<dyn LegacyPlayer>,
    events: InternalEventAdapter,
    core: Arc<SyncCore>,
    store_subscription: Mutex<Option<Subscription>>,
    event_subscriptions: Mutex<Vec<SubscriptionId>>,
    volume_token: Mutex<Option<CallbackToken>>,
    this: Weak<V2Reconciler>,
}

impl V2Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateContainer>,
        player: Arc<dyn LegacyPlayer>,
        events: InternalEventAdapter,
        core: Arc<SyncCore>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            player,
            events,
            core,
            store_subscription: Mutex::new(None),
            event_subscriptions: Mutex::new(Vec::new()),
            volume_token: Mutex::new(None),
            this: this.clone(),
        })
    }

    fn on_internal_event(&self, event: InternalEvent) {
        match event {
            InternalEvent::PlayStateChange(status) => self.core.on_play_state(status),
            InternalEvent::ProgressUpdate(reported_ms) => {
                let position_ms = self.player.position_ms().unwrap_or(reported_ms);
                self.core.on_progress(position_ms, self.player.duration_ms());
            }
            InternalEvent::SeekUpdate(position_ms) => self.core.on_seek(position_ms),
        }
    }
}

impl Reconciler for V2Reconciler {
    fn version(&self) -> HostVersion {
        HostVersion::V2
    }

    fn core(&self) -> &SyncCore {
        &self.core
    }

    fn start(&self) -> Result<()> {
        let this = self.this.clone();
        let subscription = self.store.subscribe(Arc::new(move || {
            if let Some(reconciler) = this.upgrade() {
                reconciler.reconcile();
            }
        }));
        *self.store_subscription.lock() = Some(subscription);

        let this = self.this.clone();
        let token = self.player.on_volume_change(Arc::new(move |volume| {
            if let Some(reconciler) = this.upgrade() {
                reconciler.core.on_volume(volume);
            }
        }));
        *self.volume_token.lock() = Some(token);

        let ids: Vec<SubscriptionId> = [
            InternalEventKind::PlayState,
            InternalEventKind::Progress,
            InternalEventKind::Seek,
        ]
        .into_iter()
        .map(|kind| {
            let this = self.this.clone();
            self.events.subscribe(
                kind,
                Arc::new(move |event| {
                    if let Some(reconciler) = this.upgrade() {
                        reconciler.on_internal_event(event);
                    }
                }),
            )
        })
        .collect();
        self.event_subscriptions.lock().extend(ids);

        info!("V2 reconciler started");
        self.reconcile();
        Ok(())
    }

    fn dispose(&self) {
        if let Some(subscription) = self.store_subscription.lock().take() {
            subscription.unsubscribe();
        }
        if let Some(token) = self.volume_token.lock().take() {
            self.player.remove_volume_listener(token);
        }
        let ids: Vec<SubscriptionId> = self.event_subscriptions.lock().drain(..).collect();
        for id in ids {
            self.events.unsubscribe(id);
        }
        self.core.dispose();
        debug!("V2 reconciler disposed");
    }

    fn reconcile(&self) {
        match read_snapshot(&self.store.get_state()) {
            Ok(mut snapshot) => {
                snapshot.volume = Some(self.player.volume());
                self.core.apply_snapshot(snapshot);
            }
            Err(e) => self.core.record_read_error(e),
        }
    }

    /// Legacy seeks are ratios, so the track length must be known.
    fn prepare(&self, command: AdapterCommand) -> Result<()> {
        if !matches!(command, AdapterCommand::SeekTo(_)) || self.core.timeline()?.total_time > 0 {
            return Ok(());
        }
        let duration_ms = self
            .player
            .duration_ms()
            .filter(|duration| *duration > 0)
            .ok_or(AdapterError::TimelineNotAvailable)?;
        debug!(duration_ms, "Track length taken from the player for seek");
        self.core.set_duration(duration_ms);
        Ok(())
    }

    fn perform(&self, op: HostOp) -> Result<()> {
        match op {
            HostOp::Dispatch(action) => self.store.dispatch(action),
            HostOp::PlayerCommand(name) => self.player.command(name),
            HostOp::SeekRatio(ratio) => self.player.seek_ratio(ratio),
            HostOp::SetPlayerVolume(volume) => self.player.set_volume(volume),
        }
        Ok(())
    }
}

/// Reads the legacy `playing` slice.
///
/// # Errors
///
/// Returns `AdapterError::SongNotFound` if the slice or the track metadata
/// is missing, and `AdapterError::InconsistentState` if the track object
/// belongs to a different id than the one reported as playing.
pub(crate) fn read_snapshot(state: &Value) -> Result<HostSnapshot> {
    let playing = state.get("playing").ok_or_else(|| AdapterError::SongNotFound {
        reason: "state has no playing slice".to_string(),
    })?;

    let play_mode = playing
        .get("playMode")
        .and_then(Value::as_str)
        .and_then(|raw| {
            let mode = HostPlayMode::from_host_str(HostVersion::V2, raw);
            if mode.is_none() {
                warn!(raw, "Unknown host play mode");
            }
            mode
        });

    let song = match playing.get("trackId").and_then(normalize_track_id) {
        Some(track_id) => Some(read_track(playing, track_id)?),
        None => None,
    };

    Ok(HostSnapshot {
        song,
        playing: playing.get("playing").and_then(Value::as_bool).unwrap_or(false),
        play_mode,
        volume: None,
    })
}

fn read_track(playing: &Value, track_id: u64) -> Result<SongInfo> {
    let track = playing
        .get("track")
        .filter(|track| track.is_object())
        .ok_or_else(|| AdapterError::SongNotFound {
            reason: format!("no track metadata for track {track_id}"),
        })?;
    check_id(track.get("id"), track_id)?;

    let album = track.get("album");
    Ok(SongInfo {
        song_name: text(track.get("name")),
        album_name: text(album.and_then(|album| album.get("name"))),
        author_name: join_names(track.get("artists")),
        cover_url: text(album.and_then(|album| album.get("picUrl"))),
        track_id,
        duration_ms: positive(track.get("duration")),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        error::AdapterError,
        sync::{play_mode::HostPlayMode, v2::read_snapshot},
    };

    #[test]
    fn test_read_legacy_snapshot() {
        let snapshot = read_snapshot(&json!({
            "playing": {
                "trackId": 42,
                "playing": true,
                "playMode": "singleloop",
                "track": {
                    "id": "42",
                    "name": "Legacy",
                    "duration": 180_000,
                    "artists": [{"name": "X"}],
                    "album": {"name": "Old", "picUrl": "http://p1.music.126.net/o.jpg"}
                }
            }
        }))
        .unwrap();

        assert_eq!(snapshot.song.map(|song| song.song_name), Some("Legacy".to_string()));
        assert!(snapshot.playing);
        assert_eq!(snapshot.play_mode, Some(HostPlayMode::TrackLoop));
        assert_eq!(snapshot.volume, None);
    }

    #[test]
    fn test_stale_track_object_is_inconsistent() {
        let error = read_snapshot(&json!({
            "playing": {"trackId": 42, "track": {"id": 41, "name": "Previous"}}
        }))
        .err();
        assert!(matches!(error, Some(AdapterError::InconsistentState { .. })));
    }
}
