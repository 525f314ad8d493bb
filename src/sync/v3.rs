//! Reconciler for the 3.x host, driven entirely by its state container.

use std::sync::{Arc, Weak};

use {
    parking_lot::Mutex,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    error::{AdapterError, Result},
    events::{InternalEvent, InternalEventAdapter, InternalEventKind, SubscriptionId},
    host::{HostVersion, StateContainer, Subscription},
    model::{SongInfo, normalize_track_id},
    sync::{HostOp, HostSnapshot, Reconciler, SyncCore, play_mode::HostPlayMode},
};

/// `playingState` value reported while audio is playing.
const PLAYING_STATE_PLAYING: u64 = 2;

/// `resourceType` of spoken-word programs.
const RESOURCE_TYPE_PROGRAM: &str = "voice";

pub struct V3Reconciler {
    store: Arc<dyn StateContainer>,
    events: InternalEventAdapter,
    core: Arc<SyncCore>,
    store_subscription: Mutex<Option<Subscription>>,
    event_subscriptions: Mutex<Vec<SubscriptionId>>,
    this: Weak<V3Reconciler>,
}

impl V3Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateContainer>,
        events: InternalEventAdapter,
        core: Arc<SyncCore>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            events,
            core,
            store_subscription: Mutex::new(None),
            event_subscriptions: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    fn on_internal_event(&self, event: InternalEvent) {
        match event {
            InternalEvent::PlayStateChange(status) => self.core.on_play_state(status),
            InternalEvent::ProgressUpdate(position_ms) => self.core.on_progress(position_ms, None),
            InternalEvent::SeekUpdate(position_ms) => self.core.on_seek(position_ms),
        }
    }
}

impl Reconciler for V3Reconciler {
    fn version(&self) -> HostVersion {
        HostVersion::V3
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

        info!("V3 reconciler started");
        self.reconcile();
        Ok(())
    }

    fn dispose(&self) {
        if let Some(subscription) = self.store_subscription.lock().take() {
            subscription.unsubscribe();
        }
        let ids: Vec<SubscriptionId> = self.event_subscriptions.lock().drain(..).collect();
        for id in ids {
            self.events.unsubscribe(id);
        }
        self.core.dispose();
        debug!("V3 reconciler disposed");
    }

    fn reconcile(&self) {
        match read_snapshot(&self.store.get_state()) {
            Ok(snapshot) => self.core.apply_snapshot(snapshot),
            Err(e) => self.core.record_read_error(e),
        }
    }

    fn perform(&self, op: HostOp) -> Result<()> {
        match op {
            HostOp::Dispatch(action) => {
                self.store.dispatch(action);
                Ok(())
            }
            HostOp::PlayerCommand(_) | HostOp::SeekRatio(_) | HostOp::SetPlayerVolume(_) => {
                Err(AdapterError::CapabilityUnavailable {
                    capability: "legacy player".to_string(),
                })
            }
        }
    }
}

/// Reads the `playing` slice, and the `program` slice for spoken-word items.
///
/// # Errors
///
/// Returns `AdapterError::SongNotFound` if the slices are missing or
/// malformed, and `AdapterError::InconsistentState` if two slices disagree
/// on the active id.
pub(crate) fn read_snapshot(state: &Value) -> Result<HostSnapshot> {
    let playing = state.get("playing").ok_or_else(|| AdapterError::SongNotFound {
        reason: "state has no playing slice".to_string(),
    })?;

    let play_mode = playing
        .get("playingMode")
        .and_then(Value::as_str)
        .and_then(|raw| {
            let mode = HostPlayMode::from_host_str(HostVersion::V3, raw);
            if mode.is_none() {
                warn!(raw, "Unknown host play mode");
            }
            mode
        });

    let song = match playing.get("resourceTrackId").and_then(normalize_track_id) {
        Some(track_id) => Some(read_song(state, playing, track_id)?),
        None => None,
    };

    Ok(HostSnapshot {
        song,
        playing: playing.get("playingState").and_then(Value::as_u64) == Some(PLAYING_STATE_PLAYING),
        play_mode,
        volume: playing.get("playingVolume").and_then(Value::as_f64),
    })
}

fn read_song(state: &Value, playing: &Value, track_id: u64) -> Result<SongInfo> {
    let is_program =
        playing.get("resourceType").and_then(Value::as_str) == Some(RESOURCE_TYPE_PROGRAM);
    if is_program {
        read_program(state, track_id)
    } else {
        read_track(playing, track_id)
    }
}

fn read_track(playing: &Value, track_id: u64) -> Result<SongInfo> {
    let track = playing
        .get("curTrack")
        .filter(|track| track.is_object())
        .ok_or_else(|| AdapterError::SongNotFound {
            reason: format!("no curTrack for track {track_id}"),
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

fn read_program(state: &Value, track_id: u64) -> Result<SongInfo> {
    let program = state
        .get("program")
        .and_then(|slice| slice.get("curProgram"))
        .filter(|program| program.is_object())
        .ok_or_else(|| AdapterError::SongNotFound {
            reason: format!("no program metadata for track {track_id}"),
        })?;
    let main_song = program.get("mainSong");
    check_id(main_song.and_then(|song| song.get("id")), track_id)?;

    Ok(SongInfo {
        song_name: text(program.get("name")),
        album_name: text(program.get("radio").and_then(|radio| radio.get("name"))),
        author_name: text(program.get("dj").and_then(|dj| dj.get("nickname"))),
        cover_url: text(program.get("coverUrl")),
        track_id,
        duration_ms: positive(main_song.and_then(|song| song.get("duration")))
            .or_else(|| positive(program.get("duration"))),
    })
}

/// Ids reported by a metadata slice must match the active id.
pub(crate) fn check_id(reported: Option<&Value>, expected: u64) -> Result<()> {
    match reported.and_then(normalize_track_id) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(AdapterError::InconsistentState {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
        None => Err(AdapterError::SongNotFound {
            reason: format!("metadata for track {expected} carries no id"),
        }),
    }
}

pub(crate) fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

pub(crate) fn join_names(list: Option<&Value>) -> String {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" / ")
        })
        .unwrap_or_default()
}

pub(crate) fn positive(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(Value::as_f64)
        .filter(|number| number.is_finite() && *number > 0.0)
        .map(|number| number.round() as u64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        error::AdapterError,
        sync::{play_mode::HostPlayMode, v3::read_snapshot},
    };

    #[test]
    fn test_read_track_snapshot() {
        let snapshot = read_snapshot(&json!({
            "playing": {
                "resourceTrackId": "1901371647",
                "playingState": 2,
                "playingMode": "playCycle",
                "playingVolume": 0.6,
                "resourceType": "track",
                "curTrack": {
                    "id": 1_901_371_647_u64,
                    "name": "Song",
                    "duration": 215_000,
                    "artists": [{"name": "A"}, {"name": "B"}],
                    "album": {"name": "Album", "picUrl": "http://p1.music.126.net/c.jpg"}
                }
            }
        }))
        .unwrap();

        let song = snapshot.song.unwrap();
        assert_eq!(song.track_id, 1_901_371_647);
        assert_eq!(song.author_name, "A / B");
        assert_eq!(song.duration_ms, Some(215_000));
        assert!(snapshot.playing);
        assert_eq!(snapshot.play_mode, Some(HostPlayMode::ListLoop));
        assert_eq!(snapshot.volume, Some(0.6));
    }

    #[test]
    fn test_program_metadata_comes_from_program_slice() {
        let snapshot = read_snapshot(&json!({
            "playing": {"resourceTrackId": 55, "playingState": 1, "resourceType": "voice"},
            "program": {"curProgram": {
                "name": "Episode 12",
                "coverUrl": "http://p1.music.126.net/p.jpg",
                "radio": {"name": "Podcast"},
                "dj": {"nickname": "Host"},
                "mainSong": {"id": 55, "duration": 1_800_000}
            }}
        }))
        .unwrap();

        let song = snapshot.song.unwrap();
        assert_eq!(song.song_name, "Episode 12");
        assert_eq!(song.album_name, "Podcast");
        assert_eq!(song.author_name, "Host");
        assert!(!snapshot.playing);
    }

    #[test]
    fn test_program_id_mismatch_is_inconsistent() {
        let error = read_snapshot(&json!({
            "playing": {"resourceTrackId": 55, "resourceType": "voice"},
            "program": {"curProgram": {"name": "Old", "mainSong": {"id": 54}}}
        }))
        .err();
        assert_eq!(
            error,
            Some(AdapterError::InconsistentState {
                expected: "55".to_string(),
                found: "54".to_string()
            })
        );
    }

    #[test]
    fn test_missing_slices() {
        assert!(matches!(
            read_snapshot(&json!({})),
            Err(AdapterError::SongNotFound { .. })
        ));
        let idle = read_snapshot(&json!({"playing": {"playingState": 1}})).unwrap();
        assert_eq!(idle.song, None);
        assert!(matches!(
            read_snapshot(&json!({"playing": {"resourceTrackId": 9}})),
            Err(AdapterError::SongNotFound { .. })
        ));
    }
}
