//! Two-way relay between the adapter and the native component.

use std::sync::Arc;

use {
    async_channel::Receiver as InboundReceiver,
    parking_lot::Mutex,
    serde_json::{from_str, to_string},
    tokio::sync::broadcast::{Receiver, error::RecvError},
    tracing::{debug, error, info, trace, warn},
};

use crate::{
    adapter::MediaAdapter,
    bridge::protocol::{
        BridgeCommand, CMD_DISPATCH, CMD_INITIALIZE, CMD_SET_LOG_LEVEL, CMD_SHUTDOWN,
        CommandResult, CommandStatus, ControlRequest, InboundMessage, LogRecord, MetadataPayload,
        PlayStatePayload,
    },
    config::AdapterSettings,
    error::{BridgeError, ErrorReporter, ResultExt},
    model::{AdapterEvent, SongInfo},
};

/// Synchronous call bridge into the native component.
///
/// Implementations return the raw JSON reply, or `None` when the native
/// side is not reachable.
pub trait NativeBridge: Send + Sync {
    fn call(&self, command: &str, args: &str) -> Option<String>;
}

/// Forwards canonical events outward and control requests inward.
pub struct Relay {
    bridge: Arc<dyn NativeBridge>,
    adapter: Arc<MediaAdapter>,
    /// Remote cover of the last forwarded track, kept so the embedded
    /// follow-up can still name its source.
    remote_cover: Mutex<Option<(u64, String)>>,
}

impl Relay {
    #[must_use]
    pub fn new(bridge: Arc<dyn NativeBridge>, adapter: Arc<MediaAdapter>) -> Self {
        Self {
            bridge,
            adapter,
            remote_cover: Mutex::new(None),
        }
    }

    /// Starts the native side and applies the channel toggles.
    ///
    /// # Errors
    ///
    /// Returns the first rejected or unanswered native command.
    pub fn initialize(&self, settings: &AdapterSettings) -> Result<(), BridgeError> {
        self.invoke(CMD_INITIALIZE, "")?;
        self.set_log_level(&settings.log_level)?;
        self.send(&if settings.smtc_enabled {
            BridgeCommand::EnableSmtc
        } else {
            BridgeCommand::DisableSmtc
        })?;
        self.send(&if settings.discord_rpc_enabled {
            BridgeCommand::EnableDiscordRpc
        } else {
            BridgeCommand::DisableDiscordRpc
        })?;
        info!("Native bridge initialized");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BridgeError::NoReply` or `BridgeError::Rejected`.
    pub fn shutdown(&self) -> Result<(), BridgeError> {
        self.invoke(CMD_SHUTDOWN, "")
    }

    /// # Errors
    ///
    /// Returns `BridgeError::NoReply` or `BridgeError::Rejected`.
    pub fn set_log_level(&self, level: &str) -> Result<(), BridgeError> {
        self.invoke(CMD_SET_LOG_LEVEL, level)
    }

    /// Serializes and dispatches one envelope.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Serialization` if the envelope cannot be
    /// encoded, otherwise the outcome of the native call.
    pub fn send(&self, command: &BridgeCommand) -> Result<(), BridgeError> {
        let envelope = to_string(command)?;
        trace!(kind = command.kind(), "Dispatching native envelope");
        self.invoke(CMD_DISPATCH, &envelope)
    }

    fn invoke(&self, command: &str, args: &str) -> Result<(), BridgeError> {
        let reply = self
            .bridge
            .call(command, args)
            .ok_or_else(|| BridgeError::NoReply {
                command: command.to_string(),
            })?;
        let result: CommandResult = from_str(&reply)?;
        match result.status {
            CommandStatus::Success => Ok(()),
            CommandStatus::Error => Err(BridgeError::Rejected {
                message: result.message.unwrap_or_else(|| command.to_string()),
            }),
        }
    }

    /// Forwards one adapter event. Volume changes have no native counterpart.
    ///
    /// # Errors
    ///
    /// See [`Relay::send`].
    pub fn forward(&self, event: &AdapterEvent) -> Result<(), BridgeError> {
        let command = match event {
            AdapterEvent::SongChange(song) => BridgeCommand::Metadata(self.metadata(song)),
            AdapterEvent::PlayStateChange(status) => {
                BridgeCommand::PlayState(PlayStatePayload { status: *status })
            }
            AdapterEvent::TimelineUpdate(timeline) => BridgeCommand::Timeline(*timeline),
            AdapterEvent::PlayModeChange(mode) => BridgeCommand::PlayMode(*mode),
            AdapterEvent::VolumeChange(_) => return Ok(()),
        };
        self.send(&command)
    }

    fn metadata(&self, song: &SongInfo) -> MetadataPayload {
        let mut remote_cover = self.remote_cover.lock();
        if !song.has_embedded_cover() {
            *remote_cover = Some((song.track_id, song.cover_url.clone()));
        }
        let original = remote_cover
            .as_ref()
            .filter(|(track_id, _)| *track_id == song.track_id)
            .map(|(_, url)| url.clone())
            .filter(|url| !url.is_empty());
        MetadataPayload::from_song(song, original)
    }

    /// Forwards events until the adapter's channel closes.
    pub async fn pump_events(&self, mut events: Receiver<AdapterEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => match self.forward(&event) {
                    Ok(()) => {}
                    Err(e @ BridgeError::NoReply { .. }) => {
                        ErrorReporter::debug(&e, "Native side not answering");
                    }
                    Err(e) => ErrorReporter::warn(&e, "Forwarding adapter event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Relay lagged behind adapter events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Adapter event stream closed");
    }

    /// Handles inbound messages until every sender is dropped.
    pub async fn pump_inbound(&self, inbound: InboundReceiver<String>) {
        while let Ok(raw) = inbound.recv().await {
            self.handle_inbound(&raw);
        }
        debug!("Native inbound channel closed");
    }

    /// Handles one raw inbound message. Malformed input is logged and dropped.
    pub fn handle_inbound(&self, raw: &str) {
        let Some(message) = from_str::<InboundMessage>(raw).ok_or_warn("Parsing native message")
        else {
            return;
        };
        match message {
            InboundMessage::Control(request) => {
                debug!(?request, "Native control request");
                let _ = self.apply_control(request).ok_or_warn("Applying control request");
            }
            InboundMessage::Log(record) => emit_native_log(&record),
        }
    }

    fn apply_control(&self, request: ControlRequest) -> crate::error::Result<()> {
        match request {
            ControlRequest::Play => self.adapter.play(),
            ControlRequest::Pause => self.adapter.pause(),
            ControlRequest::Stop => self.adapter.stop(),
            ControlRequest::NextSong => self.adapter.next(),
            ControlRequest::PreviousSong => self.adapter.previous(),
            ControlRequest::ToggleShuffle => self.adapter.toggle_shuffle(),
            ControlRequest::ToggleRepeat => self.adapter.toggle_repeat(),
            ControlRequest::Seek { position_ms } => self.adapter.seek_to(position_ms),
        }
    }
}

fn emit_native_log(record: &LogRecord) {
    let target = record.target.as_str();
    let message = record.message.as_str();
    match record.level.to_ascii_lowercase().as_str() {
        "error" => error!(target: "inflink::native", native_target = target, "{message}"),
        "warn" | "warning" => warn!(target: "inflink::native", native_target = target, "{message}"),
        "debug" => debug!(target: "inflink::native", native_target = target, "{message}"),
        "trace" => trace!(target: "inflink::native", native_target = target, "{message}"),
        _ => info!(target: "inflink::native", native_target = target, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        parking_lot::Mutex,
        serde_json::{Value, from_str, json},
    };

    use crate::{
        adapter::MediaAdapter,
        bridge::{
            NativeBridge, Relay,
            protocol::{CMD_DISPATCH, CMD_INITIALIZE, CMD_SET_LOG_LEVEL},
        },
        config::AdapterSettings,
        error::BridgeError,
        host::{
            HostVersion,
            testing::{FakeEnvironment, FakeStore},
        },
        model::{AdapterEvent, PlaybackStatus, SongInfo, VolumeInfo},
    };

    struct RecordingBridge {
        calls: Mutex<Vec<(String, String)>>,
        reply: Option<String>,
    }

    impl RecordingBridge {
        fn replying(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: reply.map(str::to_string),
            })
        }

        fn ok() -> Arc<Self> {
            Self::replying(Some(r#"{"status":"Success"}"#))
        }

        fn envelopes(&self) -> Vec<Value> {
            self.calls
                .lock()
                .iter()
                .filter(|(command, _)| command == CMD_DISPATCH)
                .map(|(_, args)| from_str(args).unwrap())
                .collect()
        }
    }

    impl NativeBridge for RecordingBridge {
        fn call(&self, command: &str, args: &str) -> Option<String> {
            self.calls.lock().push((command.to_string(), args.to_string()));
            self.reply.clone()
        }
    }

    fn settings() -> AdapterSettings {
        AdapterSettings {
            embed_covers: false,
            ..AdapterSettings::default()
        }
    }

    fn song(cover_url: &str) -> SongInfo {
        SongInfo {
            song_name: "Song".to_string(),
            album_name: "Album".to_string(),
            author_name: "Artist".to_string(),
            cover_url: cover_url.to_string(),
            track_id: 5,
            duration_ms: Some(90_000),
        }
    }

    fn idle_adapter() -> Arc<MediaAdapter> {
        let env = Arc::new(FakeEnvironment::new(HostVersion::V3));
        Arc::new(MediaAdapter::new(env, settings()))
    }

    async fn live_adapter(store: Arc<FakeStore>) -> Arc<MediaAdapter> {
        let env = Arc::new(FakeEnvironment::new(HostVersion::V3).with_store_at_fixed_path(store));
        let adapter = Arc::new(MediaAdapter::new(env, settings()));
        adapter.initialize().await.unwrap();
        adapter
    }

    #[test]
    fn test_initialize_sequence() {
        let bridge = RecordingBridge::ok();
        let relay = Relay::new(bridge.clone(), idle_adapter());

        relay
            .initialize(&AdapterSettings {
                log_level: "debug".to_string(),
                ..settings()
            })
            .unwrap();

        let calls = bridge.calls.lock().clone();
        assert_eq!(calls[0].0, CMD_INITIALIZE);
        assert_eq!(calls[1], (CMD_SET_LOG_LEVEL.to_string(), "debug".to_string()));
        assert_eq!(
            bridge.envelopes(),
            vec![json!({"type": "EnableSmtc"}), json!({"type": "DisableDiscordRpc"})]
        );
    }

    #[test]
    fn test_reply_errors() {
        let silent = Relay::new(RecordingBridge::replying(None), idle_adapter());
        assert!(matches!(silent.shutdown(), Err(BridgeError::NoReply { .. })));

        let rejecting = Relay::new(
            RecordingBridge::replying(Some(r#"{"status":"Error","message":"no session"}"#)),
            idle_adapter(),
        );
        assert!(matches!(
            rejecting.forward(&AdapterEvent::PlayStateChange(PlaybackStatus::Paused)),
            Err(BridgeError::Rejected { message }) if message == "no session"
        ));

        let garbled = Relay::new(RecordingBridge::replying(Some("not json")), idle_adapter());
        assert!(matches!(
            garbled.set_log_level("info"),
            Err(BridgeError::Serialization(_))
        ));
    }

    #[test]
    fn test_embedded_cover_keeps_original_url() {
        let bridge = RecordingBridge::ok();
        let relay = Relay::new(bridge.clone(), idle_adapter());

        relay
            .forward(&AdapterEvent::SongChange(song("https://p1.music.126.net/5.jpg")))
            .unwrap();
        relay
            .forward(&AdapterEvent::SongChange(song("data:image/jpeg;base64,/9j/4AAQ")))
            .unwrap();
        relay
            .forward(&AdapterEvent::VolumeChange(VolumeInfo::default()))
            .unwrap();

        let envelopes = bridge.envelopes();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(
            envelopes[0]["payload"]["cover"],
            json!({"kind": "Url", "value": "https://p1.music.126.net/5.jpg"})
        );
        assert_eq!(
            envelopes[1]["payload"]["cover"],
            json!({"kind": "Base64", "value": "/9j/4AAQ"})
        );
        assert_eq!(
            envelopes[1]["payload"]["originalCoverUrl"],
            json!("https://p1.music.126.net/5.jpg")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_controls_reach_host() {
        let store = FakeStore::new(json!({"playing": {"playingState": 2}}));
        let relay = Relay::new(RecordingBridge::ok(), live_adapter(Arc::clone(&store)).await);

        let (tx, rx) = async_channel::unbounded();
        tx.send(r#"{"type":"NextSong"}"#.to_string()).await.unwrap();
        tx.send("{ not json".to_string()).await.unwrap();
        tx.send(r#"{"level":"INFO","message":"ready","target":"smtc"}"#.to_string())
            .await
            .unwrap();
        tx.send(r#"{"type":"Pause"}"#.to_string()).await.unwrap();
        drop(tx);

        relay.pump_inbound(rx).await;

        assert_eq!(
            store.actions(),
            vec![
                json!({"type": "playing/switchNext"}),
                json!({"type": "playing/pause"}),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_events_until_closed() {
        let bridge = RecordingBridge::ok();
        let store = FakeStore::new(json!({"playing": {"playingState": 2}}));
        let adapter = live_adapter(store).await;
        let relay = Relay::new(bridge.clone(), Arc::clone(&adapter));

        let (tx, rx) = tokio::sync::broadcast::channel(8);
        tx.send(AdapterEvent::PlayStateChange(PlaybackStatus::Playing))
            .unwrap();
        drop(tx);

        relay.pump_events(rx).await;
        assert_eq!(
            bridge.envelopes(),
            vec![json!({"type": "PlayState", "payload": {"status": "Playing"}})]
        );
    }
}
