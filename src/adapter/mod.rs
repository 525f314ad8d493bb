//! Uniform facade over both host generations.
//!
//! `MediaAdapter` discovers the host store, picks the reconciler matching
//! the host version and exposes canonical queries, commands and a
//! broadcast stream of [`AdapterEvent`]s. Callers never see which
//! generation they are talking to.

use std::sync::Arc;

use {
    parking_lot::RwLock,
    tokio::{
        runtime::Handle,
        sync::broadcast::{Receiver, Sender, channel},
    },
    tracing::{info, warn},
};

use crate::{
    artwork::{ArtworkFetcher, CoverResolver, HttpArtworkFetcher},
    config::AdapterSettings,
    error::{AdapterError, ErrorReporter, Result},
    events::InternalEventAdapter,
    host::{HostEnvironment, HostVersion},
    locator::StoreLocator,
    model::{
        AdapterCommand, AdapterEvent, PlayMode, PlaybackStatus, RepeatMode, SongInfo, TimelineInfo,
        VolumeInfo,
    },
    sync::{Reconciler, SyncCore, V2Reconciler, V3Reconciler},
};

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Canonical media-control interface to the host player.
pub struct MediaAdapter {
    env: Arc<dyn HostEnvironment>,
    settings: AdapterSettings,
    fetcher: Option<Arc<dyn ArtworkFetcher>>,
    events: Sender<AdapterEvent>,
    reconciler: RwLock<Option<Arc<dyn Reconciler>>>,
}

impl MediaAdapter {
    /// Creates an adapter for one host session.
    ///
    /// # Arguments
    ///
    /// * `env` - Access to the host primitives.
    /// * `settings` - Timing and artwork settings.
    #[must_use]
    pub fn new(env: Arc<dyn HostEnvironment>, settings: AdapterSettings) -> Self {
        let (events, _) = channel(EVENT_CHANNEL_CAPACITY);
        Self {
            env,
            settings,
            fetcher: None,
            events,
            reconciler: RwLock::new(None),
        }
    }

    /// Replaces the HTTP artwork fetcher.
    #[must_use]
    pub fn with_artwork_fetcher(mut self, fetcher: Arc<dyn ArtworkFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Locates the host store and starts reconciliation.
    ///
    /// Must be called from within a tokio runtime. Calling it again on an
    /// initialized adapter does nothing.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::UnsupportedVersion` if the host reports an
    /// unknown version, `AdapterError::Locator` if the store cannot be found
    /// and `AdapterError::CapabilityUnavailable` if a required host primitive
    /// is missing. A failed adapter stays uninitialized.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let reconciler = self.build().await.inspect_err(|e| {
            ErrorReporter::error(e, "Media adapter initialization");
        })?;
        reconciler.start()?;
        let version = reconciler.version();
        *self.reconciler.write() = Some(reconciler);

        info!(%version, "Media adapter ready");
        Ok(())
    }

    async fn build(&self) -> Result<Arc<dyn Reconciler>> {
        let version = self.env.version()?;
        info!(%version, app_version = %self.env.app_version(), "Initializing media adapter");

        let store = StoreLocator::for_version(version, &self.settings)
            .locate(self.env.as_ref())
            .await?;
        let events = InternalEventAdapter::new(self.env.as_ref())?;
        let core = SyncCore::new(
            version,
            &self.settings,
            self.cover_resolver(),
            self.env.resume_position(),
            self.events.clone(),
        );

        let reconciler: Arc<dyn Reconciler> = match version {
            HostVersion::V3 => V3Reconciler::new(store, events, core),
            HostVersion::V2 => {
                let player =
                    self.env
                        .legacy_player()
                        .ok_or_else(|| AdapterError::CapabilityUnavailable {
                            capability: "legacy player".to_string(),
                        })?;
                V2Reconciler::new(store, player, events, core)
            }
        };
        Ok(reconciler)
    }

    fn cover_resolver(&self) -> Option<CoverResolver> {
        if !self.settings.embed_covers {
            return None;
        }
        let fetcher = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => match HttpArtworkFetcher::new(self.settings.cover_timeout()) {
                Ok(fetcher) => Arc::new(fetcher),
                Err(e) => {
                    warn!(error = %e, "Artwork client unavailable, covers stay remote");
                    return None;
                }
            },
        };
        Some(CoverResolver::new(fetcher, &self.settings, Handle::current()))
    }

    /// Releases every host subscription. The adapter can be initialized again.
    pub fn dispose(&self) {
        if let Some(reconciler) = self.reconciler.write().take() {
            reconciler.dispose();
            info!("Media adapter disposed");
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.reconciler.read().is_some()
    }

    /// Host generation this adapter talks to.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::UnsupportedVersion` if the host is unknown.
    pub fn host_version(&self) -> Result<HostVersion> {
        self.env.version()
    }

    /// Subscribes to canonical events.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<AdapterEvent> {
        self.events.subscribe()
    }

    fn active(&self) -> Result<Arc<dyn Reconciler>> {
        self.reconciler
            .read()
            .clone()
            .ok_or(AdapterError::NotInitialized)
    }

    /// Active track.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization, or the
    /// reason no track could be read.
    pub fn get_current_song_info(&self) -> Result<SongInfo> {
        self.active()?.current_song()
    }

    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization.
    pub fn get_playback_status(&self) -> Result<PlaybackStatus> {
        Ok(self.active()?.playback_status())
    }

    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization and
    /// `AdapterError::TimelineNotAvailable` while no track is loaded.
    pub fn get_timeline_info(&self) -> Result<TimelineInfo> {
        self.active()?.timeline()
    }

    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization.
    pub fn get_play_mode(&self) -> Result<PlayMode> {
        Ok(self.active()?.play_mode())
    }

    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization.
    pub fn get_volume_info(&self) -> Result<VolumeInfo> {
        Ok(self.active()?.volume())
    }

    /// Executes a canonical command.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::NotInitialized` before initialization, or the
    /// error of the failing host call.
    pub fn execute(&self, command: AdapterCommand) -> Result<()> {
        self.active()?.execute(command)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn play(&self) -> Result<()> {
        self.execute(AdapterCommand::Play)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn pause(&self) -> Result<()> {
        self.execute(AdapterCommand::Pause)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn stop(&self) -> Result<()> {
        self.execute(AdapterCommand::Stop)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn next(&self) -> Result<()> {
        self.execute(AdapterCommand::Next)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn previous(&self) -> Result<()> {
        self.execute(AdapterCommand::Previous)
    }

    /// Seeks to an absolute position in milliseconds.
    ///
    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.execute(AdapterCommand::SeekTo(position_ms))
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn toggle_shuffle(&self) -> Result<()> {
        self.execute(AdapterCommand::ToggleShuffle)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn toggle_repeat(&self) -> Result<()> {
        self.execute(AdapterCommand::ToggleRepeat)
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn set_repeat_mode(&self, repeat_mode: RepeatMode) -> Result<()> {
        self.execute(AdapterCommand::SetRepeatMode(repeat_mode))
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    ///
    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.execute(AdapterCommand::SetVolume(volume))
    }

    /// # Errors
    ///
    /// See [`MediaAdapter::execute`].
    pub fn toggle_mute(&self) -> Result<()> {
        self.execute(AdapterCommand::ToggleMute)
    }
}

impl Drop for MediaAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}
