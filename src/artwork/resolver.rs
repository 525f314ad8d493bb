//! Cancellable, generation-stamped cover resolution.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering::SeqCst},
};

use {
    parking_lot::Mutex,
    tokio::{runtime::Handle, task::AbortHandle},
    tracing::{debug, warn},
};

use crate::{
    artwork::{ArtworkCache, ArtworkFetcher, cover_proxy_url, to_data_url},
    config::AdapterSettings,
    error::ArtworkError,
    model::SongInfo,
};

/// Receives the song with its resolved cover reference.
pub type CoverCallback = Box<dyn FnOnce(SongInfo) + Send + 'static>;

/// Turns cover references into embedded images, one request at a time.
///
/// Every call to [`CoverResolver::resolve`] starts a new generation and
/// aborts the request of the previous one. A result is only delivered if
/// its generation is still current when it completes.
pub struct CoverResolver {
    fetcher: Arc<dyn ArtworkFetcher>,
    cache: Arc<ArtworkCache>,
    generation: Arc<AtomicU64>,
    in_flight: Mutex<Option<AbortHandle>>,
    runtime: Handle,
    size: u32,
    quality: u8,
}

impl CoverResolver {
    /// Creates a resolver spawning its requests on `runtime`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ArtworkFetcher>, settings: &AdapterSettings, runtime: Handle) -> Self {
        Self {
            fetcher,
            cache: Arc::new(ArtworkCache::new()),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Mutex::new(None),
            runtime,
            size: settings.cover_size,
            quality: settings.cover_quality,
        }
    }

    /// Generation of the most recent request.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(SeqCst)
    }

    #[must_use]
    pub fn cache(&self) -> &ArtworkCache {
        &self.cache
    }

    /// Resolves the cover of `song` and hands the updated song to `callback`.
    ///
    /// On failure the callback receives the song with its original cover
    /// reference. Superseded requests never invoke their callback.
    ///
    /// # Returns
    ///
    /// The generation assigned to this request.
    pub fn resolve(&self, song: SongInfo, callback: CoverCallback) -> u64 {
        let generation = self.generation.fetch_add(1, SeqCst) + 1;
        self.abort_in_flight();

        if song.cover_url.trim().is_empty() || song.has_embedded_cover() {
            return generation;
        }

        let proxy_url = cover_proxy_url(&song.cover_url, self.size, self.quality);
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.generation);

        let task = self.runtime.spawn(async move {
            let resolved = match cache.get(&proxy_url) {
                Some(data_url) => Ok(data_url),
                None => fetch_embedded(fetcher.as_ref(), &proxy_url).await.inspect(|data_url| {
                    cache.set(&proxy_url, data_url.clone());
                }),
            };

            if current.load(SeqCst) != generation {
                debug!(generation, "Dropping superseded cover");
                return;
            }

            let mut song = song;
            match resolved {
                Ok(data_url) => song.cover_url = data_url,
                Err(e) => warn!(
                    track_id = song.track_id,
                    error = %e,
                    "Cover resolution failed, keeping original reference"
                ),
            }
            callback(song);
        });

        *self.in_flight.lock() = Some(task.abort_handle());
        generation
    }

    /// Aborts any in-flight request without starting a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, SeqCst);
        self.abort_in_flight();
    }

    fn abort_in_flight(&self) {
        if let Some(handle) = self.in_flight.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for CoverResolver {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn fetch_embedded(fetcher: &dyn ArtworkFetcher, url: &str) -> Result<String, ArtworkError> {
    let image = fetcher.fetch(url).await?;
    to_data_url(&image)
}
