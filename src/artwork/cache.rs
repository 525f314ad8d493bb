//! Artwork caching utilities.
//!
//! Keeps recently embedded covers in memory so replaying a track, or going
//! back and forth in a playlist, does not hit the image proxy again.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

/// Covers kept by default.
const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, String>,
    order: VecDeque<String>,
}

/// In-memory cache mapping image-proxy URLs to embedded data URLs.
///
/// Evicts the oldest entry once `capacity` is reached.
#[derive(Debug)]
pub struct ArtworkCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl Default for ArtworkCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtworkCache {
    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` covers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    /// Gets the embedded cover for a proxy URL.
    ///
    /// # Arguments
    ///
    /// * `proxy_url` - URL the cover was fetched from.
    ///
    /// # Returns
    ///
    /// The data URL if cached, or `None`.
    pub fn get(&self, proxy_url: &str) -> Option<String> {
        self.entries.read().map.get(proxy_url).cloned()
    }

    /// Stores an embedded cover.
    ///
    /// # Arguments
    ///
    /// * `proxy_url` - URL the cover was fetched from.
    /// * `data_url` - Embedded image.
    pub fn set(&self, proxy_url: &str, data_url: String) {
        let mut entries = self.entries.write();
        if entries.map.insert(proxy_url.to_string(), data_url).is_some() {
            return;
        }
        entries.order.push_back(proxy_url.to_string());
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    /// Removes a single entry.
    pub fn remove(&self, proxy_url: &str) {
        let mut entries = self.entries.write();
        entries.map.remove(proxy_url);
        entries.order.retain(|key| key != proxy_url);
    }

    /// Clears the entire cache.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.map.clear();
        entries.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::artwork::cache::ArtworkCache;

    #[test]
    fn test_artwork_cache_basic_operations() {
        let cache = ArtworkCache::new();

        // Test get on empty cache
        assert_eq!(cache.get("https://p1.music.126.net/a.jpg"), None);

        // Test set and get
        cache.set("https://p1.music.126.net/a.jpg", "data:image/jpeg;base64,AA".to_string());
        assert_eq!(
            cache.get("https://p1.music.126.net/a.jpg"),
            Some("data:image/jpeg;base64,AA".to_string())
        );

        // Test remove
        cache.remove("https://p1.music.126.net/a.jpg");
        assert!(cache.is_empty());

        // Test clear
        cache.set("https://p1.music.126.net/b.jpg", "data:image/png;base64,BB".to_string());
        cache.clear();
        assert_eq!(cache.get("https://p1.music.126.net/b.jpg"), None);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let cache = ArtworkCache::with_capacity(2);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "1b".to_string());
        cache.set("c", "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some("2".to_string()));
        assert_eq!(cache.get("c"), Some("3".to_string()));
    }
}
