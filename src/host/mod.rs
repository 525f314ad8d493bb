//! Boundary to the host media application.
//!
//! Nothing in this crate touches host globals directly. Every host
//! primitive (DOM lookup, the observable state container, callback
//! registries and the legacy player object) is reached through the traits
//! below, injected once per adapter instance via [`HostEnvironment`].

use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::error::AdapterError;

#[cfg(test)]
pub(crate) mod testing;

/// Shared handle to a node of the host object graph.
pub type HostRef = Arc<dyn HostObject>;

/// Callback invoked by the state container after every state change.
pub type StateListener = Arc<dyn Fn() + Send + Sync>;

/// Callback registered on a host callback registry; receives positional arguments.
pub type HostCallback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Callback invoked by the legacy player when its volume changes.
pub type VolumeListener = Arc<dyn Fn(f64) + Send + Sync>;

/// Major generation of the host application API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostVersion {
    /// Legacy 2.x host with imperative player objects.
    V2,
    /// Current 3.x host driven by a Redux-style store.
    V3,
}

impl HostVersion {
    /// Parses a dotted host version string such as `"3.0.14.2534"`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::UnsupportedVersion` for anything but a 2.x or
    /// later major version.
    pub fn parse(version: &str) -> Result<Self, AdapterError> {
        let major = version
            .trim()
            .split('.')
            .next()
            .and_then(|major| major.parse::<u32>().ok());
        match major {
            Some(2) => Ok(Self::V2),
            Some(3..) => Ok(Self::V3),
            _ => Err(AdapterError::UnsupportedVersion {
                version: version.to_string(),
            }),
        }
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => write!(f, "v2"),
            Self::V3 => write!(f, "v3"),
        }
    }
}

/// Duck-typed node of the host object graph.
///
/// The discovery strategies walk these nodes by property name without any
/// schema guarantee; each step may fail.
pub trait HostObject: Send + Sync {
    /// Reads a property.
    fn get(&self, key: &str) -> Option<HostRef>;

    /// Lists own property names.
    fn keys(&self) -> Vec<String>;

    /// Views this node as a state container, if it is one.
    fn as_container(&self) -> Option<Arc<dyn StateContainer>> {
        None
    }
}

/// The host's centralized, observable state container.
pub trait StateContainer: Send + Sync {
    /// Full current state snapshot.
    fn get_state(&self) -> Value;

    /// Registers a change listener.
    fn subscribe(&self, listener: StateListener) -> Subscription;

    /// Dispatches an action object.
    fn dispatch(&self, action: Value);
}

/// Handle of a state container subscription.
///
/// Holds the captured unsubscribe closure; it runs on
/// [`Subscription::unsubscribe`] or on drop, whichever comes first.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps an unsubscribe closure.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Releases the subscription now.
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Identifier returned by callback registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(pub u64);

/// Namespaced callback registry (`"namespace.onEventName"`).
pub trait CallbackRegistry: Send + Sync {
    fn register(&self, event: &str, callback: HostCallback) -> CallbackToken;

    fn unregister(&self, event: &str, token: CallbackToken);
}

/// Globally exposed player object of the legacy host.
pub trait LegacyPlayer: Send + Sync {
    /// Issues a string-keyed player command.
    fn command(&self, name: &str);

    /// Seeks to a position given as a ratio of the track length.
    fn seek_ratio(&self, ratio: f64);

    /// Current position, if a track is loaded.
    fn position_ms(&self) -> Option<u64>;

    /// Length of the loaded track.
    fn duration_ms(&self) -> Option<u64>;

    /// Volume in `0.0..=1.0`.
    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn on_volume_change(&self, listener: VolumeListener) -> CallbackToken;

    fn remove_volume_listener(&self, token: CallbackToken);
}

/// Playback position the host persisted at the end of the previous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePosition {
    pub track_id: u64,
    pub position_ms: u64,
}

/// Everything the adapter needs from the host process.
pub trait HostEnvironment: Send + Sync {
    /// Version string the host application reports about itself.
    fn app_version(&self) -> String;

    /// Host API generation derived from [`HostEnvironment::app_version`].
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::UnsupportedVersion` if the generation is unknown.
    fn version(&self) -> Result<HostVersion, AdapterError> {
        HostVersion::parse(&self.app_version())
    }

    /// Looks up a DOM element.
    fn query_selector(&self, selector: &str) -> Option<HostRef>;

    /// Modules discoverable through the bundler's module registry.
    fn module_registry(&self) -> Vec<HostRef> {
        Vec::new()
    }

    /// Internal-only callback registry, the one the host UI does not use.
    fn internal_registry(&self) -> Option<Arc<dyn CallbackRegistry>>;

    /// Globally exposed callback registry.
    fn global_registry(&self) -> Option<Arc<dyn CallbackRegistry>>;

    /// Imperative player object of the legacy host.
    fn legacy_player(&self) -> Option<Arc<dyn LegacyPlayer>> {
        None
    }

    /// Position persisted by the previous host session.
    fn resume_position(&self) -> Option<ResumePosition> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering::SeqCst},
    };

    use crate::{
        error::AdapterError,
        host::{HostVersion, Subscription},
    };

    #[test]
    fn test_host_version_parsing() {
        assert_eq!(HostVersion::parse("2.10.13"), Ok(HostVersion::V2));
        assert_eq!(HostVersion::parse("3.0.14.2534"), Ok(HostVersion::V3));
        assert_eq!(HostVersion::parse("3"), Ok(HostVersion::V3));
        assert_eq!(
            HostVersion::parse("1.9"),
            Err(AdapterError::UnsupportedVersion {
                version: "1.9".to_string()
            })
        );
        assert!(HostVersion::parse("beta").is_err());
    }

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&released);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(released.load(SeqCst), 1);

        let counter = Arc::clone(&released);
        drop(Subscription::new(move || {
            counter.fetch_add(1, SeqCst);
        }));
        assert_eq!(released.load(SeqCst), 2);
    }
}
