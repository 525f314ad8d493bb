//! Normalization of the host's raw playback callbacks.
//!
//! The host keeps two registries for the same low-level events. Registering
//! on the globally exposed one steals the callback from the host's own
//! progress bar, which then freezes, so the internal-only registry is used
//! whenever it can be found. The global registry is a last resort.
//!
//! Subscriptions are reference counted per event kind: the first logical
//! subscriber registers a single stub callback with the host, the last
//! unsubscribe removes it.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering::SeqCst},
    },
};

use {
    parking_lot::Mutex,
    serde_json::Value,
    tracing::{debug, trace, warn},
};

use crate::{
    error::{AdapterError, ErrorReporter},
    host::{CallbackRegistry, CallbackToken, HostCallback, HostEnvironment},
};

mod layout;

pub use layout::{EventSlot, InternalEvent, InternalEventKind, PayloadError, PayloadLayout};

/// Receiver of canonical internal events.
pub type EventListener = Arc<dyn Fn(InternalEvent) + Send + Sync>;

/// Handle returned by [`InternalEventAdapter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    kind: InternalEventKind,
    id: u64,
}

/// Host registration shared by every subscriber of one event kind.
struct Stub {
    token: CallbackToken,
    listeners: Vec<(u64, EventListener)>,
}

type StubMap = Arc<Mutex<HashMap<InternalEventKind, Stub>>>;

/// Adapter from raw host callbacks to [`InternalEvent`]s.
pub struct InternalEventAdapter {
    registry: Arc<dyn CallbackRegistry>,
    layout: PayloadLayout,
    stubs: StubMap,
    next_id: AtomicU64,
    uses_global_registry: bool,
}

impl InternalEventAdapter {
    /// Selects the registry for the host version.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::UnsupportedVersion` for an unknown host and
    /// `AdapterError::CapabilityUnavailable` if neither registry exists.
    pub fn new(env: &dyn HostEnvironment) -> Result<Self, AdapterError> {
        let layout = PayloadLayout::for_version(env.version()?);
        let (registry, uses_global_registry) = match env.internal_registry() {
            Some(registry) => (registry, false),
            None => {
                let registry = env.global_registry().ok_or_else(|| {
                    AdapterError::CapabilityUnavailable {
                        capability: "callback registry".to_string(),
                    }
                })?;
                warn!("Internal callback registry not found, falling back to the global one");
                (registry, true)
            }
        };

        Ok(Self {
            registry,
            layout,
            stubs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            uses_global_registry,
        })
    }

    /// Whether the adapter had to fall back to the global registry.
    #[must_use]
    pub fn uses_global_registry(&self) -> bool {
        self.uses_global_registry
    }

    /// Subscribes a listener to one kind of event.
    pub fn subscribe(&self, kind: InternalEventKind, listener: EventListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, SeqCst);
        let mut stubs = self.stubs.lock();

        if let Some(stub) = stubs.get_mut(&kind) {
            stub.listeners.push((id, listener));
        } else {
            let slot = self.layout.slot(kind);
            let token = self.registry.register(slot.name, self.stub_callback(kind));
            debug!(event = slot.name, "Registered host callback stub");
            stubs.insert(
                kind,
                Stub {
                    token,
                    listeners: vec![(id, listener)],
                },
            );
        }

        SubscriptionId { kind, id }
    }

    /// Removes a listener; the host callback goes with the last one.
    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        let released = {
            let mut stubs = self.stubs.lock();
            let Some(stub) = stubs.get_mut(&subscription.kind) else {
                return;
            };
            stub.listeners.retain(|(id, _)| *id != subscription.id);
            if stub.listeners.is_empty() {
                stubs.remove(&subscription.kind).map(|stub| stub.token)
            } else {
                None
            }
        };

        if let Some(token) = released {
            let name = self.layout.slot(subscription.kind).name;
            self.registry.unregister(name, token);
            debug!(event = name, "Removed host callback stub");
        }
    }

    /// Removes every host callback this adapter registered.
    pub fn dispose(&self) {
        let drained: Vec<(InternalEventKind, CallbackToken)> = self
            .stubs
            .lock()
            .drain()
            .map(|(kind, stub)| (kind, stub.token))
            .collect();
        for (kind, token) in drained {
            self.registry.unregister(self.layout.slot(kind).name, token);
        }
    }

    fn stub_callback(&self, kind: InternalEventKind) -> HostCallback {
        let stubs = Arc::clone(&self.stubs);
        let layout = self.layout;
        Arc::new(move |args: &[Value]| {
            let event = match layout.parse(kind, args) {
                Ok(event) => event,
                Err(e) => {
                    ErrorReporter::warn(&e, layout.slot(kind).name);
                    return;
                }
            };
            trace!(?event, "Internal event");

            let listeners: Vec<EventListener> = stubs
                .lock()
                .get(&kind)
                .map(|stub| stub.listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default();
            for listener in listeners {
                listener(event);
            }
        })
    }
}

impl Drop for InternalEventAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}
