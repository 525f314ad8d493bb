//! In-memory stand-ins for the host primitives, used by unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering::SeqCst},
    },
};

use {parking_lot::Mutex, serde_json::Value};

use crate::host::{
    CallbackRegistry, CallbackToken, HostCallback, HostEnvironment, HostObject, HostRef,
    HostVersion, LegacyPlayer, ResumePosition, StateContainer, StateListener, Subscription,
    VolumeListener,
};

/// Object graph node with fixed properties.
#[derive(Default)]
pub struct FakeNode {
    properties: HashMap<String, HostRef>,
    container: Option<Arc<FakeStore>>,
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, child: impl Into<HostRef>) -> Self {
        self.properties.insert(key.to_string(), child.into());
        self
    }

    pub fn with_container(mut self, store: Arc<FakeStore>) -> Self {
        self.container = Some(store);
        self
    }

    pub fn into_ref(self) -> HostRef {
        Arc::new(self)
    }
}

impl From<FakeNode> for HostRef {
    fn from(node: FakeNode) -> Self {
        Arc::new(node)
    }
}

impl HostObject for FakeNode {
    fn get(&self, key: &str) -> Option<HostRef> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.properties.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn as_container(&self) -> Option<Arc<dyn StateContainer>> {
        self.container
            .clone()
            .map(|store| store as Arc<dyn StateContainer>)
    }
}

/// Observable store that notifies listeners synchronously.
pub struct FakeStore {
    state: Mutex<Value>,
    listeners: Arc<Mutex<Vec<(u64, StateListener)>>>,
    next_listener: AtomicU64,
    actions: Mutex<Vec<Value>>,
}

impl FakeStore {
    pub fn new(state: Value) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
            actions: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the state and notifies every listener.
    pub fn set_state(&self, state: Value) {
        *self.state.lock() = state;
        self.notify();
    }

    /// Notifies listeners without changing the state.
    pub fn notify(&self) {
        let listeners: Vec<StateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn actions(&self) -> Vec<Value> {
        self.actions.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl StateContainer for FakeStore {
    fn get_state(&self) -> Value {
        self.state.lock().clone()
    }

    fn subscribe(&self, listener: StateListener) -> Subscription {
        let id = self.next_listener.fetch_add(1, SeqCst);
        self.listeners.lock().push((id, listener));
        let listeners = Arc::clone(&self.listeners);
        Subscription::new(move || listeners.lock().retain(|(other, _)| *other != id))
    }

    fn dispatch(&self, action: Value) {
        self.actions.lock().push(action);
    }
}

/// Callback registry that lets tests fire host events.
#[derive(Default)]
pub struct FakeRegistry {
    callbacks: Mutex<HashMap<String, Vec<(CallbackToken, HostCallback)>>>,
    next_token: AtomicU64,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emit(&self, event: &str, args: Vec<Value>) {
        let callbacks: Vec<HostCallback> = self
            .callbacks
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(&args);
        }
    }

    pub fn count(&self, event: &str) -> usize {
        self.callbacks.lock().get(event).map_or(0, Vec::len)
    }
}

impl CallbackRegistry for FakeRegistry {
    fn register(&self, event: &str, callback: HostCallback) -> CallbackToken {
        let token = CallbackToken(self.next_token.fetch_add(1, SeqCst));
        self.callbacks
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((token, callback));
        token
    }

    fn unregister(&self, event: &str, token: CallbackToken) {
        if let Some(entries) = self.callbacks.lock().get_mut(event) {
            entries.retain(|(other, _)| *other != token);
        }
    }
}

/// Legacy player object with observable side effects.
pub struct FakeLegacyPlayer {
    pub position_ms: Mutex<Option<u64>>,
    pub duration_ms: Mutex<Option<u64>>,
    volume: Mutex<f64>,
    commands: Mutex<Vec<String>>,
    seeks: Mutex<Vec<f64>>,
    volume_listeners: Mutex<Vec<(CallbackToken, VolumeListener)>>,
    next_token: AtomicU64,
}

impl FakeLegacyPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            position_ms: Mutex::new(None),
            duration_ms: Mutex::new(None),
            volume: Mutex::new(1.0),
            commands: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
            volume_listeners: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().clone()
    }

    pub fn volume_listener_count(&self) -> usize {
        self.volume_listeners.lock().len()
    }
}

impl LegacyPlayer for FakeLegacyPlayer {
    fn command(&self, name: &str) {
        self.commands.lock().push(name.to_string());
    }

    fn seek_ratio(&self, ratio: f64) {
        self.seeks.lock().push(ratio);
    }

    fn position_ms(&self) -> Option<u64> {
        *self.position_ms.lock()
    }

    fn duration_ms(&self) -> Option<u64> {
        *self.duration_ms.lock()
    }

    fn volume(&self) -> f64 {
        *self.volume.lock()
    }

    fn set_volume(&self, volume: f64) {
        *self.volume.lock() = volume;
        let listeners: Vec<VolumeListener> = self
            .volume_listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(volume);
        }
    }

    fn on_volume_change(&self, listener: VolumeListener) -> CallbackToken {
        let token = CallbackToken(self.next_token.fetch_add(1, SeqCst));
        self.volume_listeners.lock().push((token, listener));
        token
    }

    fn remove_volume_listener(&self, token: CallbackToken) {
        self.volume_listeners
            .lock()
            .retain(|(other, _)| *other != token);
    }
}

/// Host environment assembled from the fakes above.
pub struct FakeEnvironment {
    pub version: HostVersion,
    pub app_version: String,
    pub root: Mutex<Option<HostRef>>,
    pub modules: Vec<HostRef>,
    pub internal: Option<Arc<FakeRegistry>>,
    pub global: Option<Arc<FakeRegistry>>,
    pub legacy: Option<Arc<FakeLegacyPlayer>>,
    pub resume: Option<ResumePosition>,
}

impl FakeEnvironment {
    pub fn new(version: HostVersion) -> Self {
        let app_version = match version {
            HostVersion::V2 => "2.10.13.202675",
            HostVersion::V3 => "3.0.14.2534",
        };
        Self {
            version,
            app_version: app_version.to_string(),
            root: Mutex::new(None),
            modules: Vec::new(),
            internal: Some(FakeRegistry::new()),
            global: Some(FakeRegistry::new()),
            legacy: None,
            resume: None,
        }
    }

    pub fn with_app_version(mut self, app_version: &str) -> Self {
        self.app_version = app_version.to_string();
        self
    }

    pub fn with_root(self, root: HostRef) -> Self {
        *self.root.lock() = Some(root);
        self
    }

    /// Root node whose fixed-path chain leads straight to `store`.
    pub fn with_store_at_fixed_path(self, store: Arc<FakeStore>) -> Self {
        let version = self.version;
        self.with_root(fixed_path_root(version, store))
    }

    pub fn internal(&self) -> Arc<FakeRegistry> {
        self.internal.clone().expect("internal registry configured")
    }
}

impl HostEnvironment for FakeEnvironment {
    fn app_version(&self) -> String {
        self.app_version.clone()
    }

    fn query_selector(&self, _selector: &str) -> Option<HostRef> {
        self.root.lock().clone()
    }

    fn module_registry(&self) -> Vec<HostRef> {
        self.modules.clone()
    }

    fn internal_registry(&self) -> Option<Arc<dyn CallbackRegistry>> {
        self.internal
            .clone()
            .map(|registry| registry as Arc<dyn CallbackRegistry>)
    }

    fn global_registry(&self) -> Option<Arc<dyn CallbackRegistry>> {
        self.global
            .clone()
            .map(|registry| registry as Arc<dyn CallbackRegistry>)
    }

    fn legacy_player(&self) -> Option<Arc<dyn LegacyPlayer>> {
        self.legacy
            .clone()
            .map(|player| player as Arc<dyn LegacyPlayer>)
    }

    fn resume_position(&self) -> Option<ResumePosition> {
        self.resume
    }
}

/// Builds a root node following the version-pinned property chain.
pub fn fixed_path_root(version: HostVersion, store: Arc<FakeStore>) -> HostRef {
    let path = crate::locator::fixed_store_path(version);
    let mut node = FakeNode::new().with_container(store);
    for key in path.iter().rev() {
        node = FakeNode::new().with(key, node);
    }
    node.into_ref()
}
