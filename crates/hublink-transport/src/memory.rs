//! In-memory loopback implementation of the transport client surface.
//!
//! `MemoryHubClient` implements the whole collaborator surface without any
//! network: handles and proxies dispatch locally, the shared hub keeps its
//! channel connections in a map, and every mutation is observable through
//! inspection methods. It backs the service crate's tests and is handy for
//! local development; real transport stacks implement the traits in
//! `traits` out of tree.

use crate::lifecycle::{LifecycleCallback, LifecycleEvent, ReceiveCallback};
use crate::traits::{
    ChannelConnection, ConnectionHandle, HubClient, HubProxy, SharedHub, StartOptions,
    TransportError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Lifecycle callback table shared by handles and the shared hub.
#[derive(Default)]
struct LifecycleHandlers {
    handlers: DashMap<LifecycleEvent, Vec<LifecycleCallback>>,
}

impl LifecycleHandlers {
    fn register(&self, event: LifecycleEvent, callback: LifecycleCallback) {
        self.handlers.entry(event).or_default().push(callback);
    }

    fn fire(&self, event: LifecycleEvent, payload: &Value) {
        // Clone out of the map first; a callback may register reentrantly.
        let callbacks: Vec<LifecycleCallback> = self
            .handlers
            .get(&event)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        trace!(event = %event, listeners = callbacks.len(), "Firing lifecycle event");
        for callback in callbacks {
            callback(payload.clone());
        }
    }

    fn count(&self, event: LifecycleEvent) -> usize {
        self.handlers.get(&event).map_or(0, |entry| entry.len())
    }
}

/// Loopback hub client.
///
/// Channels for generated-proxy mode must be declared up front (the real
/// client only generates proxies for hubs the server advertises):
///
/// ```
/// use hublink_transport::{HubClient, MemoryHubClient, SharedHub};
///
/// let client = MemoryHubClient::with_channels(["chat", "presence"]);
/// assert!(client.shared_hub().channel("chat").is_some());
/// assert!(client.shared_hub().channel("nope").is_none());
/// ```
#[derive(Default)]
pub struct MemoryHubClient {
    shared: Arc<MemorySharedHub>,
    handles: Mutex<Vec<Arc<MemoryConnectionHandle>>>,
}

impl MemoryHubClient {
    /// Create a loopback client with no declared channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loopback client with the given generated-proxy channels
    /// declared on its shared hub.
    #[must_use]
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for channel in channels {
            client.shared.declare_channel(channel);
        }
        client
    }

    /// The concrete shared hub, for inspection in tests.
    #[must_use]
    pub fn shared(&self) -> &Arc<MemorySharedHub> {
        &self.shared
    }

    /// Every handle created so far, in creation order.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<MemoryConnectionHandle>> {
        self.handles.lock().expect("handle list poisoned").clone()
    }
}

impl HubClient for MemoryHubClient {
    fn create_handle(&self, url: Option<&str>) -> Arc<dyn ConnectionHandle> {
        let handle = Arc::new(MemoryConnectionHandle::new(url.map(str::to_string)));
        debug!(url = ?url, "Created loopback connection handle");
        self.handles
            .lock()
            .expect("handle list poisoned")
            .push(Arc::clone(&handle));
        handle
    }

    fn shared_hub(&self) -> Arc<dyn SharedHub> {
        Arc::clone(&self.shared) as Arc<dyn SharedHub>
    }
}

/// Loopback connection handle (manual-proxy mode).
pub struct MemoryConnectionHandle {
    url: Option<String>,
    logging: AtomicBool,
    started: AtomicBool,
    stop_calls: AtomicUsize,
    last_start: Mutex<Option<StartOptions>>,
    stop_error: Mutex<Option<String>>,
    start_error: Mutex<Option<String>>,
    lifecycle: LifecycleHandlers,
    proxies: Mutex<Vec<Arc<MemoryHubProxy>>>,
}

impl MemoryConnectionHandle {
    fn new(url: Option<String>) -> Self {
        Self {
            url,
            logging: AtomicBool::new(false),
            started: AtomicBool::new(false),
            stop_calls: AtomicUsize::new(0),
            last_start: Mutex::new(None),
            stop_error: Mutex::new(None),
            start_error: Mutex::new(None),
            lifecycle: LifecycleHandlers::default(),
            proxies: Mutex::new(Vec::new()),
        }
    }

    /// The endpoint this handle was created with, if any.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.url.clone()
    }

    /// Whether client logging is currently enabled.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logging.load(Ordering::SeqCst)
    }

    /// Whether a start call has completed.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of stop calls attempted, successful or not.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// The options passed to the most recent start call.
    #[must_use]
    pub fn last_start_options(&self) -> Option<StartOptions> {
        self.last_start.lock().expect("start options poisoned").clone()
    }

    /// Make subsequent stop calls fail with the given message.
    pub fn fail_stops(&self, message: impl Into<String>) {
        *self.stop_error.lock().expect("stop error poisoned") = Some(message.into());
    }

    /// Make subsequent start calls fail with the given message.
    pub fn fail_starts(&self, message: impl Into<String>) {
        *self.start_error.lock().expect("start error poisoned") = Some(message.into());
    }

    /// Fire a lifecycle event at every registered callback.
    pub fn fire(&self, event: LifecycleEvent, payload: &Value) {
        self.lifecycle.fire(event, payload);
    }

    /// Number of callbacks registered for `event`.
    #[must_use]
    pub fn lifecycle_count(&self, event: LifecycleEvent) -> usize {
        self.lifecycle.count(event)
    }

    /// Every proxy created from this handle, in creation order.
    #[must_use]
    pub fn proxies(&self) -> Vec<Arc<MemoryHubProxy>> {
        self.proxies.lock().expect("proxy list poisoned").clone()
    }
}

#[async_trait]
impl ConnectionHandle for MemoryConnectionHandle {
    fn create_proxy(&self, channel: &str) -> Arc<dyn HubProxy> {
        let proxy = Arc::new(MemoryHubProxy::new(channel));
        self.proxies
            .lock()
            .expect("proxy list poisoned")
            .push(Arc::clone(&proxy));
        proxy
    }

    async fn start(&self, options: StartOptions) -> Result<(), TransportError> {
        if let Some(message) = self.start_error.lock().expect("start error poisoned").clone() {
            return Err(TransportError::StartFailed(message));
        }
        *self.last_start.lock().expect("start options poisoned") = Some(options);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.stop_error.lock().expect("stop error poisoned").clone() {
            return Err(TransportError::StopFailed(message));
        }
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::SeqCst);
    }

    fn on_lifecycle(&self, event: LifecycleEvent, callback: LifecycleCallback) {
        self.lifecycle.register(event, callback);
    }
}

/// Loopback channel proxy.
///
/// `invoke` dispatches straight back to whatever handler is registered for
/// the method, which makes request/response flows testable in process.
pub struct MemoryHubProxy {
    channel: String,
    handlers: DashMap<String, ReceiveCallback>,
    invocations: Mutex<Vec<(String, Value)>>,
    invoke_error: Mutex<Option<String>>,
}

impl MemoryHubProxy {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            handlers: DashMap::new(),
            invocations: Mutex::new(Vec::new()),
            invoke_error: Mutex::new(None),
        }
    }

    /// Every invoke recorded so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().expect("invocations poisoned").clone()
    }

    /// The handler currently registered for `method`, if any.
    #[must_use]
    pub fn handler(&self, method: &str) -> Option<ReceiveCallback> {
        self.handlers.get(method).map(|entry| Arc::clone(&entry))
    }

    /// Make subsequent invoke calls fail with the given message.
    pub fn fail_invokes(&self, message: impl Into<String>) {
        *self.invoke_error.lock().expect("invoke error poisoned") = Some(message.into());
    }
}

#[async_trait]
impl HubProxy for MemoryHubProxy {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn on(&self, method: &str, callback: Option<ReceiveCallback>) {
        match callback {
            Some(callback) => {
                self.handlers.insert(method.to_string(), callback);
            }
            None => {
                self.handlers.remove(method);
            }
        }
    }

    async fn invoke(&self, method: &str, data: Value) -> Result<(), TransportError> {
        if let Some(message) = self.invoke_error.lock().expect("invoke error poisoned").clone() {
            return Err(TransportError::InvokeFailed(message));
        }
        self.invocations
            .lock()
            .expect("invocations poisoned")
            .push((method.to_string(), data.clone()));
        if let Some(handler) = self.handler(method) {
            handler(data);
        }
        Ok(())
    }
}

/// Loopback shared hub (generated-proxy mode).
#[derive(Default)]
pub struct MemorySharedHub {
    url: Mutex<Option<String>>,
    logging: AtomicBool,
    started: AtomicBool,
    last_start: Mutex<Option<StartOptions>>,
    lifecycle: LifecycleHandlers,
    channels: DashMap<String, Arc<MemoryChannelConnection>>,
}

impl MemorySharedHub {
    /// Declare a channel so generated-proxy lookups can find it.
    pub fn declare_channel(&self, channel: impl Into<String>) {
        let channel = channel.into();
        self.channels
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(MemoryChannelConnection::new(channel)));
    }

    /// The concrete channel connection, for inspection in tests.
    #[must_use]
    pub fn channel_connection(&self, channel: &str) -> Option<Arc<MemoryChannelConnection>> {
        self.channels.get(channel).map(|entry| Arc::clone(&entry))
    }

    /// The endpoint the hub currently points at, if overridden.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.url.lock().expect("url poisoned").clone()
    }

    /// Whether client logging is currently enabled.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logging.load(Ordering::SeqCst)
    }

    /// Whether a start call has completed.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The options passed to the most recent start call.
    #[must_use]
    pub fn last_start_options(&self) -> Option<StartOptions> {
        self.last_start.lock().expect("start options poisoned").clone()
    }

    /// Fire a lifecycle event at every registered callback.
    pub fn fire(&self, event: LifecycleEvent, payload: &Value) {
        self.lifecycle.fire(event, payload);
    }

    /// Number of callbacks registered for `event`.
    #[must_use]
    pub fn lifecycle_count(&self, event: LifecycleEvent) -> usize {
        self.lifecycle.count(event)
    }
}

#[async_trait]
impl SharedHub for MemorySharedHub {
    fn channel(&self, name: &str) -> Option<Arc<dyn ChannelConnection>> {
        self.channels
            .get(name)
            .map(|entry| Arc::clone(&entry) as Arc<dyn ChannelConnection>)
    }

    async fn start(&self, options: StartOptions) -> Result<(), TransportError> {
        *self.last_start.lock().expect("start options poisoned") = Some(options);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_url(&self, url: &str) {
        debug!(url = %url, "Shared hub url changed");
        *self.url.lock().expect("url poisoned") = Some(url.to_string());
    }

    fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::SeqCst);
    }

    fn on_lifecycle(&self, event: LifecycleEvent, callback: LifecycleCallback) {
        self.lifecycle.register(event, callback);
    }
}

/// Loopback pre-bound channel connection.
pub struct MemoryChannelConnection {
    channel: String,
    client: DashMap<String, ReceiveCallback>,
    invocations: Mutex<Vec<(String, Value)>>,
    stop_calls: AtomicUsize,
    stop_error: Mutex<Option<String>>,
}

impl MemoryChannelConnection {
    fn new(channel: String) -> Self {
        Self {
            channel,
            client: DashMap::new(),
            invocations: Mutex::new(Vec::new()),
            stop_calls: AtomicUsize::new(0),
            stop_error: Mutex::new(None),
        }
    }

    /// Every server invoke recorded so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().expect("invocations poisoned").clone()
    }

    /// Number of stop calls attempted, successful or not.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent stop calls fail with the given message.
    pub fn fail_stops(&self, message: impl Into<String>) {
        *self.stop_error.lock().expect("stop error poisoned") = Some(message.into());
    }
}

#[async_trait]
impl ChannelConnection for MemoryChannelConnection {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn register_client_handler(&self, method: &str, callback: ReceiveCallback) {
        self.client.insert(method.to_string(), callback);
    }

    fn client_handler(&self, method: &str) -> Option<ReceiveCallback> {
        self.client.get(method).map(|entry| Arc::clone(&entry))
    }

    async fn invoke_server(&self, method: &str, data: Value) -> Result<(), TransportError> {
        self.invocations
            .lock()
            .expect("invocations poisoned")
            .push((method.to_string(), data));
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.stop_error.lock().expect("stop error poisoned").clone() {
            return Err(TransportError::StopFailed(message));
        }
        Ok(())
    }
}
