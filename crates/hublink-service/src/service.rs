//! The runtime service: connection factory, lifecycle dispatcher, and
//! teardown coordinator.
//!
//! Built from a [`HublinkProvider`](crate::provider::HublinkProvider) and an
//! injected [`HubClient`]; the transport preference list and logging default
//! are snapshots taken at construction.

use crate::callback::CallbackSlot;
use crate::error::HubError;
use crate::registry::{ConnectionRegistry, RegisteredConnection};
use hublink_transport::{
    ChannelConnection, ConnectionHandle, ErrorCallback, HubClient, HubProxy, LifecycleCallback,
    LifecycleEvent, ReceiveCallback, SharedHub, StartOptions,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A manual-proxy connection as handed out by the factory: the handle and
/// its channel-bound proxy.
pub struct HubConnection {
    /// The transport connection. A non-owning reference stays in the
    /// service's registry until the connection is stopped.
    pub connection: Arc<dyn ConnectionHandle>,
    /// The proxy bound to the requested channel.
    pub proxy: Arc<dyn HubProxy>,
}

/// The hublink runtime service.
///
/// One instance owns one connection registry; there is no process-global
/// state. The shared hub behind generated-proxy mode is resolved once at
/// construction and injected everywhere it is needed.
pub struct HubService {
    client: Arc<dyn HubClient>,
    shared: Arc<dyn SharedHub>,
    transports: Vec<String>,
    logging: bool,
    default_url: Option<String>,
    registry: ConnectionRegistry,
}

impl HubService {
    pub(crate) fn new(
        client: Arc<dyn HubClient>,
        transports: Vec<String>,
        logging: bool,
        default_url: Option<String>,
    ) -> Self {
        let shared = client.shared_hub();
        if let Some(url) = &default_url {
            shared.set_url(url);
        }
        debug!(transports = ?transports, logging, "Built hublink service");
        Self {
            client,
            shared,
            transports,
            logging,
            default_url,
            registry: ConnectionRegistry::new(),
        }
    }

    /// The transport preference order snapshotted at construction.
    #[must_use]
    pub fn transports(&self) -> &[String] {
        &self.transports
    }

    /// Number of connections currently tracked in the registry.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    // ---- Connection factory -------------------------------------------

    /// Create a manual-proxy connection to `channel`.
    ///
    /// Creates a fresh handle (using `url`, or the configured default
    /// endpoint when absent), applies the logging default, binds a proxy to
    /// `channel`, and registers the handle. Every call registers a new
    /// entry, even for a channel that was already requested.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MissingChannel`] when `channel` is absent.
    pub fn create_hub_connection(
        &self,
        channel: Option<&str>,
        url: Option<&str>,
    ) -> Result<HubConnection, HubError> {
        let channel = channel.ok_or(HubError::MissingChannel)?;
        let url = url.or(self.default_url.as_deref());

        let connection = self.client.create_handle(url);
        connection.set_logging(self.logging);
        let proxy = connection.create_proxy(channel);

        debug!(channel = %channel, url = ?url, "Created hub connection");
        self.registry
            .register(RegisteredConnection::Handle(Arc::clone(&connection)));

        Ok(HubConnection { connection, proxy })
    }

    /// Look up the generated-proxy connection for `channel`.
    ///
    /// When `url` is supplied it is written to the shared hub first; since
    /// every channel connection is multiplexed over that hub, the new url
    /// (and the logging default applied here) affect all of them. That
    /// coupling is inherent to the shared-hub design. Every call registers
    /// a new entry, even for a channel that was already requested.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MissingChannel`] when `channel` is absent, or
    /// [`HubError::UnknownChannel`] when the shared hub has no connection
    /// for it.
    pub fn create_connection(
        &self,
        channel: Option<&str>,
        url: Option<&str>,
    ) -> Result<Arc<dyn ChannelConnection>, HubError> {
        let channel = channel.ok_or(HubError::MissingChannel)?;
        if let Some(url) = url {
            self.shared.set_url(url);
        }
        self.shared.set_logging(self.logging);

        let connection = self
            .shared
            .channel(channel)
            .ok_or_else(|| HubError::UnknownChannel(channel.to_string()))?;

        debug!(channel = %channel, "Resolved channel connection");
        self.registry
            .register(RegisteredConnection::Channel(Arc::clone(&connection)));

        Ok(connection)
    }

    // ---- Start --------------------------------------------------------

    /// Start a manual-proxy connection.
    ///
    /// Argument validation happens synchronously; the returned future is
    /// the connection-open completion signal and carries any transport
    /// failure. There is no way to cancel a start once issued.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MissingConnection`] when `connection` is absent.
    pub fn start_hub_connection(
        &self,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<impl Future<Output = Result<(), HubError>> + Send + 'static, HubError> {
        let handle = Arc::clone(connection.ok_or(HubError::MissingConnection)?);
        let options = StartOptions::new(self.transports.clone());
        Ok(async move {
            trace!(transports = ?options.transports, "Starting hub connection");
            handle.start(options).await?;
            Ok(())
        })
    }

    /// Start the shared hub connection (generated-proxy mode).
    ///
    /// Never fails synchronously; transport failures surface through the
    /// returned future.
    pub fn start_connection(&self) -> impl Future<Output = Result<(), HubError>> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let options = StartOptions::new(self.transports.clone());
        async move {
            trace!(transports = ?options.transports, "Starting shared hub connection");
            shared.start(options).await?;
            Ok(())
        }
    }

    // ---- Teardown coordinator -----------------------------------------

    /// Stop one connection.
    ///
    /// The first registry entry referring to the same object is removed
    /// before the stop call; a connection that is not registered is still
    /// stopped (the removal is a no-op). Transport failures propagate with
    /// their original identity and message.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the stop call fails.
    pub async fn stop_connection(&self, connection: &RegisteredConnection) -> Result<(), HubError> {
        self.registry.remove_first(connection);
        connection.stop().await?;
        debug!(active = self.registry.len(), "Stopped connection");
        Ok(())
    }

    /// Stop every registered connection.
    ///
    /// Stops are issued sequentially in registration order (a fold, not a
    /// fan-out). The first failure abandons the iteration and rejects, and
    /// the registry is left untouched; it is only cleared after a fully
    /// successful pass. This deliberately differs from
    /// [`stop_connection`](Self::stop_connection)'s per-item removal.
    ///
    /// # Errors
    ///
    /// Returns the first transport error encountered.
    pub async fn stop_all_connections(&self) -> Result<(), HubError> {
        let entries = self.registry.snapshot();
        debug!(count = entries.len(), "Stopping all connections");
        for entry in &entries {
            entry.stop().await?;
        }
        self.registry.clear();
        Ok(())
    }

    // ---- Lifecycle dispatcher -----------------------------------------

    /// Register a lifecycle callback, dispatching on the presence of an
    /// explicit connection.
    ///
    /// With a connection supplied the callback lands on that connection's
    /// event; without one it lands on the shared hub's. The slot is
    /// validated before any registration, so a rejected callback never
    /// half-registers.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn on_lifecycle(
        &self,
        event: LifecycleEvent,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        let callback = Arc::clone(callback.require()?);
        trace!(event = %event, explicit = connection.is_some(), "Registering lifecycle callback");
        match connection {
            Some(handle) => handle.on_lifecycle(event, callback),
            None => self.shared.on_lifecycle(event, callback),
        }
        Ok(())
    }

    /// `starting` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn starting(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Starting, callback, connection)
    }

    /// `received` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn received(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Received, callback, connection)
    }

    /// `connectionSlow` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn connection_slow(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::ConnectionSlow, callback, connection)
    }

    /// `reconnecting` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn reconnecting(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Reconnecting, callback, connection)
    }

    /// `reconnected` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn reconnected(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Reconnected, callback, connection)
    }

    /// `stateChanged` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn state_changed(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::StateChanged, callback, connection)
    }

    /// `disconnected` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn disconnected(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Disconnected, callback, connection)
    }

    /// `error` lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn on_error(
        &self,
        callback: CallbackSlot<LifecycleCallback>,
        connection: Option<&Arc<dyn ConnectionHandle>>,
    ) -> Result<(), HubError> {
        self.on_lifecycle(LifecycleEvent::Error, callback, connection)
    }

    // ---- Receive ------------------------------------------------------

    /// Register a server-to-client handler on a manual-proxy connection.
    ///
    /// The slot is always forwarded to the proxy, even when absent (the
    /// underlying client treats that as clearing the registration). Note
    /// the asymmetry with [`receive`](Self::receive), which treats an
    /// absent callback as a no-op; both behaviors are kept as the wrapped
    /// client defines them.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] when a callback is supplied
    /// but not callable.
    pub fn receive_proxy(
        &self,
        proxy: &Arc<dyn HubProxy>,
        method: &str,
        callback: CallbackSlot<ReceiveCallback>,
    ) -> Result<(), HubError> {
        let callback = callback.optional()?.map(Arc::clone);
        proxy.on(method, callback);
        Ok(())
    }

    /// Register a server-to-client handler on a generated-proxy connection.
    ///
    /// A callable slot replaces any prior handler for `method`; an absent
    /// slot is silently a no-op (unlike
    /// [`receive_proxy`](Self::receive_proxy), which always forwards).
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] when a callback is supplied
    /// but not callable.
    pub fn receive(
        &self,
        connection: &Arc<dyn ChannelConnection>,
        method: &str,
        callback: CallbackSlot<ReceiveCallback>,
    ) -> Result<(), HubError> {
        if let Some(callback) = callback.optional()? {
            connection.register_client_handler(method, Arc::clone(callback));
        }
        Ok(())
    }

    // ---- Send ---------------------------------------------------------

    /// Invoke a server method through a manual-proxy connection.
    ///
    /// Fire-and-forget: the error-callback slot is validated before the
    /// invoke is issued, then the invocation proceeds in the background.
    /// On failure the error callback (when supplied) receives the
    /// transport error; otherwise the failure is logged.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] when an error callback is
    /// supplied but not callable; in that case the invoke is never issued.
    pub fn send_proxy(
        &self,
        proxy: &Arc<dyn HubProxy>,
        method: &str,
        data: Value,
        error_callback: CallbackSlot<ErrorCallback>,
    ) -> Result<(), HubError> {
        let on_error = error_callback.optional()?.map(Arc::clone);
        let proxy = Arc::clone(proxy);
        let method = method.to_string();
        tokio::spawn(async move {
            if let Err(err) = proxy.invoke(&method, data).await {
                match on_error {
                    Some(callback) => callback(err),
                    None => warn!(method = %method, error = %err, "Hub invoke failed"),
                }
            }
        });
        Ok(())
    }

    /// Invoke a server method through a generated-proxy connection.
    ///
    /// Same contract as [`send_proxy`](Self::send_proxy), routed through
    /// the channel connection's server surface.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] when an error callback is
    /// supplied but not callable; in that case the invoke is never issued.
    pub fn send(
        &self,
        connection: &Arc<dyn ChannelConnection>,
        method: &str,
        data: Value,
        error_callback: CallbackSlot<ErrorCallback>,
    ) -> Result<(), HubError> {
        let on_error = error_callback.optional()?.map(Arc::clone);
        let connection = Arc::clone(connection);
        let method = method.to_string();
        tokio::spawn(async move {
            if let Err(err) = connection.invoke_server(&method, data).await {
                match on_error {
                    Some(callback) => callback(err),
                    None => warn!(method = %method, error = %err, "Hub invoke failed"),
                }
            }
        });
        Ok(())
    }

    // ---- Logging ------------------------------------------------------

    /// Enable or disable client logging, dispatching on the presence of an
    /// explicit connection: the connection itself when supplied, the
    /// shared hub otherwise.
    pub fn set_logging(&self, enabled: bool, connection: Option<&Arc<dyn ConnectionHandle>>) {
        match connection {
            Some(handle) => handle.set_logging(enabled),
            None => self.shared.set_logging(enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HublinkProvider;
    use hublink_transport::{MemoryHubClient, TransportError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn memory_service(channels: &[&str]) -> (Arc<MemoryHubClient>, HubService) {
        let client = Arc::new(MemoryHubClient::with_channels(channels.iter().copied()));
        let service = HublinkProvider::new().build(Arc::clone(&client) as Arc<dyn HubClient>);
        (client, service)
    }

    fn noop_lifecycle() -> CallbackSlot<LifecycleCallback> {
        CallbackSlot::Callable(Arc::new(|_| {}))
    }

    async fn settle() {
        // Let fire-and-forget invokes run on the current-thread runtime.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    // ---- factory ----

    #[test]
    fn test_create_hub_connection_requires_channel() {
        let (_, service) = memory_service(&[]);
        assert!(matches!(
            service.create_hub_connection(None, None),
            Err(HubError::MissingChannel)
        ));
        assert_eq!(service.active_connections(), 0);
    }

    #[test]
    fn test_create_hub_connection_returns_pair_and_registers() {
        let (client, service) = memory_service(&[]);
        let pair = service
            .create_hub_connection(Some("chat"), Some("https://example.test/hub"))
            .unwrap();

        assert_eq!(pair.proxy.channel(), "chat");
        assert_eq!(service.active_connections(), 1);

        let handles = client.handles();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].url().as_deref(), Some("https://example.test/hub"));
        // Logging default (true) applied to the fresh handle.
        assert!(handles[0].logging_enabled());
    }

    #[test]
    fn test_create_hub_connection_twice_registers_twice() {
        let (_, service) = memory_service(&[]);
        service.create_hub_connection(Some("chat"), None).unwrap();
        service.create_hub_connection(Some("chat"), None).unwrap();
        assert_eq!(service.active_connections(), 2);
    }

    #[test]
    fn test_create_connection_requires_channel() {
        let (_, service) = memory_service(&["mockHub"]);
        assert!(matches!(
            service.create_connection(None, None),
            Err(HubError::MissingChannel)
        ));
    }

    #[test]
    fn test_create_connection_unknown_channel() {
        let (_, service) = memory_service(&["mockHub"]);
        let err = service.create_connection(Some("nope"), None).unwrap_err();
        assert!(matches!(err, HubError::UnknownChannel(name) if name == "nope"));
        assert_eq!(service.active_connections(), 0);
    }

    #[test]
    fn test_create_connection_registers_and_applies_defaults() {
        let (client, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();

        assert_eq!(connection.channel(), "mockHub");
        assert_eq!(service.active_connections(), 1);
        assert!(client.shared().logging_enabled());
    }

    #[test]
    fn test_create_connection_url_mutates_shared_hub() {
        let (client, service) = memory_service(&["mockHub", "mockHub2"]);
        service
            .create_connection(Some("mockHub"), Some("https://other.test/signalr"))
            .unwrap();

        // The url lands on the shared hub, visible to every channel
        // multiplexed over it.
        assert_eq!(
            client.shared().url().as_deref(),
            Some("https://other.test/signalr")
        );
    }

    #[test]
    fn test_create_connection_duplicate_entries_preserved() {
        let (_, service) = memory_service(&["mockHub"]);
        service.create_connection(Some("mockHub"), None).unwrap();
        service.create_connection(Some("mockHub"), None).unwrap();
        assert_eq!(service.active_connections(), 2);
    }

    // ---- start ----

    #[tokio::test]
    async fn test_start_hub_connection_missing_is_synchronous() {
        let (_, service) = memory_service(&[]);
        // The error is produced without awaiting anything.
        assert!(matches!(
            service.start_hub_connection(None).map(|_| ()),
            Err(HubError::MissingConnection)
        ));
    }

    #[tokio::test]
    async fn test_start_hub_connection_passes_transport_snapshot() {
        let client = Arc::new(MemoryHubClient::new());
        let mut provider = HublinkProvider::new();
        provider
            .set_transports(&json!(["longPolling", "webSockets"]))
            .unwrap();
        let service = provider.build(Arc::clone(&client) as Arc<dyn HubClient>);

        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        service
            .start_hub_connection(Some(&pair.connection))
            .unwrap()
            .await
            .unwrap();

        let handles = client.handles();
        assert!(handles[0].is_started());
        assert_eq!(
            handles[0].last_start_options().unwrap().transports,
            ["longPolling", "webSockets"]
        );
    }

    #[tokio::test]
    async fn test_start_hub_connection_surfaces_transport_failure() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        client.handles()[0].fail_starts("negotiate refused");

        let err = service
            .start_hub_connection(Some(&pair.connection))
            .unwrap()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Transport(TransportError::StartFailed(message))
                if message == "negotiate refused"
        ));
    }

    #[tokio::test]
    async fn test_start_connection_starts_shared_hub() {
        let (client, service) = memory_service(&["mockHub"]);
        service.start_connection().await.unwrap();

        assert!(client.shared().is_started());
        assert_eq!(
            client.shared().last_start_options().unwrap().transports,
            ["webSockets", "serverSentEvents", "foreverFrame", "longPolling"]
        );
    }

    // ---- teardown ----

    #[tokio::test]
    async fn test_stop_connection_stops_once_and_removes() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        let entry: RegisteredConnection = Arc::clone(&pair.connection).into();

        service.stop_connection(&entry).await.unwrap();
        assert_eq!(service.active_connections(), 0);
        assert_eq!(client.handles()[0].stop_calls(), 1);

        // A later stop-all must not stop it again.
        service.stop_all_connections().await.unwrap();
        assert_eq!(client.handles()[0].stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_connection_unregistered_still_stops() {
        let (client, service) = memory_service(&[]);
        // Handle created directly on the client, never registered.
        let handle = client.create_handle(None);
        let entry: RegisteredConnection = handle.into();

        service.stop_connection(&entry).await.unwrap();
        assert_eq!(client.handles()[0].stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_connection_propagates_stop_error() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        client.handles()[0].fail_stops("socket gone");

        let entry: RegisteredConnection = Arc::clone(&pair.connection).into();
        let err = service.stop_connection(&entry).await.unwrap_err();
        assert_eq!(err.to_string(), "stop failed: socket gone");
        // Removal happened regardless of the failure.
        assert_eq!(service.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_stop_connection_removes_one_duplicate_only() {
        let (client, service) = memory_service(&["mockHub"]);
        // Requesting the same channel twice registers the same underlying
        // object twice.
        let connection = service.create_connection(Some("mockHub"), None).unwrap();
        service.create_connection(Some("mockHub"), None).unwrap();
        assert_eq!(service.active_connections(), 2);

        let entry: RegisteredConnection = connection.into();
        service.stop_connection(&entry).await.unwrap();

        // One occurrence removed, one stop issued, the duplicate stays.
        assert_eq!(service.active_connections(), 1);
        let channel = client.shared().channel_connection("mockHub").unwrap();
        assert_eq!(channel.stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_stops_in_order_and_clears() {
        let (client, service) = memory_service(&[]);
        service.create_hub_connection(Some("chat"), None).unwrap();
        service.create_hub_connection(Some("presence"), None).unwrap();

        service.stop_all_connections().await.unwrap();

        let handles = client.handles();
        assert_eq!(handles[0].stop_calls(), 1);
        assert_eq!(handles[1].stop_calls(), 1);
        assert_eq!(service.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_stop_all_aborts_on_first_failure_and_keeps_registry() {
        let (client, service) = memory_service(&[]);
        service.create_hub_connection(Some("chat"), None).unwrap();
        service.create_hub_connection(Some("presence"), None).unwrap();
        client.handles()[0].fail_stops("boom");

        let err = service.stop_all_connections().await.unwrap_err();
        assert_eq!(err.to_string(), "stop failed: boom");

        let handles = client.handles();
        // First was attempted, second never was.
        assert_eq!(handles[0].stop_calls(), 1);
        assert_eq!(handles[1].stop_calls(), 0);
        // Registry bookkeeping untouched on a partial failure.
        assert_eq!(service.active_connections(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_mixed_shapes() {
        let (client, service) = memory_service(&["mockHub"]);
        service.create_hub_connection(Some("chat"), None).unwrap();
        service.create_connection(Some("mockHub"), None).unwrap();

        service.stop_all_connections().await.unwrap();

        assert_eq!(client.handles()[0].stop_calls(), 1);
        let channel = client.shared().channel_connection("mockHub").unwrap();
        assert_eq!(channel.stop_calls(), 1);
        assert_eq!(service.active_connections(), 0);
    }

    // ---- lifecycle dispatcher ----

    #[test]
    fn test_every_lifecycle_event_rejects_bad_callback() {
        let (_, service) = memory_service(&[]);
        for event in LifecycleEvent::ALL {
            assert!(matches!(
                service.on_lifecycle(event, CallbackSlot::Absent, None),
                Err(HubError::InvalidCallback)
            ));
            assert!(matches!(
                service.on_lifecycle(event, CallbackSlot::NotCallable, None),
                Err(HubError::InvalidCallback)
            ));
        }
    }

    #[test]
    fn test_lifecycle_explicit_connection_targets_that_connection() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();

        for event in LifecycleEvent::ALL {
            service
                .on_lifecycle(event, noop_lifecycle(), Some(&pair.connection))
                .unwrap();
        }

        let handles = client.handles();
        for event in LifecycleEvent::ALL {
            assert_eq!(handles[0].lifecycle_count(event), 1);
            // Nothing leaked onto the shared hub.
            assert_eq!(client.shared().lifecycle_count(event), 0);
        }
    }

    #[test]
    fn test_lifecycle_without_connection_targets_shared_hub() {
        let (client, service) = memory_service(&[]);
        for event in LifecycleEvent::ALL {
            service.on_lifecycle(event, noop_lifecycle(), None).unwrap();
        }
        for event in LifecycleEvent::ALL {
            assert_eq!(client.shared().lifecycle_count(event), 1);
        }
    }

    #[test]
    fn test_named_wrappers_route_to_their_event() {
        let (client, service) = memory_service(&[]);
        service.starting(noop_lifecycle(), None).unwrap();
        service.reconnecting(noop_lifecycle(), None).unwrap();
        service.on_error(noop_lifecycle(), None).unwrap();

        assert_eq!(client.shared().lifecycle_count(LifecycleEvent::Starting), 1);
        assert_eq!(
            client.shared().lifecycle_count(LifecycleEvent::Reconnecting),
            1
        );
        assert_eq!(client.shared().lifecycle_count(LifecycleEvent::Error), 1);
        assert_eq!(
            client.shared().lifecycle_count(LifecycleEvent::Disconnected),
            0
        );
    }

    #[test]
    fn test_registered_lifecycle_callback_fires() {
        let (client, service) = memory_service(&[]);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        service
            .state_changed(
                CallbackSlot::Callable(Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
                None,
            )
            .unwrap();

        client
            .shared()
            .fire(LifecycleEvent::StateChanged, &json!({"newState": 1}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    // ---- receive ----

    #[test]
    fn test_receive_proxy_registers_handler() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();

        let callback: ReceiveCallback = Arc::new(|_| {});
        service
            .receive_proxy(&pair.proxy, "newMessage", CallbackSlot::Callable(callback))
            .unwrap();

        let handles = client.handles();
        let proxies = handles[0].proxies();
        assert!(proxies[0].handler("newMessage").is_some());
    }

    #[test]
    fn test_receive_proxy_absent_forwards_and_clears() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        service
            .receive_proxy(
                &pair.proxy,
                "newMessage",
                CallbackSlot::Callable(Arc::new(|_| {})),
            )
            .unwrap();

        // Absent slot is still forwarded; the memory client clears the
        // registration, matching the underlying client's `on` contract.
        service
            .receive_proxy(&pair.proxy, "newMessage", CallbackSlot::Absent)
            .unwrap();

        let handles = client.handles();
        let proxies = handles[0].proxies();
        assert!(proxies[0].handler("newMessage").is_none());
    }

    #[test]
    fn test_receive_proxy_rejects_not_callable() {
        let (_, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        assert!(matches!(
            service.receive_proxy(&pair.proxy, "newMessage", CallbackSlot::NotCallable),
            Err(HubError::InvalidCallback)
        ));
    }

    #[test]
    fn test_receive_assigns_and_replaces_client_handler() {
        let (_, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();

        let first: ReceiveCallback = Arc::new(|_| {});
        service
            .receive(
                &connection,
                "newMessage",
                CallbackSlot::Callable(Arc::clone(&first)),
            )
            .unwrap();
        let registered = connection.client_handler("newMessage").unwrap();
        assert!(Arc::ptr_eq(&registered, &first));

        let second: ReceiveCallback = Arc::new(|_| {});
        service
            .receive(
                &connection,
                "newMessage",
                CallbackSlot::Callable(Arc::clone(&second)),
            )
            .unwrap();
        let replaced = connection.client_handler("newMessage").unwrap();
        assert!(Arc::ptr_eq(&replaced, &second));
        assert!(!Arc::ptr_eq(&replaced, &first));
    }

    #[test]
    fn test_receive_absent_is_noop() {
        let (_, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();

        let first: ReceiveCallback = Arc::new(|_| {});
        service
            .receive(
                &connection,
                "newMessage",
                CallbackSlot::Callable(Arc::clone(&first)),
            )
            .unwrap();

        // Unlike receive_proxy, an absent callback changes nothing here.
        service
            .receive(&connection, "newMessage", CallbackSlot::Absent)
            .unwrap();
        assert!(connection.client_handler("newMessage").is_some());
    }

    #[test]
    fn test_receive_rejects_not_callable() {
        let (_, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();
        assert!(matches!(
            service.receive(&connection, "newMessage", CallbackSlot::NotCallable),
            Err(HubError::InvalidCallback)
        ));
        assert!(connection.client_handler("newMessage").is_none());
    }

    // ---- send ----

    #[tokio::test]
    async fn test_send_proxy_invokes_method() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();

        service
            .send_proxy(
                &pair.proxy,
                "sendMessage",
                json!({"text": "hi"}),
                CallbackSlot::Absent,
            )
            .unwrap();
        settle().await;

        let handles = client.handles();
        let proxies = handles[0].proxies();
        assert_eq!(
            proxies[0].invocations(),
            [("sendMessage".to_string(), json!({"text": "hi"}))]
        );
    }

    #[tokio::test]
    async fn test_send_proxy_rejects_bad_error_callback_before_invoking() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();

        assert!(matches!(
            service.send_proxy(
                &pair.proxy,
                "sendMessage",
                json!("hi"),
                CallbackSlot::NotCallable,
            ),
            Err(HubError::InvalidCallback)
        ));
        settle().await;

        let handles = client.handles();
        let proxies = handles[0].proxies();
        assert!(proxies[0].invocations().is_empty());
    }

    #[tokio::test]
    async fn test_send_proxy_failure_reaches_error_callback() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();
        {
            let handles = client.handles();
            handles[0].proxies()[0].fail_invokes("server rejected");
        }

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        service
            .send_proxy(
                &pair.proxy,
                "sendMessage",
                json!("hi"),
                CallbackSlot::Callable(Arc::new(move |err| {
                    sink.lock().unwrap().push(err.to_string());
                })),
            )
            .unwrap();
        settle().await;

        assert_eq!(
            *errors.lock().unwrap(),
            vec!["invoke failed: server rejected".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_invokes_server_method() {
        let (client, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();

        service
            .send(&connection, "sendMessage", json!("payload"), CallbackSlot::Absent)
            .unwrap();
        settle().await;

        let channel = client.shared().channel_connection("mockHub").unwrap();
        assert_eq!(
            channel.invocations(),
            [("sendMessage".to_string(), json!("payload"))]
        );
    }

    #[tokio::test]
    async fn test_send_rejects_bad_error_callback_before_invoking() {
        let (client, service) = memory_service(&["mockHub"]);
        let connection = service.create_connection(Some("mockHub"), None).unwrap();

        assert!(matches!(
            service.send(
                &connection,
                "sendMessage",
                json!("hi"),
                CallbackSlot::NotCallable,
            ),
            Err(HubError::InvalidCallback)
        ));
        settle().await;

        let channel = client.shared().channel_connection("mockHub").unwrap();
        assert!(channel.invocations().is_empty());
    }

    // ---- logging ----

    #[test]
    fn test_runtime_logging_dispatch() {
        let (client, service) = memory_service(&[]);
        let pair = service.create_hub_connection(Some("chat"), None).unwrap();

        service.set_logging(false, Some(&pair.connection));
        assert!(!client.handles()[0].logging_enabled());

        service.set_logging(true, None);
        assert!(client.shared().logging_enabled());
    }

    #[test]
    fn test_provider_logging_default_applied_to_new_connections() {
        let client = Arc::new(MemoryHubClient::with_channels(["mockHub"]));
        let mut provider = HublinkProvider::new();
        provider.set_logging(false);
        let service = provider.build(Arc::clone(&client) as Arc<dyn HubClient>);

        service.create_hub_connection(Some("chat"), None).unwrap();
        assert!(!client.handles()[0].logging_enabled());

        service.create_connection(Some("mockHub"), None).unwrap();
        assert!(!client.shared().logging_enabled());
    }

    #[test]
    fn test_default_url_applied_to_shared_hub_and_handles() {
        let client = Arc::new(MemoryHubClient::new());
        let mut provider = HublinkProvider::new();
        provider.set_url("https://default.test/signalr");
        let service = provider.build(Arc::clone(&client) as Arc<dyn HubClient>);

        assert_eq!(
            client.shared().url().as_deref(),
            Some("https://default.test/signalr")
        );

        service.create_hub_connection(Some("chat"), None).unwrap();
        assert_eq!(
            client.handles()[0].url().as_deref(),
            Some("https://default.test/signalr")
        );

        // Explicit url wins over the default.
        service
            .create_hub_connection(Some("chat"), Some("https://explicit.test"))
            .unwrap();
        assert_eq!(
            client.handles()[1].url().as_deref(),
            Some("https://explicit.test")
        );
    }
}
