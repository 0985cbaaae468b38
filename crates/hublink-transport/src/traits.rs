//! Collaborator traits consumed by the hublink service.
//!
//! These traits describe the two usage shapes of the wrapped realtime
//! client, allowing the service layer to stay implementation-agnostic.

use crate::lifecycle::{LifecycleCallback, LifecycleEvent, ReceiveCallback};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Default transport preference order handed to connection negotiation.
///
/// The order is a preference list, tried first to last. The service passes
/// whatever list it was configured with verbatim; these are only the
/// out-of-the-box defaults.
pub const DEFAULT_TRANSPORT_ORDER: [&str; 4] = [
    "webSockets",
    "serverSentEvents",
    "foreverFrame",
    "longPolling",
];

/// Options handed to a connection start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Transport method names, in preference order. Passed verbatim to
    /// negotiation; duplicates are not filtered.
    pub transports: Vec<String>,
}

impl StartOptions {
    /// Create start options with the given transport preference order.
    #[must_use]
    pub fn new(transports: Vec<String>) -> Self {
        Self { transports }
    }
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            transports: DEFAULT_TRANSPORT_ORDER
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }
}

/// Transport client errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Starting the connection failed.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Stopping the connection failed.
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// A hub method invocation failed.
    #[error("invoke failed: {0}")]
    InvokeFailed(String),

    /// No channel with the given name is known to the shared hub.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// The injected realtime client.
///
/// Entry point for both usage shapes: explicit handles (manual-proxy mode)
/// and the process-wide shared hub (generated-proxy mode). An
/// implementation is handed to the service at construction; the service
/// never reaches for an ambient global.
pub trait HubClient: Send + Sync {
    /// Create a fresh connection handle.
    ///
    /// When `url` is `None` the client's default endpoint is used.
    fn create_handle(&self, url: Option<&str>) -> Arc<dyn ConnectionHandle>;

    /// The shared hub underlying every generated-proxy channel connection.
    ///
    /// Implementations return the same hub on every call; all channel
    /// connections are multiplexed over it.
    fn shared_hub(&self) -> Arc<dyn SharedHub>;
}

/// One explicit transport connection (manual-proxy mode).
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Create a proxy bound to `channel` on this connection.
    fn create_proxy(&self, channel: &str) -> Arc<dyn HubProxy>;

    /// Open the connection. Completes when the transport signals
    /// connection-open.
    async fn start(&self, options: StartOptions) -> Result<(), TransportError>;

    /// Close the connection. Completes when the transport signals
    /// connection-closed.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Enable or disable client-side logging for this connection.
    fn set_logging(&self, enabled: bool);

    /// Register a callback for a named lifecycle event.
    fn on_lifecycle(&self, event: LifecycleEvent, callback: LifecycleCallback);
}

/// A channel-bound proxy created from a connection handle.
#[async_trait]
pub trait HubProxy: Send + Sync {
    /// The channel this proxy is bound to.
    fn channel(&self) -> &str;

    /// Register a handler for a server-to-client method.
    ///
    /// An absent callback is still forwarded; the underlying client treats
    /// it as clearing the registration for `method`.
    fn on(&self, method: &str, callback: Option<ReceiveCallback>);

    /// Invoke a server-side method with the given payload.
    ///
    /// The returned future is the invocation's completion signal; failure
    /// continuations attach here.
    async fn invoke(&self, method: &str, data: Value) -> Result<(), TransportError>;
}

/// The process-wide hub behind generated-proxy mode.
///
/// One shared hub multiplexes every [`ChannelConnection`]; url and logging
/// writes on it are therefore visible to all channels.
#[async_trait]
pub trait SharedHub: Send + Sync {
    /// Look up the pre-bound connection for `channel`.
    ///
    /// Returns `None` when no such channel is known to the hub.
    fn channel(&self, name: &str) -> Option<Arc<dyn ChannelConnection>>;

    /// Open the shared hub connection.
    async fn start(&self, options: StartOptions) -> Result<(), TransportError>;

    /// Close the shared hub connection.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Point the shared hub at a different endpoint. Affects every channel
    /// multiplexed over it.
    fn set_url(&self, url: &str);

    /// Enable or disable client-side logging for the shared hub.
    fn set_logging(&self, enabled: bool);

    /// Register a callback for a named lifecycle event.
    fn on_lifecycle(&self, event: LifecycleEvent, callback: LifecycleCallback);
}

/// A pre-bound channel connection (generated-proxy mode).
///
/// Exposes the channel's `client` surface (server-to-client handlers) and
/// `server` surface (client-to-server invokes).
#[async_trait]
pub trait ChannelConnection: Send + Sync {
    /// The channel this connection is bound to.
    fn channel(&self) -> &str;

    /// Assign the handler for a server-to-client method, replacing any
    /// prior handler registered under the same name.
    fn register_client_handler(&self, method: &str, callback: ReceiveCallback);

    /// The currently registered handler for `method`, if any.
    fn client_handler(&self, method: &str) -> Option<ReceiveCallback>;

    /// Invoke a server-side method on this channel.
    async fn invoke_server(&self, method: &str, data: Value) -> Result<(), TransportError>;

    /// Stop this channel connection.
    async fn stop(&self) -> Result<(), TransportError>;
}

impl std::fmt::Debug for dyn ChannelConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("channel", &self.channel())
            .finish_non_exhaustive()
    }
}
