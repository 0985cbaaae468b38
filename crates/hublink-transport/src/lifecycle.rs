//! Lifecycle event vocabulary shared by every connection shape.

use crate::traits::TransportError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback attached to a connection lifecycle event.
///
/// The payload is whatever the underlying client reports for the event
/// (state-change records, error details, raw received frames), passed
/// through as JSON.
pub type LifecycleCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback invoked when a hub method payload arrives from the server.
pub type ReceiveCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Failure continuation attached to a fire-and-forget invoke.
pub type ErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;

/// A named notification point in a connection's life.
///
/// Both connection shapes (explicit handle and shared hub) expose the same
/// eight events, which is what lets the service dispatch registrations to
/// either shape through a single code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Connection is about to start.
    Starting,
    /// Any data was received on the connection.
    Received,
    /// The client detected a slow or unresponsive connection.
    ConnectionSlow,
    /// The client lost its connection and is retrying.
    Reconnecting,
    /// The client re-established its connection.
    Reconnected,
    /// The connection state changed (connecting, connected, ...).
    StateChanged,
    /// The connection was closed.
    Disconnected,
    /// An error occurred on the connection.
    Error,
}

impl LifecycleEvent {
    /// Every lifecycle event, in wire-documentation order.
    pub const ALL: [LifecycleEvent; 8] = [
        LifecycleEvent::Starting,
        LifecycleEvent::Received,
        LifecycleEvent::ConnectionSlow,
        LifecycleEvent::Reconnecting,
        LifecycleEvent::Reconnected,
        LifecycleEvent::StateChanged,
        LifecycleEvent::Disconnected,
        LifecycleEvent::Error,
    ];

    /// The event's wire name (camelCase, as the underlying client spells it).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Starting => "starting",
            LifecycleEvent::Received => "received",
            LifecycleEvent::ConnectionSlow => "connectionSlow",
            LifecycleEvent::Reconnecting => "reconnecting",
            LifecycleEvent::Reconnected => "reconnected",
            LifecycleEvent::StateChanged => "stateChanged",
            LifecycleEvent::Disconnected => "disconnected",
            LifecycleEvent::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
