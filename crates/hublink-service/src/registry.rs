//! Registry of active connections.
//!
//! An ordered collection of every connection the factory has handed out,
//! so all of them can be stopped together. Entries are compared by object
//! identity, never by value: the same channel requested twice yields two
//! distinct entries, and registering one connection twice yields duplicate
//! entries on purpose (this mirrors the underlying client's usage pattern).

use hublink_transport::{ChannelConnection, ConnectionHandle, TransportError};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// A connection as tracked by the registry: either an explicit handle
/// (manual-proxy mode) or a pre-bound channel connection (generated-proxy
/// mode).
#[derive(Clone)]
pub enum RegisteredConnection {
    /// Manual-proxy mode connection handle.
    Handle(Arc<dyn ConnectionHandle>),
    /// Generated-proxy mode channel connection.
    Channel(Arc<dyn ChannelConnection>),
}

fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    // Compare data pointers only; vtable pointers may differ across
    // codegen units for the same object.
    std::ptr::eq(
        Arc::as_ptr(a) as *const u8,
        Arc::as_ptr(b) as *const u8,
    )
}

impl RegisteredConnection {
    /// Stop the underlying connection, whichever shape it is.
    pub async fn stop(&self) -> Result<(), TransportError> {
        match self {
            RegisteredConnection::Handle(handle) => handle.stop().await,
            RegisteredConnection::Channel(connection) => connection.stop().await,
        }
    }

    /// Whether both entries refer to the same underlying object.
    #[must_use]
    pub fn same_as(&self, other: &RegisteredConnection) -> bool {
        match (self, other) {
            (RegisteredConnection::Handle(a), RegisteredConnection::Handle(b)) => same_object(a, b),
            (RegisteredConnection::Channel(a), RegisteredConnection::Channel(b)) => {
                same_object(a, b)
            }
            _ => false,
        }
    }
}

impl From<Arc<dyn ConnectionHandle>> for RegisteredConnection {
    fn from(handle: Arc<dyn ConnectionHandle>) -> Self {
        RegisteredConnection::Handle(handle)
    }
}

impl From<Arc<dyn ChannelConnection>> for RegisteredConnection {
    fn from(connection: Arc<dyn ChannelConnection>) -> Self {
        RegisteredConnection::Channel(connection)
    }
}

/// Ordered collection of active connections.
///
/// Owned by the service instance; mutation always goes through the service,
/// never through shared global state. The lock is never held across an
/// await point.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Vec<RegisteredConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a connection. Duplicate registrations are allowed.
    pub fn register(&self, entry: RegisteredConnection) {
        let mut entries = self.entries.lock().expect("registry poisoned");
        entries.push(entry);
        debug!(active = entries.len(), "Registered connection");
    }

    /// Remove the first entry referring to the same object as `target`.
    ///
    /// Removes one occurrence only; further duplicates stay registered.
    /// When no entry matches this is a no-op, mirroring the underlying
    /// sequence semantics of removing at a missing index.
    pub fn remove_first(&self, target: &RegisteredConnection) -> Option<RegisteredConnection> {
        let mut entries = self.entries.lock().expect("registry poisoned");
        let position = entries.iter().position(|entry| entry.same_as(target));
        match position {
            Some(index) => {
                let removed = entries.remove(index);
                debug!(active = entries.len(), "Removed connection from registry");
                Some(removed)
            }
            None => {
                trace!("Connection not present in registry; nothing removed");
                None
            }
        }
    }

    /// Every registered connection, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RegisteredConnection> {
        self.entries.lock().expect("registry poisoned").clone()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("registry poisoned").clear();
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry poisoned").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
