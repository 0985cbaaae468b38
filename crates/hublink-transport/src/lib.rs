//! # hublink-transport
//!
//! Transport client abstraction for the hublink hub-messaging service.
//!
//! This crate defines the surface the service layer consumes from an
//! underlying realtime client (WebSocket, SSE, forever-frame, long-polling
//! negotiation all live behind it):
//!
//! - **`HubClient`** - entry point, hands out connection handles and the
//!   shared hub
//! - **`ConnectionHandle` / `HubProxy`** - manual-proxy mode: an explicit
//!   per-connection handle plus a channel-bound proxy
//! - **`SharedHub` / `ChannelConnection`** - generated-proxy mode: one
//!   process-wide hub multiplexing pre-bound channel connections
//! - **`LifecycleEvent`** - the named notification points every connection
//!   shape exposes
//!
//! ## Architecture
//!
//! ```text
//!                      ┌─────────────┐
//!                ┌────▶│  Handle     │────▶ HubProxy (per channel)
//! ┌───────────┐  │     └─────────────┘
//! │ HubClient │──┤
//! └───────────┘  │     ┌─────────────┐
//!                └────▶│  SharedHub  │────▶ ChannelConnection (per channel)
//!                      └─────────────┘
//! ```
//!
//! The [`memory`] module provides a loopback implementation of the whole
//! surface for tests and local development. Real transport stacks implement
//! these traits out of tree.

pub mod lifecycle;
pub mod memory;
pub mod traits;

pub use lifecycle::{ErrorCallback, LifecycleCallback, LifecycleEvent, ReceiveCallback};
pub use memory::MemoryHubClient;
pub use traits::{
    ChannelConnection, ConnectionHandle, HubClient, HubProxy, SharedHub, StartOptions,
    TransportError, DEFAULT_TRANSPORT_ORDER,
};
