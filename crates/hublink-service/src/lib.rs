//! # hublink-service
//!
//! An injectable connection-lifecycle service over a hub-messaging
//! transport client.
//!
//! The service wraps a realtime client (hub-based publish/invoke over
//! WebSockets with long-polling fallbacks) behind a small, uniform API:
//!
//! - **Provider** - two-phase configuration: set transports, logging and
//!   endpoint defaults, then build the runtime service
//! - **Factory** - create connections in manual-proxy mode (explicit
//!   handle + channel proxy) or generated-proxy mode (pre-bound channel
//!   connection over one shared hub)
//! - **Registry** - every created connection is tracked so all of them can
//!   be stopped together
//! - **Dispatcher** - one lifecycle-event API for both connection shapes,
//!   dispatching on whether an explicit connection is supplied
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  build   ┌─────────────┐
//! │ HublinkProvider  │─────────▶│  HubService │
//! └──────────────────┘          └──────┬──────┘
//!                                      │ owns
//!                  ┌───────────────────┼────────────────────┐
//!                  ▼                   ▼                    ▼
//!          ┌──────────────┐   ┌────────────────────┐   ┌──────────────┐
//!          │   factory    │──▶│ ConnectionRegistry │◀──│   teardown   │
//!          └──────────────┘   └────────────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use hublink_service::HublinkProvider;
//! use hublink_transport::MemoryHubClient;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), hublink_service::HubError> {
//! let mut provider = HublinkProvider::new();
//! provider.set_transports(&serde_json::json!(["webSockets", "longPolling"]))?;
//!
//! let service = provider.build(Arc::new(MemoryHubClient::new()));
//! let chat = service.create_hub_connection(Some("chat"), None)?;
//! service.start_hub_connection(Some(&chat.connection))?.await?;
//! service.stop_all_connections().await?;
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod error;
pub mod provider;
pub mod registry;
pub mod service;

pub use callback::CallbackSlot;
pub use error::HubError;
pub use provider::HublinkProvider;
pub use registry::{ConnectionRegistry, RegisteredConnection};
pub use service::{HubConnection, HubService};
