//! Service errors.
//!
//! Two distinct channels, never conflated: argument validation fails
//! synchronously with one of the variants below, while transport start and
//! stop failures only ever surface through the returned futures (wrapped in
//! [`HubError::Transport`]).

use hublink_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the hublink service.
#[derive(Debug, Error)]
pub enum HubError {
    /// A required channel name was not supplied.
    #[error("channel is undefined")]
    MissingChannel,

    /// A required connection was not supplied.
    #[error("connection is undefined")]
    MissingConnection,

    /// The transport list is not an array of strings.
    #[error("transports must be an array of strings")]
    InvalidTransports,

    /// A supplied callback slot does not hold anything callable.
    #[error("callback is not a function")]
    InvalidCallback,

    /// Generated-proxy lookup found no connection for the channel.
    #[error("no channel connection registered for hub '{0}'")]
    UnknownChannel(String),

    /// Reading or parsing a configuration file failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operational failure from the underlying transport client.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
