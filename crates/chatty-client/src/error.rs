use thiserror::Error;

use chatty_net::TransportError;
use chatty_shared::constants::NO_PEER_SELECTED;
use chatty_store::StoreError;

/// Errors surfaced by the client core.
///
/// Every variant is recoverable: the operation that produced it has already
/// cleared its loading flag and recorded the message in its container.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The backend rejected the call or could not be reached. `message` is
    /// the server's own text, or the per-operation fallback.
    #[error("{message}")]
    Api { message: String },

    #[error("{}", NO_PEER_SELECTED)]
    NoPeerSelected,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Push transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Settings error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}
