//! Errors from the MediUX adapter.

use aura_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum MediuxError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// MediUX rejected the token.
    #[error("MediUX rejected the token ({status})")]
    Unauthorized { status: u16 },

    /// MediUX returned a non-2xx status code.
    #[error("MediUX API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The GraphQL response carried an `errors` array.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("WebSocket connection error: {0}")]
    Connection(String),

    #[error("Image cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediuxError> for CoreError {
    fn from(err: MediuxError) -> Self {
        match err {
            MediuxError::Request(_) | MediuxError::Connection(_) => {
                CoreError::Unreachable(err.to_string())
            }
            MediuxError::Unauthorized { .. } => CoreError::Unauthorized(err.to_string()),
            MediuxError::Api { status: 404, .. } => CoreError::NotFound {
                entity: "mediux_resource",
                id: err.to_string(),
            },
            MediuxError::Api { status, .. } if status >= 500 => {
                CoreError::Unreachable(err.to_string())
            }
            MediuxError::Api { .. } | MediuxError::GraphQl(_) | MediuxError::Decode(_) => {
                CoreError::Internal(err.to_string())
            }
            MediuxError::Io(_) => CoreError::Internal(err.to_string()),
        }
    }
}
