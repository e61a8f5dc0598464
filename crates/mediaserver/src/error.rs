//! Errors from the media-server adapter.

use aura_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum MediaServerError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Media server rejected the token ({status})")]
    Unauthorized { status: u16 },

    #[error("Not found on media server: {0}")]
    NotFound(String),

    /// Any other non-2xx status.
    #[error("Media server error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server answered, but not with what we asked for.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl From<MediaServerError> for CoreError {
    fn from(err: MediaServerError) -> Self {
        match &err {
            MediaServerError::Request(_) => CoreError::Unreachable(err.to_string()),
            MediaServerError::Unauthorized { .. } => CoreError::Unauthorized(err.to_string()),
            MediaServerError::NotFound(what) => CoreError::NotFound {
                entity: "media_server_item",
                id: what.clone(),
            },
            MediaServerError::Api { status, .. } if *status >= 500 => {
                CoreError::Unreachable(err.to_string())
            }
            MediaServerError::Api { .. }
            | MediaServerError::Decode(_)
            | MediaServerError::Unexpected(_) => CoreError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use aura_core::error::ErrorKind;

    #[test]
    fn maps_to_core_kinds() {
        let kind = |e: MediaServerError| CoreError::from(e).kind();
        assert_eq!(kind(MediaServerError::Unauthorized { status: 401 }), ErrorKind::Unauthorized);
        assert_eq!(kind(MediaServerError::NotFound("123".into())), ErrorKind::NotFound);
        assert_eq!(
            kind(MediaServerError::Api { status: 503, body: String::new() }),
            ErrorKind::Unreachable
        );
        assert_eq!(kind(MediaServerError::Unexpected("x".into())), ErrorKind::Internal);
    }

    #[test]
    fn not_found_keeps_the_missing_key() {
        let err = CoreError::from(MediaServerError::NotFound("4567".into()));
        assert_matches!(err, CoreError::NotFound { entity: "media_server_item", ref id } if id == "4567");
    }
}
