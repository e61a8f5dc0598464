use aura_core::error::CoreError;
use aura_db::DbError;
use aura_mediaserver::MediaServerError;
use aura_mediux::MediuxError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    MediaServer(#[from] MediaServerError),

    #[error(transparent)]
    Mediux(#[from] MediuxError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The refetched item no longer matches the stored identity.
    #[error("Media item changed identity: {0}")]
    Conflict(String),

    /// The live item has no season or episode for this file.
    #[error("No target on the media server for {0}")]
    MissingTarget(String),
}

impl From<PipelineError> for CoreError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MediaServer(e) => e.into(),
            PipelineError::Mediux(e) => e.into(),
            PipelineError::Db(e) => e.into(),
            PipelineError::Io(e) => CoreError::Internal(e.to_string()),
            PipelineError::Conflict(msg) => CoreError::Conflict(msg),
            PipelineError::MissingTarget(what) => CoreError::NotFound {
                entity: "media_server_slot",
                id: what,
            },
        }
    }
}
