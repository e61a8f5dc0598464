use aura_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Malformed JSON in column {column}: {source}")]
    Json {
        column: &'static str,
        source: serde_json::Error,
    },

    #[error("Migration to v{version} failed: {message}")]
    Migration { version: i64, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    pub(crate) fn json(column: &'static str, source: serde_json::Error) -> Self {
        DbError::Json { column, source }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => core,
            other => CoreError::Persistence(other.to_string()),
        }
    }
}
