use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy of the write pipeline.
///
/// `NotFound`, `Concurrency` and `Validation` are expected, caller-recoverable
/// outcomes; storage variants propagate the underlying failure unchanged.
#[derive(Error, Debug)]
pub enum QuillError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl QuillError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
