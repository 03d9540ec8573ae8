use thiserror::Error;

use crate::metadata::ProbeError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Catalog provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
