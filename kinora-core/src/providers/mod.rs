//! External catalog services and the logic for picking among their results.

pub mod deezer;
pub mod matching;
pub mod memo;
pub mod tmdb;

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

pub use deezer::{AlbumMatch, ArtistMatch, DeezerClient, MusicCatalog};
pub use memo::MemoizedMusicCatalog;
pub use tmdb::{MovieCandidate, MovieCatalog, MovieDetails, TmdbClient};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not found")]
    NotFound,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProviderError {
    /// Map a non-success status. 429 is surfaced as-is and never retried.
    pub(crate) fn from_status(status: StatusCode, message: Option<String>) -> Self {
        match status.as_u16() {
            401 => ProviderError::InvalidApiKey,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited,
            _ => ProviderError::ApiError(
                message.unwrap_or_else(|| format!("request failed with status {status}")),
            ),
        }
    }
}

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client for catalog services.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kinora/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::from)
}

/// Validate an API base URL and strip its trailing slash so endpoint paths
/// can be appended directly.
pub(crate) fn parse_base_url(raw: &str) -> Result<String, ProviderError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ProviderError::ApiError(format!("invalid base URL '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProviderError::ApiError(format!("unsupported base URL scheme '{}'", parsed.scheme())));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
