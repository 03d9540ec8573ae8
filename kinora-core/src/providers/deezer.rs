use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{DEFAULT_HTTP_TIMEOUT, ProviderError, http_client, parse_base_url};

const DEEZER_API_BASE: &str = "https://api.deezer.com";

/// Music catalog lookups used during enrichment. `Ok(None)` is "no match".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn search_artist(&self, name: &str) -> Result<Option<ArtistMatch>, ProviderError>;

    async fn search_album(&self, title: &str) -> Result<Option<AlbumMatch>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistMatch {
    pub id: i64,
    pub name: String,
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumMatch {
    pub id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    error: Option<DeezerError>,
}

#[derive(Debug, Deserialize)]
struct DeezerError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
struct DeezerArtist {
    id: i64,
    name: String,
    picture_xl: Option<String>,
    picture_big: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbum {
    id: i64,
    title: String,
    cover_xl: Option<String>,
    cover_big: Option<String>,
    artist: Option<DeezerAlbumArtist>,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbumArtist {
    name: String,
}

fn non_blank(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
}

/// Deezer's public search API. No key needed.
#[derive(Debug, Clone)]
pub struct DeezerClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeezerClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: DEEZER_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ProviderError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    async fn search<T>(&self, endpoint: &str, query: &str) -> Result<Vec<T>, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/search/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("limit", "5")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status, None));
        }

        let body = response.bytes().await?;
        let parsed: SearchResponse<T> = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::ParseError(format!("search/{endpoint}: {e}")))?;

        // Deezer reports quota errors in a 200 body.
        if let Some(error) = parsed.error {
            return Err(match error.code {
                4 => ProviderError::RateLimited,
                800 => ProviderError::NotFound,
                _ => ProviderError::ApiError(format!("{}: {}", error.kind, error.message)),
            });
        }
        Ok(parsed.data)
    }
}

#[async_trait]
impl MusicCatalog for DeezerClient {
    async fn search_artist(&self, name: &str) -> Result<Option<ArtistMatch>, ProviderError> {
        let artists: Vec<DeezerArtist> = self.search("artist", name).await?;
        Ok(artists.into_iter().next().map(|a| ArtistMatch {
            id: a.id,
            name: a.name,
            picture_url: non_blank(a.picture_xl).or(non_blank(a.picture_big)),
        }))
    }

    async fn search_album(&self, title: &str) -> Result<Option<AlbumMatch>, ProviderError> {
        let albums: Vec<DeezerAlbum> = self.search("album", title).await?;
        Ok(albums.into_iter().next().map(|a| AlbumMatch {
            id: a.id,
            title: a.title,
            artist: a.artist.map(|artist| artist.name),
            cover_url: non_blank(a.cover_xl).or(non_blank(a.cover_big)),
        }))
    }
}
