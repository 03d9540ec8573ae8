use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{DEFAULT_HTTP_TIMEOUT, ProviderError, http_client, parse_base_url};
use crate::metadata::parse::parse_year;

const TMDB_V3_BASE: &str = "https://api.themoviedb.org/3";

/// Movie catalog lookups used during enrichment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn search_movies(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ProviderError>;

    /// Full record including credits and videos.
    async fn fetch_movie(&self, id: i64) -> Result<MovieDetails, ProviderError>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MovieCandidate {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
}

impl MovieCandidate {
    pub fn release_year(&self) -> Option<i32> {
        parse_year(self.release_date.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub production_companies: Vec<TmdbCompany>,
    #[serde(default)]
    pub credits: TmdbCredits,
    #[serde(default)]
    pub videos: TmdbVideos,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbCompany {
    pub id: i64,
    pub name: String,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbCastMember {
    pub id: i64,
    pub name: String,
    pub character: Option<String>,
    #[serde(default)]
    pub order: i32,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbCrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: String,
    pub department: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub video_type: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<MovieCandidate>,
}

#[derive(Debug, Deserialize)]
struct TmdbErrorBody {
    #[serde(default)]
    status_message: Option<String>,
}

/// TMDB v3 over plain HTTP.
#[derive(Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    language: Option<String>,
    base_url: String,
}

impl fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, language: Option<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(api_key, language, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        language: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidApiKey);
        }
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            language,
            base_url: TMDB_V3_BASE.to_string(),
        })
    }

    /// Send requests to another host, such as a caching proxy.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ProviderError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut query: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        if let Some(language) = &self.language {
            query.push(("language", language.clone()));
        }
        query.extend(params.iter().cloned());

        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(&query).send().await?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body)
                .map_err(|e| ProviderError::ParseError(format!("{path}: {e}")));
        }

        let message = response
            .json::<TmdbErrorBody>()
            .await
            .ok()
            .and_then(|body| body.status_message);
        Err(ProviderError::from_status(status, message))
    }
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn search_movies(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ProviderError> {
        let mut params = vec![
            ("query", title.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(year) = year.filter(|y| *y > 0) {
            params.push(("year", year.to_string()));
        }
        let page: SearchPage = self.get_json("/search/movie", &params).await?;
        Ok(page.results)
    }

    async fn fetch_movie(&self, id: i64) -> Result<MovieDetails, ProviderError> {
        self.get_json(
            &format!("/movie/{id}"),
            &[("append_to_response", "credits,videos".to_string())],
        )
        .await
    }
}
