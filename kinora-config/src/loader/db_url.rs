use url::Url;

use crate::{
    loader::ConfigLoadError,
    models::sources::{EnvConfig, FileDatabaseConfig},
    util::non_empty,
};

const POSTGRES_SCHEMES: &[&str] = &["postgres", "postgresql"];

/// Resolve the PostgreSQL URL, with `DATABASE_URL` taking precedence over the
/// file. Whichever value wins must parse as a `postgres://` URL.
pub fn resolve_database_url(
    env: &EnvConfig,
    file_database: &FileDatabaseConfig,
) -> Result<Option<String>, ConfigLoadError> {
    let Some(raw) = non_empty(env.database_url.clone()).or_else(|| non_empty(file_database.url.clone()))
    else {
        return Ok(None);
    };

    let parsed = Url::parse(&raw).map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    if !POSTGRES_SCHEMES.contains(&parsed.scheme()) {
        return Err(ConfigLoadError::UnsupportedDatabaseScheme {
            scheme: parsed.scheme().to_string(),
        });
    }

    Ok(Some(raw))
}
