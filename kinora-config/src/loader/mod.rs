use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use once_cell::sync::Lazy;
use tracing::debug;

mod db_url;
mod error;

pub use db_url::resolve_database_url;
pub use error::ConfigLoadError;

use crate::{
    models::{
        Config, ConfigMetadata, ConfigWarnings, DEFAULT_FFPROBE_PATH, DEFAULT_MAX_CONNECTIONS,
        DatabaseConfig, LibraryConfig, ProviderConfig, ScannerConfig,
        sources::{EnvConfig, FileConfig},
    },
    util::{non_empty, non_empty_path, parse_bool},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> =
    Lazy::new(|| vec![PathBuf::from("kinora.toml"), PathBuf::from("config/kinora.toml")]);

/// Result of a successful load. Warnings are for the caller to log.
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Directory the default `kinora.toml` locations are resolved against.
    /// Defaults to the working directory.
    pub search_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_search_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.options.search_dir = Some(dir.into());
        self
    }

    /// Load `.env` into the process environment, then resolve the
    /// configuration from the file and the environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        self.compose(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolve against the given environment values without touching the
    /// process environment or any `.env` file.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        self.compose(env, false)
    }

    fn compose(&self, env: EnvConfig, env_file_loaded: bool) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();
        let (file, config_path) = self.load_file_config(&env, &mut warnings)?;
        let FileConfig {
            database: file_database,
            libraries: file_libraries,
            providers: file_providers,
            scanner: file_scanner,
        } = file;

        let max_connections = parse_env::<u32>(
            "DATABASE_MAX_CONNECTIONS",
            env.database_max_connections.as_deref(),
            &mut warnings,
        )
        .or(file_database.max_connections)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let max_connections = if max_connections == 0 {
            warnings.push(format!(
                "database max_connections must be positive; using {DEFAULT_MAX_CONNECTIONS}"
            ));
            DEFAULT_MAX_CONNECTIONS
        } else {
            max_connections
        };
        let database = DatabaseConfig {
            url: resolve_database_url(&env, &file_database)?,
            max_connections,
        };

        let libraries = LibraryConfig {
            movies_root: non_empty_path(env.movies_root.clone())
                .or_else(|| non_empty_path(file_libraries.movies_root)),
            music_root: non_empty_path(env.music_root.clone())
                .or_else(|| non_empty_path(file_libraries.music_root)),
        };
        if libraries.movies_root.is_none() {
            warnings.push_with_hint(
                "movies library root is not set; movie scans will do nothing",
                "set KINORA_MOVIES_ROOT or [libraries].movies_root",
            );
        }
        if libraries.music_root.is_none() {
            warnings.push_with_hint(
                "music library root is not set; music scans will do nothing",
                "set KINORA_MUSIC_ROOT or [libraries].music_root",
            );
        }

        let music_catalog_enabled = match env.music_catalog.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_bool(raw).or_else(|| {
                warnings.push(format!(
                    "KINORA_MUSIC_CATALOG has unrecognized value '{raw}'; ignoring it"
                ));
                None
            }),
            _ => None,
        }
        .or(file_providers.music_catalog_enabled)
        .unwrap_or(true);

        let providers = ProviderConfig {
            tmdb_api_key: non_empty(env.tmdb_api_key.clone())
                .or_else(|| non_empty(file_providers.tmdb_api_key)),
            tmdb_language: non_empty(env.tmdb_language.clone())
                .or_else(|| non_empty(file_providers.tmdb_language)),
            music_catalog_enabled,
            ffprobe_path: non_empty(env.ffprobe_path.clone())
                .or_else(|| non_empty(file_providers.ffprobe_path))
                .unwrap_or_else(|| DEFAULT_FFPROBE_PATH.to_string()),
        };

        let mut scanner = ScannerConfig::default();
        if let Some(batch_size) = parse_env::<usize>(
            "KINORA_SCAN_BATCH_SIZE",
            env.scan_batch_size.as_deref(),
            &mut warnings,
        )
        .or(file_scanner.batch_size)
        {
            scanner.batch_size = batch_size;
        }
        if scanner.normalize() {
            warnings.push(format!(
                "scan batch size must be positive; using {}",
                scanner.batch_size
            ));
        }

        let config = Config {
            database,
            libraries,
            providers,
            scanner,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
        warnings: &mut ConfigWarnings,
    ) -> Result<(FileConfig, Option<PathBuf>), ConfigLoadError> {
        let requested = self
            .options
            .config_path
            .clone()
            .or_else(|| non_empty_path(env.config_path.clone()));

        let path = match requested {
            Some(path) if !path.exists() => return Err(ConfigLoadError::MissingConfig { path }),
            Some(path) => path,
            None => match self.default_location() {
                Some(path) => path,
                None => {
                    warnings.push_with_hint(
                        "No kinora.toml detected; using environment variables only",
                        "set KINORA_CONFIG_PATH or create kinora.toml",
                    );
                    return Ok((FileConfig::default(), None));
                }
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok((file_config, Some(path)))
    }

    fn default_location(&self) -> Option<PathBuf> {
        let base = self.options.search_dir.as_deref().unwrap_or(Path::new(""));
        DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(|candidate| base.join(candidate))
            .find(|candidate| candidate.is_file())
    }
}

fn parse_env<T: FromStr>(name: &str, raw: Option<&str>, warnings: &mut ConfigWarnings) -> Option<T> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warnings.push(format!("{name} has invalid value '{raw}'; ignoring it"));
            None
        }
    }
}
