use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub libraries: FileLibraryConfig,
    #[serde(default)]
    pub providers: FileProviderConfig,
    #[serde(default)]
    pub scanner: FileScannerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLibraryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_catalog_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScannerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Raw values read from the process environment.
///
/// Numeric and boolean variables are kept as text so the loader can warn
/// about values it cannot parse instead of silently dropping them.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub movies_root: Option<PathBuf>,
    pub music_root: Option<PathBuf>,
    pub tmdb_api_key: Option<String>,
    pub tmdb_language: Option<String>,
    pub music_catalog: Option<String>,
    pub ffprobe_path: Option<String>,
    pub scan_batch_size: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            config_path: lookup("KINORA_CONFIG_PATH").map(PathBuf::from),
            database_url: lookup("DATABASE_URL"),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS"),
            movies_root: lookup("KINORA_MOVIES_ROOT").map(PathBuf::from),
            music_root: lookup("KINORA_MUSIC_ROOT").map(PathBuf::from),
            tmdb_api_key: lookup("TMDB_API_KEY"),
            tmdb_language: lookup("TMDB_LANGUAGE"),
            music_catalog: lookup("KINORA_MUSIC_CATALOG"),
            ffprobe_path: lookup("FFPROBE_PATH"),
            scan_batch_size: lookup("KINORA_SCAN_BATCH_SIZE"),
        }
    }
}
