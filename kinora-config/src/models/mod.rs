use std::path::{Path, PathBuf};

use kinora_core::scan::LibraryRoots;
use kinora_core::types::MediaKind;

pub mod scanner;
pub mod sources;
pub mod warnings;

pub use scanner::ScannerConfig;
pub use warnings::{ConfigWarning, ConfigWarnings};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_FFPROBE_PATH: &str = "ffprobe";

/// Fully resolved scanner configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub libraries: LibraryConfig,
    pub providers: ProviderConfig,
    pub scanner: ScannerConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Validated connection string. `None` when neither the file nor the
    /// environment provides one.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Library roots. Blank values are normalized to `None` so an unset root
/// turns the matching scan into a no-op instead of walking the working
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryConfig {
    pub movies_root: Option<PathBuf>,
    pub music_root: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn root(&self, kind: MediaKind) -> Option<&Path> {
        match kind {
            MediaKind::Movies => self.movies_root.as_deref(),
            MediaKind::Music => self.music_root.as_deref(),
        }
    }

    pub fn library_roots(&self) -> LibraryRoots {
        LibraryRoots {
            movies: self.movies_root.clone(),
            music: self.music_root.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Without a key no movie catalog client is built and movies keep
    /// their filename metadata.
    pub tmdb_api_key: Option<String>,
    pub tmdb_language: Option<String>,
    pub music_catalog_enabled: bool,
    pub ffprobe_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_language: None,
            music_catalog_enabled: true,
            ffprobe_path: DEFAULT_FFPROBE_PATH.to_string(),
        }
    }
}

/// Where the resolved values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
