//! Configuration loading for the Kinora scanner.
//!
//! Values come from three layers, later ones winning: an optional `.env`
//! file, a TOML file, and process environment variables. Problems that
//! should not stop a scan (an unset library root, a zero batch size) are
//! reported as [`ConfigWarnings`] next to the resolved [`Config`].

pub mod loader;
pub mod models;
mod util;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, ConfigWarning, ConfigWarnings, DatabaseConfig, LibraryConfig,
    ProviderConfig, ScannerConfig,
    sources::{EnvConfig, FileConfig},
};
