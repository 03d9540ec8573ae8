use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use kinora_config::{ConfigLoadError, ConfigLoader, EnvConfig};
use kinora_core::scan::DEFAULT_BATCH_SIZE;
use tempfile::TempDir;

fn env(vars: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned())
}

fn write_config(dir: &TempDir, relative: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

const FULL: &str = r#"
[database]
url = "postgres://kinora@localhost/kinora"
max_connections = 4

[libraries]
movies_root = "/srv/movies"
music_root = "/srv/music"

[providers]
tmdb_api_key = "file-key"
tmdb_language = "de-DE"
music_catalog_enabled = false
ffprobe_path = "/opt/ffmpeg/bin/ffprobe"

[scanner]
batch_size = 20
"#;

#[test]
fn file_values_are_used_when_environment_is_silent() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", FULL);

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[]))
        .unwrap();
    let config = load.config;

    assert_eq!(config.database.url.as_deref(), Some("postgres://kinora@localhost/kinora"));
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.libraries.movies_root, Some(PathBuf::from("/srv/movies")));
    assert_eq!(config.libraries.music_root, Some(PathBuf::from("/srv/music")));
    assert_eq!(config.providers.tmdb_api_key.as_deref(), Some("file-key"));
    assert_eq!(config.providers.tmdb_language.as_deref(), Some("de-DE"));
    assert!(!config.providers.music_catalog_enabled);
    assert_eq!(config.providers.ffprobe_path, "/opt/ffmpeg/bin/ffprobe");
    assert_eq!(config.scanner.batch_size, 20);
    assert_eq!(config.metadata.config_path, Some(path));
    assert!(load.warnings.is_empty(), "{:?}", load.warnings);
}

#[test]
fn environment_overrides_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", FULL);

    let config = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(env(&[
            ("DATABASE_URL", "postgresql://other@db/kinora"),
            ("KINORA_MOVIES_ROOT", "/mnt/movies"),
            ("TMDB_API_KEY", "env-key"),
            ("KINORA_MUSIC_CATALOG", "on"),
            ("FFPROBE_PATH", "ffprobe7"),
            ("KINORA_SCAN_BATCH_SIZE", "7"),
        ]))
        .unwrap()
        .config;

    assert_eq!(config.database.url.as_deref(), Some("postgresql://other@db/kinora"));
    assert_eq!(config.libraries.movies_root, Some(PathBuf::from("/mnt/movies")));
    assert_eq!(config.libraries.music_root, Some(PathBuf::from("/srv/music")));
    assert_eq!(config.providers.tmdb_api_key.as_deref(), Some("env-key"));
    assert!(config.providers.music_catalog_enabled);
    assert_eq!(config.providers.ffprobe_path, "ffprobe7");
    assert_eq!(config.scanner.batch_size, 7);
}

#[test]
fn nothing_configured_yields_defaults_and_warnings() {
    let dir = TempDir::new().unwrap();

    let load = ConfigLoader::new()
        .with_search_dir(dir.path())
        .load_with_env(env(&[]))
        .unwrap();

    assert_eq!(load.config.database.url, None);
    assert_eq!(load.config.libraries.movies_root, None);
    assert_eq!(load.config.libraries.music_root, None);
    assert_eq!(load.config.providers.tmdb_api_key, None);
    assert!(load.config.providers.music_catalog_enabled);
    assert_eq!(load.config.providers.ffprobe_path, "ffprobe");
    assert_eq!(load.config.scanner.batch_size, DEFAULT_BATCH_SIZE);
    assert!(load.warnings.mentions("No kinora.toml"));
    assert!(load.warnings.mentions("movies library root"));
    assert!(load.warnings.mentions("music library root"));
}

#[test]
fn default_location_is_discovered_in_config_subdirectory() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "config/kinora.toml", "[libraries]\nmusic_root = \"/m\"\n");

    let config = ConfigLoader::new()
        .with_search_dir(dir.path())
        .load_with_env(env(&[]))
        .unwrap()
        .config;

    assert_eq!(config.metadata.config_path, Some(path));
    assert_eq!(config.libraries.music_root, Some(PathBuf::from("/m")));
}

#[test]
fn blank_library_roots_are_unset() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", "[libraries]\nmovies_root = \"   \"\n");

    let config = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(env(&[("KINORA_MUSIC_ROOT", "")]))
        .unwrap()
        .config;

    assert_eq!(config.libraries.movies_root, None);
    assert_eq!(config.libraries.music_root, None);
    let roots = config.libraries.library_roots();
    assert!(roots.movies.is_none() && roots.music.is_none());
}

#[test]
fn zero_batch_size_is_replaced_with_a_warning() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", "[scanner]\nbatch_size = 0\n");

    let load = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(env(&[]))
        .unwrap();

    assert_eq!(load.config.scanner.batch_size, DEFAULT_BATCH_SIZE);
    assert!(load.warnings.mentions("batch size must be positive"));
}

#[test]
fn unparseable_environment_values_warn_and_fall_back() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", FULL);

    let load = ConfigLoader::new()
        .with_config_path(path)
        .load_with_env(env(&[
            ("KINORA_SCAN_BATCH_SIZE", "lots"),
            ("KINORA_MUSIC_CATALOG", "perhaps"),
        ]))
        .unwrap();

    assert_eq!(load.config.scanner.batch_size, 20);
    assert!(!load.config.providers.music_catalog_enabled);
    assert!(load.warnings.mentions("KINORA_SCAN_BATCH_SIZE"));
    assert!(load.warnings.mentions("KINORA_MUSIC_CATALOG"));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = ConfigLoader::new()
        .with_config_path(&missing)
        .load_with_env(env(&[]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { path } if path == missing));

    let from_env = ConfigLoader::new()
        .load_with_env(env(&[("KINORA_CONFIG_PATH", missing.to_str().unwrap())]))
        .unwrap_err();
    assert!(matches!(from_env, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "kinora.toml", "[scanner\nbatch_size = ");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { path: reported, .. } if reported == path));
}

#[test]
fn invalid_database_url_is_fatal() {
    let dir = TempDir::new().unwrap();

    let err = ConfigLoader::new()
        .with_search_dir(dir.path())
        .load_with_env(env(&[("DATABASE_URL", "redis://cache:6379")]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::UnsupportedDatabaseScheme { .. }));
}
