use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use kinora_config::{Config, ConfigLoad, ConfigLoader};
use kinora_core::{
    database::PostgresCatalog,
    metadata::{FfprobeProber, MovieNormalizer, Prober, TrackNormalizer},
    providers::{DeezerClient, MovieCatalog, MusicCatalog, TmdbClient},
    scan::{MoviePipeline, MusicPipeline, RealFs, ScanService, ScanSummary},
    types::MediaKind,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Operator CLI for the Kinora library scanner
#[derive(Parser, Debug)]
#[command(name = "kinoractl", version)]
#[command(about = "Scan movie and music libraries into the Kinora catalog")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct GlobalArgs {
    /// Path to kinora.toml (defaults to ./kinora.toml or ./config/kinora.toml)
    #[arg(long, global = true, env = "KINORA_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before the environment is read
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan one or both libraries and wait for the scans to finish
    Scan {
        #[arg(value_enum, default_value_t = ScanTarget::All)]
        target: ScanTarget,

        /// Skip applying database migrations before scanning
        #[arg(long, default_value_t = false)]
        skip_migrations: bool,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScanTarget {
    Movies,
    Music,
    All,
}

impl ScanTarget {
    fn kinds(self) -> &'static [MediaKind] {
        match self {
            ScanTarget::Movies => &[MediaKind::Movies],
            ScanTarget::Music => &[MediaKind::Music],
            ScanTarget::All => &MediaKind::ALL,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scan::summary=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli.global)?;

    match cli.command {
        Command::Migrate => {
            let catalog = connect(&config).await?;
            catalog.migrate().await.context("database migration failed")?;
            info!("Database migrations applied successfully");
            Ok(())
        }
        Command::Scan {
            target,
            skip_migrations,
        } => run_scans(&config, target, skip_migrations).await,
    }
}

fn load_config(args: &GlobalArgs) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }

    let ConfigLoad { config, warnings } = loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

async fn connect(config: &Config) -> anyhow::Result<PostgresCatalog> {
    let Some(url) = config.database.url.as_deref() else {
        bail!("no database configured; set DATABASE_URL or [database].url");
    };
    PostgresCatalog::connect(url, config.database.max_connections)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_scans(config: &Config, target: ScanTarget, skip_migrations: bool) -> anyhow::Result<()> {
    let catalog = connect(config).await?;
    if !skip_migrations {
        catalog.migrate().await.context("database migration failed")?;
    }

    let service = build_service(config, catalog)?;

    let mut handles: Vec<JoinHandle<ScanSummary>> = Vec::new();
    for &kind in target.kinds() {
        match service.spawn_scan(kind) {
            Ok(handle) => handles.push(handle),
            Err(e) => warn!(kind = %kind, reason = %e, "library scan not started"),
        }
    }
    if handles.is_empty() {
        bail!("no library scan could be started; configure a library root");
    }

    let summaries = collect_summaries(&service, handles, tokio::signal::ctrl_c()).await?;
    service.shutdown().await;

    let errored: usize = summaries.iter().map(|summary| summary.errored).sum();
    if errored > 0 {
        warn!(errored, "some files could not be cataloged; see the log for details");
    }
    Ok(())
}

/// Waits for every scan. When `interrupt` fires first, the service stops
/// accepting work and the running scans still report their summaries.
async fn collect_summaries<F>(
    service: &ScanService,
    handles: Vec<JoinHandle<ScanSummary>>,
    interrupt: F,
) -> anyhow::Result<Vec<ScanSummary>>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(interrupt);
    let mut interrupted = false;
    let mut summaries = Vec::with_capacity(handles.len());

    for mut handle in handles {
        let joined = if interrupted {
            handle.await
        } else {
            tokio::select! {
                biased;
                signal = &mut interrupt => {
                    signal.context("failed to listen for Ctrl-C")?;
                    warn!("interrupt received; waiting for running scans to finish");
                    interrupted = true;
                    service.shutdown().await;
                    handle.await
                }
                joined = &mut handle => joined,
            }
        };
        summaries.push(joined.context("scan task failed")?);
    }
    Ok(summaries)
}

fn build_service(config: &Config, catalog: PostgresCatalog) -> anyhow::Result<ScanService> {
    let providers = &config.providers;
    let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new(&providers.ffprobe_path));

    let movie_catalog: Option<Arc<dyn MovieCatalog>> = match &providers.tmdb_api_key {
        Some(key) => Some(Arc::new(
            TmdbClient::new(key.clone(), providers.tmdb_language.clone())
                .context("failed to build TMDB client")?,
        )),
        None => {
            info!("no TMDB API key configured; movies keep filename metadata");
            None
        }
    };

    let music_catalog: Option<Arc<dyn MusicCatalog>> = if providers.music_catalog_enabled {
        Some(Arc::new(DeezerClient::new().context("failed to build music catalog client")?))
    } else {
        info!("music catalog lookups disabled");
        None
    };

    let service = ScanService::new(
        Arc::new(catalog),
        Arc::new(RealFs::new()),
        MoviePipeline::new(MovieNormalizer::new(Arc::clone(&prober), movie_catalog)),
        MusicPipeline::new(TrackNormalizer::new(prober, music_catalog)),
        config.libraries.library_roots(),
    )
    .with_batch_size(config.scanner.batch_size);

    info!(
        batch_size = config.scanner.batch_size,
        movies_root = ?config.libraries.movies_root,
        music_root = ?config.libraries.music_root,
        "scanner configuration in effect"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinora_core::{
        database::MemoryCatalog,
        scan::{InMemoryFs, LibraryRoots, ScanTriggerError},
    };

    fn unprobeable_service() -> ScanService {
        let mut fs = InMemoryFs::new();
        fs.add_file("/movies/Heat (1995)/Heat.mkv", 1_000);
        let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new("/nonexistent/ffprobe"));

        ScanService::new(
            Arc::new(MemoryCatalog::new()),
            Arc::new(fs),
            MoviePipeline::new(MovieNormalizer::new(Arc::clone(&prober), None)),
            MusicPipeline::new(TrackNormalizer::new(prober, None)),
            LibraryRoots {
                movies: Some(PathBuf::from("/movies")),
                music: None,
            },
        )
    }

    #[tokio::test]
    async fn summaries_survive_an_interrupt() {
        let service = unprobeable_service();
        let handle = service.spawn_scan(MediaKind::Movies).unwrap();

        let summaries = collect_summaries(&service, vec![handle], std::future::ready(Ok(())))
            .await
            .unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].errored, 1);
        assert_eq!(service.trigger(MediaKind::Movies), Err(ScanTriggerError::ShuttingDown));
    }

    #[tokio::test]
    async fn summaries_are_collected_without_an_interrupt() {
        let service = unprobeable_service();
        let handle = service.spawn_scan(MediaKind::Movies).unwrap();

        let summaries = collect_summaries(&service, vec![handle], std::future::pending())
            .await
            .unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].errored, 1);
        assert!(service.trigger(MediaKind::Movies).is_ok());
        service.shutdown().await;
    }
}
