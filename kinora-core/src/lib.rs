//! # Kinora Core
//!
//! Library ingestion engine for the Kinora media server. Walks configured
//! movie and music roots, probes each new or changed file, enriches it from
//! TMDB or Deezer when a client is configured, and upserts the result into
//! the catalog in batched transactions with one savepoint per file.
//!
//! ## Architecture
//!
//! - [`scan`]: walker, change detector, entity cache, batch manager,
//!   concurrency gate and the [`scan::ScanService`] trigger surface
//! - [`metadata`]: ffprobe output parsing, filename parsing and normalization
//!   into catalog records
//! - [`providers`]: TMDB and Deezer clients plus best-match selection
//! - [`database`]: persistence ports with PostgreSQL and in-memory adapters
//! - [`types`]: records, related entities and link tables
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kinora_core::database::PostgresCatalog;
//! use kinora_core::metadata::{FfprobeProber, MovieNormalizer, TrackNormalizer};
//! use kinora_core::scan::{LibraryRoots, MoviePipeline, MusicPipeline, RealFs, ScanService};
//! use kinora_core::types::MediaKind;
//!
//! async fn scan_movies(database_url: &str) -> kinora_core::Result<()> {
//!     let catalog = PostgresCatalog::connect(database_url, 5).await?;
//!     catalog.migrate().await?;
//!
//!     let prober = Arc::new(FfprobeProber::default());
//!     let service = ScanService::new(
//!         Arc::new(catalog),
//!         Arc::new(RealFs::new()),
//!         MoviePipeline::new(MovieNormalizer::new(prober.clone(), None)),
//!         MusicPipeline::new(TrackNormalizer::new(prober, None)),
//!         LibraryRoots {
//!             movies: Some("/srv/media/movies".into()),
//!             music: None,
//!         },
//!     );
//!
//!     let summary = service.spawn_scan(MediaKind::Movies).unwrap().await.unwrap();
//!     println!("{} scanned, {} skipped", summary.scanned, summary.skipped);
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod metadata;
pub mod providers;
pub mod scan;
pub mod types;

pub use error::{MediaError, Result};

/// Embedded catalog migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
