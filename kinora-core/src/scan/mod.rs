//! Library ingestion: walk, change detection, batching and the scan trigger.

pub mod batch;
pub mod change_detector;
pub mod entity_cache;
pub mod fs;
pub mod gate;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod service;
pub mod settings;

pub use batch::{BatchManager, BatchOutcome};
pub use change_detector::ChangeDetector;
pub use entity_cache::{CacheStats, EntityCache, StagedEntities};
pub use fs::{FileSystem, FsError, InMemoryFs, RealFs};
pub use gate::{ScanGate, ScanPermit, ScanTriggerError};
pub use orchestrator::{ScanOrchestrator, ScanSummary, Walker};
pub use pipeline::{MediaPipeline, MoviePipeline, MusicPipeline};
pub use service::{LibraryRoots, ScanService};
pub use settings::DEFAULT_BATCH_SIZE;
