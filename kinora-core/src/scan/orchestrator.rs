use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::batch::{BatchManager, BatchOutcome};
use super::entity_cache::{CacheStats, EntityCache};
use super::fs::{FileSystem, FsError};
use super::pipeline::MediaPipeline;
use super::settings::{DEFAULT_BATCH_SIZE, matching_extension};
use crate::database::CatalogStore;
use crate::types::{DiscoveredFile, MediaKind};

/// End-of-scan counts. `errored` includes `walk_errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub kind: MediaKind,
    pub scanned: usize,
    pub skipped: usize,
    pub errored: usize,
    pub walk_errors: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub cache: CacheStats,
}

impl ScanSummary {
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            scanned: 0,
            skipped: 0,
            errored: 0,
            walk_errors: 0,
            batches: 0,
            elapsed: Duration::ZERO,
            cache: CacheStats::default(),
        }
    }

    fn record(&mut self, outcome: BatchOutcome) {
        self.scanned += outcome.scanned;
        self.skipped += outcome.skipped;
        self.errored += outcome.errored;
        self.batches += 1;
    }

    fn log(&self) {
        info!(
            target: "scan::summary",
            kind = %self.kind,
            scanned = self.scanned,
            skipped = self.skipped,
            errored = self.errored,
            walk_errors = self.walk_errors,
            batches = self.batches,
            cache_entries = self.cache.entries,
            cache_hits = self.cache.hits,
            elapsed = %humantime::format_duration(truncate_millis(self.elapsed)),
            "library scan finished"
        );
    }
}

fn truncate_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis().try_into().unwrap_or(u64::MAX))
}

/// Walks one library root and feeds fixed-size batches to the batch manager.
pub struct ScanOrchestrator<P: MediaPipeline> {
    pipeline: Arc<P>,
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn CatalogStore>,
    writer_lock: Arc<Mutex<()>>,
    batch_size: usize,
}

impl<P: MediaPipeline> std::fmt::Debug for ScanOrchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("kind", &self.pipeline.kind())
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<P: MediaPipeline> ScanOrchestrator<P> {
    pub fn new(
        pipeline: Arc<P>,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn CatalogStore>,
        writer_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            pipeline,
            fs,
            store,
            writer_lock,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Scan `root` to completion. An unset or empty root logs once and
    /// returns without touching the store.
    pub async fn run(&self, root: Option<&Path>) -> ScanSummary {
        let kind = self.pipeline.kind();
        let Some(root) = root.filter(|root| !root.as_os_str().is_empty()) else {
            info!(kind = %kind, "library directory not configured; skipping scan");
            return ScanSummary::empty(kind);
        };

        let started = Instant::now();
        let cache = EntityCache::new();
        let _cleanup = ScanCleanup {
            cache: &cache,
            pipeline: self.pipeline.as_ref(),
        };

        info!(kind = %kind, root = %root.display(), batch_size = self.batch_size, "library scan started");

        let batches = BatchManager::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.store),
            Arc::clone(&self.writer_lock),
        );
        let mut summary = ScanSummary::empty(kind);
        let mut walker = Walker::new(self.fs.as_ref(), kind, root);
        let mut buffer = Vec::with_capacity(self.batch_size);

        while let Some(file) = walker.next().await {
            buffer.push(file);
            if buffer.len() >= self.batch_size {
                summary.record(batches.process_batch(&buffer, &cache).await);
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            summary.record(batches.process_batch(&buffer, &cache).await);
        }

        summary.walk_errors = walker.errors();
        summary.errored += summary.walk_errors;
        summary.cache = cache.stats();
        summary.elapsed = started.elapsed();
        summary.log();
        summary
    }
}

/// Clears scan-scoped state however the scan ends.
struct ScanCleanup<'a, P: MediaPipeline> {
    cache: &'a EntityCache,
    pipeline: &'a P,
}

impl<P: MediaPipeline> Drop for ScanCleanup<'_, P> {
    fn drop(&mut self) {
        self.cache.clear();
        self.pipeline.finish_scan();
    }
}

/// Depth-first walk over a root. Entries are visited in path order within
/// each directory; a directory's files come before its subdirectories.
/// Symlinked files are followed; symlinked directories are not descended
/// into, so link cycles cannot repeat the tree. Failed entries are logged and
/// counted, never fatal.
pub struct Walker<'a> {
    fs: &'a dyn FileSystem,
    kind: MediaKind,
    dirs: Vec<PathBuf>,
    ready: VecDeque<DiscoveredFile>,
    errors: usize,
}

impl std::fmt::Debug for Walker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("kind", &self.kind)
            .field("pending_dirs", &self.dirs.len())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<'a> Walker<'a> {
    pub fn new(fs: &'a dyn FileSystem, kind: MediaKind, root: &Path) -> Self {
        Self {
            fs,
            kind,
            dirs: vec![root.to_path_buf()],
            ready: VecDeque::new(),
            errors: 0,
        }
    }

    /// Next file whose extension is on the kind's allow-list.
    pub async fn next(&mut self) -> Option<DiscoveredFile> {
        loop {
            if let Some(file) = self.ready.pop_front() {
                return Some(file);
            }
            let dir = self.dirs.pop()?;
            self.visit(&dir).await;
        }
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    async fn visit(&mut self, dir: &Path) {
        let mut entries = self.read_entries(dir).await;
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            match self.fs.metadata(&path).await {
                Ok(meta) if meta.is_dir && meta.is_symlink => {
                    debug!(path = %path.display(), "not following directory symlink");
                }
                Ok(meta) if meta.is_dir => subdirs.push(path),
                Ok(meta) if meta.is_file => {
                    let Some(extension) = matching_extension(self.kind, &path) else {
                        continue;
                    };
                    // Catalog keys are UTF-8; a lossy key could collide with another file.
                    if path.to_str().is_none() {
                        self.record(FsError::new("decode", &path, "path is not valid UTF-8"));
                    } else {
                        self.ready.push_back(DiscoveredFile {
                            path,
                            extension,
                            size: meta.len,
                        });
                    }
                }
                Ok(_) => {}
                Err(e) => self.record(e),
            }
        }
        self.dirs.extend(subdirs.into_iter().rev());
    }

    /// Entries listed before a listing failure are kept.
    async fn read_entries(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut stream = match self.fs.read_dir(dir).await {
            Ok(stream) => stream,
            Err(e) => {
                self.record(e);
                return Vec::new();
            }
        };
        let mut entries = Vec::new();
        loop {
            match stream.next_entry().await {
                Ok(Some(path)) => entries.push(path),
                Ok(None) => break,
                Err(e) => {
                    self.record(e);
                    break;
                }
            }
        }
        entries
    }

    fn record(&mut self, e: FsError) {
        self.errors += 1;
        warn!(op = e.op, path = %e.path.display(), error = %e.message, "walk error; continuing");
    }
}
