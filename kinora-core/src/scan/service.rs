//! Trigger surface for library scans.
//!
//! A trigger performs the two synchronous checks (scan already running,
//! library not configured) and then hands the scan to a detached task
//! registered with the service's [`TaskTracker`]. Everything that happens
//! inside the scan is observable only through logs and the returned
//! [`ScanSummary`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::info;

use super::fs::FileSystem;
use super::gate::{ScanGate, ScanPermit, ScanTriggerError};
use super::orchestrator::{ScanOrchestrator, ScanSummary};
use super::pipeline::{MediaPipeline, MoviePipeline, MusicPipeline};
use super::settings::DEFAULT_BATCH_SIZE;
use crate::database::CatalogStore;
use crate::types::MediaKind;

/// Root directory per media kind. `None` means the kind is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryRoots {
    pub movies: Option<PathBuf>,
    pub music: Option<PathBuf>,
}

impl LibraryRoots {
    pub fn get(&self, kind: MediaKind) -> Option<&PathBuf> {
        let root = match kind {
            MediaKind::Movies => self.movies.as_ref(),
            MediaKind::Music => self.music.as_ref(),
        };
        root.filter(|root| !root.as_os_str().is_empty())
    }
}

pub struct ScanService {
    store: Arc<dyn CatalogStore>,
    fs: Arc<dyn FileSystem>,
    movies: Arc<MoviePipeline>,
    music: Arc<MusicPipeline>,
    roots: LibraryRoots,
    batch_size: usize,
    gate: Arc<ScanGate>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for ScanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanService")
            .field("roots", &self.roots)
            .field("batch_size", &self.batch_size)
            .field("gate", &self.gate)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl ScanService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fs: Arc<dyn FileSystem>,
        movies: MoviePipeline,
        music: MusicPipeline,
        roots: LibraryRoots,
    ) -> Self {
        Self {
            store,
            fs,
            movies: Arc::new(movies),
            music: Arc::new(music),
            roots,
            batch_size: DEFAULT_BATCH_SIZE,
            gate: ScanGate::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Share a gate with another service writing to the same store.
    pub fn with_gate(mut self, gate: Arc<ScanGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &Arc<ScanGate> {
        &self.gate
    }

    pub fn is_scanning(&self, kind: MediaKind) -> bool {
        self.gate.is_scanning(kind)
    }

    /// Start a detached scan of `kind`.
    pub fn trigger(&self, kind: MediaKind) -> Result<(), ScanTriggerError> {
        self.spawn_scan(kind).map(drop)
    }

    /// Like [`ScanService::trigger`], but hands back the task so in-process
    /// callers can collect the summary.
    pub fn spawn_scan(&self, kind: MediaKind) -> Result<JoinHandle<ScanSummary>, ScanTriggerError> {
        if self.tracker.is_closed() {
            return Err(ScanTriggerError::ShuttingDown);
        }
        let root = self
            .roots
            .get(kind)
            .cloned()
            .ok_or(ScanTriggerError::NotConfigured(kind))?;
        let permit = self.gate.try_begin(kind)?;

        let handle = match kind {
            MediaKind::Movies => self.spawn(permit, self.orchestrator(&self.movies), root),
            MediaKind::Music => self.spawn(permit, self.orchestrator(&self.music), root),
        };
        Ok(handle)
    }

    /// Fire-and-forget movie scan. Rejections are logged.
    pub fn scan_movies_library(&self) {
        self.trigger_logged(MediaKind::Movies);
    }

    /// Fire-and-forget music scan. Rejections are logged.
    pub fn scan_music_library(&self) {
        self.trigger_logged(MediaKind::Music);
    }

    /// Stop accepting triggers and wait for in-flight scans to finish.
    /// Running scans are not interrupted.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(in_flight = self.tracker.len(), "waiting for running scans to finish");
        }
        self.tracker.wait().await;
    }

    fn trigger_logged(&self, kind: MediaKind) {
        if let Err(e) = self.trigger(kind) {
            info!(kind = %kind, reason = %e, "library scan not started");
        }
    }

    fn orchestrator<P: MediaPipeline>(&self, pipeline: &Arc<P>) -> ScanOrchestrator<P> {
        ScanOrchestrator::new(
            Arc::clone(pipeline),
            Arc::clone(&self.fs),
            Arc::clone(&self.store),
            self.gate.writer_lock(),
        )
        .with_batch_size(self.batch_size)
    }

    fn spawn<P>(
        &self,
        permit: ScanPermit,
        orchestrator: ScanOrchestrator<P>,
        root: PathBuf,
    ) -> JoinHandle<ScanSummary>
    where
        P: MediaPipeline + 'static,
    {
        self.tracker.spawn(async move {
            let _permit = permit;
            orchestrator.run(Some(&root)).await
        })
    }
}
