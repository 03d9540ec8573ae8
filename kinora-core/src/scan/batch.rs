use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::change_detector::ChangeDetector;
use super::entity_cache::{EntityCache, StagedEntities};
use super::pipeline::MediaPipeline;
use crate::database::{CatalogStore, CatalogTx};
use crate::error::Result;
use crate::types::DiscoveredFile;

/// Counts for one flushed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub scanned: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl BatchOutcome {
    /// Begin or commit failed: nothing in the batch can be trusted.
    pub fn failed(files: usize) -> Self {
        Self {
            scanned: 0,
            skipped: 0,
            errored: files,
        }
    }
}

/// One transaction per batch, one savepoint per file.
///
/// Change detection and preparation run first without the writer lock. The
/// write phase holds the shared writer lock from `begin` through `commit`,
/// so batches of different media kinds never interleave their writes.
pub struct BatchManager<P: MediaPipeline> {
    pipeline: Arc<P>,
    store: Arc<dyn CatalogStore>,
    detector: ChangeDetector,
    writer_lock: Arc<Mutex<()>>,
}

impl<P: MediaPipeline> std::fmt::Debug for BatchManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchManager")
            .field("kind", &self.pipeline.kind())
            .finish_non_exhaustive()
    }
}

impl<P: MediaPipeline> BatchManager<P> {
    pub fn new(pipeline: Arc<P>, store: Arc<dyn CatalogStore>, writer_lock: Arc<Mutex<()>>) -> Self {
        Self {
            detector: ChangeDetector::new(Arc::clone(&store)),
            pipeline,
            store,
            writer_lock,
        }
    }

    pub async fn process_batch(&self, files: &[DiscoveredFile], cache: &EntityCache) -> BatchOutcome {
        let kind = self.pipeline.kind();
        let mut outcome = BatchOutcome::default();

        let mut prepared = Vec::with_capacity(files.len());
        for file in files {
            if self.detector.is_unchanged(kind, file).await {
                debug!(path = %file.path.display(), "unchanged; skipping");
                outcome.skipped += 1;
                continue;
            }
            match self.pipeline.prepare(file).await {
                Ok(item) => prepared.push((file, item)),
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "failed to read media file");
                    outcome.errored += 1;
                }
            }
        }

        if prepared.is_empty() {
            return outcome;
        }

        let _writer = self.writer_lock.lock().await;

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(kind = %kind, files = files.len(), error = %e, "failed to open batch transaction");
                return BatchOutcome::failed(files.len());
            }
        };

        let mut staged = StagedEntities::new(cache);
        for (n, (file, item)) in prepared.iter().enumerate() {
            let savepoint = format!("file_{n}");
            match self.persist_file(tx.as_mut(), &mut staged, &savepoint, item).await {
                Ok(id) => {
                    staged.promote_file();
                    outcome.scanned += 1;
                    debug!(path = %file.path.display(), id = %id, "persisted");
                }
                Err(e) => {
                    staged.discard_file();
                    outcome.errored += 1;
                    warn!(path = %file.path.display(), error = %e, "failed to persist media file");
                }
            }
        }

        if let Err(e) = tx.commit().await {
            error!(kind = %kind, files = files.len(), error = %e, "failed to commit batch");
            return BatchOutcome::failed(files.len());
        }

        let published = staged.publish();
        debug!(
            target: "scan::batch",
            kind = %kind,
            scanned = outcome.scanned,
            skipped = outcome.skipped,
            errored = outcome.errored,
            published,
            "batch committed"
        );
        outcome
    }

    async fn persist_file(
        &self,
        tx: &mut dyn CatalogTx,
        staged: &mut StagedEntities<'_>,
        savepoint: &str,
        item: &P::Prepared,
    ) -> Result<Uuid> {
        tx.savepoint(savepoint).await?;

        let result = match self.pipeline.persist(tx, staged, item).await {
            Ok(id) => tx.release_savepoint(savepoint).await.map(|()| id),
            Err(e) => Err(e),
        };

        if result.is_err()
            && let Err(e) = tx.rollback_to_savepoint(savepoint).await
        {
            warn!(savepoint, error = %e, "rollback to savepoint failed");
        }
        result
    }
}
