use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::entity_cache::StagedEntities;
use super::resolver::{persist_movie, persist_track};
use crate::database::CatalogTx;
use crate::error::Result;
use crate::metadata::{MovieNormalizer, NormalizedMovie, NormalizedTrack, TrackNormalizer};
use crate::types::{DiscoveredFile, MediaKind};

/// Per-kind half of a batch.
///
/// `prepare` is the read-only part (probe, parse, catalog enrichment) and runs
/// before the batch transaction is opened. `persist` runs inside the file's
/// savepoint and must route every write through `tx`.
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    type Prepared: Send + Sync;

    fn kind(&self) -> MediaKind;

    async fn prepare(&self, file: &DiscoveredFile) -> Result<Self::Prepared>;

    async fn persist(
        &self,
        tx: &mut dyn CatalogTx,
        staged: &mut StagedEntities<'_>,
        prepared: &Self::Prepared,
    ) -> Result<Uuid>;

    /// Drop per-scan memo state. Called once when a scan ends, on every path.
    fn finish_scan(&self) {}
}

#[derive(Debug, Clone)]
pub struct MoviePipeline {
    normalizer: Arc<MovieNormalizer>,
}

impl MoviePipeline {
    pub fn new(normalizer: MovieNormalizer) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
        }
    }
}

#[async_trait]
impl MediaPipeline for MoviePipeline {
    type Prepared = NormalizedMovie;

    fn kind(&self) -> MediaKind {
        MediaKind::Movies
    }

    async fn prepare(&self, file: &DiscoveredFile) -> Result<NormalizedMovie> {
        self.normalizer.normalize(file).await
    }

    async fn persist(
        &self,
        tx: &mut dyn CatalogTx,
        staged: &mut StagedEntities<'_>,
        prepared: &NormalizedMovie,
    ) -> Result<Uuid> {
        persist_movie(tx, staged, prepared).await
    }
}

#[derive(Debug, Clone)]
pub struct MusicPipeline {
    normalizer: Arc<TrackNormalizer>,
}

impl MusicPipeline {
    pub fn new(normalizer: TrackNormalizer) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
        }
    }

    /// Upstream music catalog calls made over the pipeline's lifetime.
    pub fn catalog_calls(&self) -> usize {
        self.normalizer.catalog_calls()
    }
}

#[async_trait]
impl MediaPipeline for MusicPipeline {
    type Prepared = NormalizedTrack;

    fn kind(&self) -> MediaKind {
        MediaKind::Music
    }

    async fn prepare(&self, file: &DiscoveredFile) -> Result<NormalizedTrack> {
        self.normalizer.normalize(file).await
    }

    async fn persist(
        &self,
        tx: &mut dyn CatalogTx,
        staged: &mut StagedEntities<'_>,
        prepared: &NormalizedTrack,
    ) -> Result<Uuid> {
        persist_track(tx, staged, prepared).await
    }

    fn finish_scan(&self) {
        self.normalizer.clear_memo();
    }
}
