use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{EntitySeed, Link, LinkTable, MediaKind, MovieRecord, RelatedEntity, TrackRecord};

/// The catalog as ingestion sees it: one pool-level read for change
/// detection, everything else through a batch transaction.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Size stored for `file_path` in the kind's table, if a row exists.
    async fn stored_size(&self, kind: MediaKind, file_path: &str) -> Result<Option<u64>>;

    async fn begin(&self) -> Result<Box<dyn CatalogTx>>;
}

/// One open batch transaction. Every write of a batch goes through a single
/// handle; savepoints scope each file inside it.
#[async_trait]
pub trait CatalogTx: Send {
    async fn savepoint(&mut self, name: &str) -> Result<()>;

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()>;

    async fn release_savepoint(&mut self, name: &str) -> Result<()>;

    /// Insert or update by `file_path`; returns the row id.
    async fn upsert_movie(&mut self, movie: &MovieRecord) -> Result<Uuid>;

    /// Insert or update by `file_path`; returns the row id.
    async fn upsert_track(&mut self, track: &TrackRecord) -> Result<Uuid>;

    /// Get-or-create by the seed's external key. Existing rows keep their id.
    async fn upsert_related(&mut self, seed: &EntitySeed) -> Result<RelatedEntity>;

    async fn delete_links(&mut self, table: LinkTable, parent: Uuid) -> Result<()>;

    /// Duplicate `(parent, child, role)` rows are ignored.
    async fn insert_link(&mut self, table: LinkTable, parent: Uuid, link: &Link) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Savepoint names are interpolated into SQL, so only `[a-z0-9_]` is allowed.
pub fn valid_savepoint_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}
