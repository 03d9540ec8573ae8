//! In-process catalog used by tests and dry runs.
//!
//! Transactions work on a private copy of the committed state and swap it in
//! on commit, so uncommitted writes are invisible to `stored_size` exactly as
//! they would be in PostgreSQL. Savepoints are snapshots of that copy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::ports::{CatalogStore, CatalogTx, valid_savepoint_name};
use crate::error::{MediaError, Result};
use crate::types::{
    EntityKind, EntitySeed, Link, LinkTable, MediaKind, MovieRecord, RelatedEntity, TrackRecord,
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    movies: HashMap<String, (Uuid, MovieRecord)>,
    tracks: HashMap<String, (Uuid, TrackRecord)>,
    entities: HashMap<(EntityKind, String), RelatedEntity>,
    links: HashMap<LinkTable, Vec<(Uuid, Link)>>,
}

impl MemoryState {
    fn has_parent(&self, table: LinkTable, parent: Uuid) -> bool {
        match table.parent_column() {
            "movie_id" => self.movies.values().any(|(id, _)| *id == parent),
            "track_id" => self.tracks.values().any(|(id, _)| *id == parent),
            _ => self.has_entity(parent),
        }
    }

    fn has_entity(&self, id: Uuid) -> bool {
        self.entities.values().any(|e| e.id == id)
    }
}

#[derive(Debug, Default)]
struct Faults {
    upsert_paths: HashSet<String>,
    fail_begin: bool,
    fail_commit: bool,
    fail_size_lookup: bool,
}

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    media_upserts: AtomicUsize,
    related_upserts: AtomicUsize,
    size_lookups: AtomicUsize,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<MemoryState>,
    faults: Mutex<Faults>,
    counters: Counters,
}

/// Cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    shared: Arc<Shared>,
}

fn injected(what: &str) -> MediaError {
    MediaError::Internal(format!("injected failure: {what}"))
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `file_path` fail.
    pub fn fail_upsert_for(&self, file_path: impl Into<String>) {
        self.shared.faults.lock().upsert_paths.insert(file_path.into());
    }

    pub fn fail_begin(&self, fail: bool) {
        self.shared.faults.lock().fail_begin = fail;
    }

    pub fn fail_commit(&self, fail: bool) {
        self.shared.faults.lock().fail_commit = fail;
    }

    pub fn fail_size_lookup(&self, fail: bool) {
        self.shared.faults.lock().fail_size_lookup = fail;
    }

    pub fn movie(&self, file_path: &str) -> Option<MovieRecord> {
        let state = self.shared.committed.lock();
        state.movies.get(file_path).map(|(_, m)| m.clone())
    }

    pub fn movie_id(&self, file_path: &str) -> Option<Uuid> {
        let state = self.shared.committed.lock();
        state.movies.get(file_path).map(|(id, _)| *id)
    }

    pub fn track(&self, file_path: &str) -> Option<TrackRecord> {
        let state = self.shared.committed.lock();
        state.tracks.get(file_path).map(|(_, t)| t.clone())
    }

    pub fn track_id(&self, file_path: &str) -> Option<Uuid> {
        let state = self.shared.committed.lock();
        state.tracks.get(file_path).map(|(id, _)| *id)
    }

    pub fn movie_count(&self) -> usize {
        self.shared.committed.lock().movies.len()
    }

    pub fn track_count(&self) -> usize {
        self.shared.committed.lock().tracks.len()
    }

    /// Committed entities of `kind`, ordered by name.
    pub fn entities(&self, kind: EntityKind) -> Vec<RelatedEntity> {
        let state = self.shared.committed.lock();
        let mut out: Vec<_> = state
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn entity_by_id(&self, id: Uuid) -> Option<RelatedEntity> {
        let state = self.shared.committed.lock();
        state.entities.values().find(|e| e.id == id).cloned()
    }

    /// Committed links of `parent`, ordered by ordinal.
    pub fn links(&self, table: LinkTable, parent: Uuid) -> Vec<Link> {
        let state = self.shared.committed.lock();
        let mut out: Vec<Link> = state
            .links
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|(p, _)| *p == parent)
                    .map(|(_, link)| link.clone())
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|link| link.ordinal);
        out
    }

    pub fn begins(&self) -> usize {
        self.shared.counters.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.shared.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.counters.rollbacks.load(Ordering::SeqCst)
    }

    /// Calls to `upsert_movie` + `upsert_track`, including failed ones.
    pub fn media_upserts(&self) -> usize {
        self.shared.counters.media_upserts.load(Ordering::SeqCst)
    }

    pub fn related_upserts(&self) -> usize {
        self.shared.counters.related_upserts.load(Ordering::SeqCst)
    }

    pub fn size_lookups(&self) -> usize {
        self.shared.counters.size_lookups.load(Ordering::SeqCst)
    }

    /// Nothing has ever been committed.
    pub fn is_empty(&self) -> bool {
        let state = self.shared.committed.lock();
        state.movies.is_empty() && state.tracks.is_empty() && state.entities.is_empty()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn stored_size(&self, kind: MediaKind, file_path: &str) -> Result<Option<u64>> {
        self.shared.counters.size_lookups.fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().fail_size_lookup {
            return Err(injected("size lookup"));
        }
        let state = self.shared.committed.lock();
        let size = match kind {
            MediaKind::Movies => state.movies.get(file_path).map(|(_, m)| m.size),
            MediaKind::Music => state.tracks.get(file_path).map(|(_, t)| t.size),
        };
        Ok(size)
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTx>> {
        self.shared.counters.begins.fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().fail_begin {
            return Err(injected("begin"));
        }
        let working = self.shared.committed.lock().clone();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.shared),
            working,
            savepoints: Vec::new(),
        }))
    }
}

#[derive(Debug)]
struct MemoryTx {
    shared: Arc<Shared>,
    working: MemoryState,
    savepoints: Vec<(String, MemoryState)>,
}

impl MemoryTx {
    fn savepoint_position(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| MediaError::Internal(format!("savepoint {name} does not exist")))
    }

    fn check_upsert(&self, file_path: &str) -> Result<()> {
        self.shared
            .counters
            .media_upserts
            .fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().upsert_paths.contains(file_path) {
            return Err(injected(file_path));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogTx for MemoryTx {
    async fn savepoint(&mut self, name: &str) -> Result<()> {
        if !valid_savepoint_name(name) {
            return Err(MediaError::Internal(format!("invalid savepoint name {name:?}")));
        }
        self.savepoints.push((name.to_string(), self.working.clone()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let pos = self.savepoint_position(name)?;
        self.savepoints.truncate(pos + 1);
        self.working = self.savepoints[pos].1.clone();
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        let pos = self.savepoint_position(name)?;
        self.savepoints.truncate(pos);
        Ok(())
    }

    async fn upsert_movie(&mut self, movie: &MovieRecord) -> Result<Uuid> {
        self.check_upsert(&movie.file_path)?;
        let id = self
            .working
            .movies
            .get(&movie.file_path)
            .map(|(id, _)| *id)
            .unwrap_or_else(Uuid::new_v4);
        self.working
            .movies
            .insert(movie.file_path.clone(), (id, movie.clone()));
        Ok(id)
    }

    async fn upsert_track(&mut self, track: &TrackRecord) -> Result<Uuid> {
        self.check_upsert(&track.file_path)?;
        if let Some(album) = track.album_id
            && !self.working.has_entity(album)
        {
            return Err(MediaError::Internal(format!(
                "tracks.album_id references missing album {album}"
            )));
        }
        let id = self
            .working
            .tracks
            .get(&track.file_path)
            .map(|(id, _)| *id)
            .unwrap_or_else(Uuid::new_v4);
        self.working
            .tracks
            .insert(track.file_path.clone(), (id, track.clone()));
        Ok(id)
    }

    async fn upsert_related(&mut self, seed: &EntitySeed) -> Result<RelatedEntity> {
        self.shared
            .counters
            .related_upserts
            .fetch_add(1, Ordering::SeqCst);
        let key = (seed.kind, seed.external_key());
        let image_url = seed.image.as_ref().map(|img| img.to_url());
        let entity = match self.working.entities.get(&key) {
            Some(existing) => RelatedEntity {
                name: seed.name.clone(),
                image_url: image_url.or_else(|| existing.image_url.clone()),
                ..existing.clone()
            },
            None => RelatedEntity {
                id: Uuid::new_v4(),
                kind: seed.kind,
                external_key: key.1.clone(),
                name: seed.name.clone(),
                image_url,
            },
        };
        self.working.entities.insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete_links(&mut self, table: LinkTable, parent: Uuid) -> Result<()> {
        if let Some(rows) = self.working.links.get_mut(&table) {
            rows.retain(|(p, _)| *p != parent);
        }
        Ok(())
    }

    async fn insert_link(&mut self, table: LinkTable, parent: Uuid, link: &Link) -> Result<()> {
        if !self.working.has_parent(table, parent) {
            return Err(MediaError::Internal(format!(
                "{table}.{} references missing row {parent}",
                table.parent_column()
            )));
        }
        if !self.working.has_entity(link.child_id) {
            return Err(MediaError::Internal(format!(
                "{table}.{} references missing row {}",
                table.child_column(),
                link.child_id
            )));
        }
        let rows = self.working.links.entry(table).or_default();
        let duplicate = rows
            .iter()
            .any(|(p, l)| *p == parent && l.child_id == link.child_id && l.role == link.role);
        if !duplicate {
            rows.push((parent, link.clone()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.shared.faults.lock().fail_commit {
            self.shared.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            return Err(injected("commit"));
        }
        let MemoryTx {
            shared, working, ..
        } = *self;
        *shared.committed.lock() = working;
        shared.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.shared.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(path: &str, size: u64) -> MovieRecord {
        MovieRecord {
            file_path: path.to_string(),
            size,
            title: "Film".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = MemoryCatalog::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_movie(&movie("/m/a.mkv", 10)).await.unwrap();

        assert_eq!(
            store.stored_size(MediaKind::Movies, "/m/a.mkv").await.unwrap(),
            None
        );
        tx.commit().await.unwrap();
        assert_eq!(
            store.stored_size(MediaKind::Movies, "/m/a.mkv").await.unwrap(),
            Some(10)
        );
    }

    #[tokio::test]
    async fn rollback_to_savepoint_discards_only_later_writes() {
        let store = MemoryCatalog::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_movie(&movie("/m/a.mkv", 1)).await.unwrap();
        tx.savepoint("file_1").await.unwrap();
        tx.upsert_movie(&movie("/m/b.mkv", 2)).await.unwrap();
        tx.rollback_to_savepoint("file_1").await.unwrap();
        tx.release_savepoint("file_1").await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.movie("/m/a.mkv").is_some());
        assert!(store.movie("/m/b.mkv").is_none());
    }

    #[tokio::test]
    async fn upserts_keep_ids_stable() {
        let store = MemoryCatalog::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.upsert_movie(&movie("/m/a.mkv", 1)).await.unwrap();
        let second = tx.upsert_movie(&movie("/m/a.mkv", 2)).await.unwrap();
        assert_eq!(first, second);

        let seed = EntitySeed::new(EntityKind::Genre, "Drama").with_external_id(18);
        let a = tx.upsert_related(&seed).await.unwrap();
        let b = tx.upsert_related(&seed).await.unwrap();
        assert_eq!(a.id, b.id);
        tx.commit().await.unwrap();
        assert_eq!(store.entities(EntityKind::Genre).len(), 1);
    }

    #[tokio::test]
    async fn links_enforce_references_and_ignore_duplicates() {
        let store = MemoryCatalog::new();
        let mut tx = store.begin().await.unwrap();
        let parent = tx.upsert_movie(&movie("/m/a.mkv", 1)).await.unwrap();
        let genre = tx
            .upsert_related(&EntitySeed::new(EntityKind::Genre, "Drama"))
            .await
            .unwrap();

        let link = Link::new(genre.id, 0);
        tx.insert_link(LinkTable::MovieGenre, parent, &link).await.unwrap();
        tx.insert_link(LinkTable::MovieGenre, parent, &link).await.unwrap();
        assert!(
            tx.insert_link(LinkTable::MovieGenre, parent, &Link::new(Uuid::new_v4(), 1))
                .await
                .is_err()
        );
        tx.commit().await.unwrap();

        assert_eq!(store.links(LinkTable::MovieGenre, parent), vec![link]);
    }

    #[tokio::test]
    async fn injected_commit_failure_keeps_committed_state() {
        let store = MemoryCatalog::new();
        store.fail_commit(true);
        let mut tx = store.begin().await.unwrap();
        tx.upsert_movie(&movie("/m/a.mkv", 1)).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert!(store.is_empty());
        assert_eq!(store.commits(), 0);
    }
}
