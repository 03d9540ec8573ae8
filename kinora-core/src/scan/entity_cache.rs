use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::{EntityKind, RelatedEntity};

type Key = (EntityKind, String);

/// Scan-scoped memo of resolved related entities, keyed by kind and external
/// key. Only ever holds entities whose rows are committed.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: RwLock<HashMap<Key, RelatedEntity>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind, external_key: &str) -> Option<RelatedEntity> {
        self.entries
            .read()
            .get(&(kind, external_key.to_string()))
            .cloned()
    }

    pub fn set(&self, kind: EntityKind, external_key: impl Into<String>, entity: RelatedEntity) {
        self.entries.write().insert((kind, external_key.into()), entity);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Batch-local view over the cache.
///
/// Entities created while a file's savepoint is open sit in the file layer;
/// releasing the savepoint promotes them to the batch layer, rolling back
/// drops them. The batch layer reaches the shared cache only after commit.
#[derive(Debug)]
pub struct StagedEntities<'a> {
    cache: &'a EntityCache,
    batch: HashMap<Key, RelatedEntity>,
    file: HashMap<Key, RelatedEntity>,
}

impl<'a> StagedEntities<'a> {
    pub fn new(cache: &'a EntityCache) -> Self {
        Self {
            cache,
            batch: HashMap::new(),
            file: HashMap::new(),
        }
    }

    /// Counts a hit or miss against the cache's stats.
    pub fn lookup(&self, kind: EntityKind, external_key: &str) -> Option<RelatedEntity> {
        let found = self.cache.get(kind, external_key).or_else(|| {
            let key = (kind, external_key.to_string());
            self.batch.get(&key).or_else(|| self.file.get(&key)).cloned()
        });
        self.cache.record(found.is_some());
        found
    }

    pub fn stage(&mut self, entity: RelatedEntity) {
        self.file
            .insert((entity.kind, entity.external_key.clone()), entity);
    }

    pub fn promote_file(&mut self) {
        self.batch.extend(self.file.drain());
    }

    pub fn discard_file(&mut self) {
        self.file.clear();
    }

    /// Publish everything promoted so far. Call only after commit.
    pub fn publish(self) -> usize {
        let published = self.batch.len();
        for ((kind, key), entity) in self.batch {
            self.cache.set(kind, key, entity);
        }
        published
    }
}
