use std::sync::Arc;

use tracing::debug;

use crate::database::CatalogStore;
use crate::types::{DiscoveredFile, MediaKind};

/// Path + size gate in front of the expensive per-file work.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn CatalogStore>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector").finish_non_exhaustive()
    }
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// True only when a stored record for the path has exactly this size.
    /// Lookup failures count as "changed".
    pub async fn is_unchanged(&self, kind: MediaKind, file: &DiscoveredFile) -> bool {
        match self.store.stored_size(kind, &file.path_key()).await {
            Ok(Some(stored)) => stored == file.size,
            Ok(None) => false,
            Err(e) => {
                debug!(
                    path = %file.path.display(),
                    error = %e,
                    "change lookup failed; treating as changed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCatalog;
    use crate::types::MovieRecord;
    use std::path::PathBuf;

    fn discovered(path: &str, size: u64) -> DiscoveredFile {
        DiscoveredFile {
            path: PathBuf::from(path),
            extension: "mkv".into(),
            size,
        }
    }

    #[tokio::test]
    async fn only_exact_size_matches_are_unchanged() {
        let store = MemoryCatalog::new();
        let mut tx = store.begin().await.unwrap();
        tx.upsert_movie(&MovieRecord {
            file_path: "/m/a.mkv".into(),
            size: 100,
            ..Default::default()
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let detector = ChangeDetector::new(Arc::new(store.clone()));
        assert!(detector.is_unchanged(MediaKind::Movies, &discovered("/m/a.mkv", 100)).await);
        assert!(!detector.is_unchanged(MediaKind::Movies, &discovered("/m/a.mkv", 101)).await);
        assert!(!detector.is_unchanged(MediaKind::Movies, &discovered("/m/b.mkv", 100)).await);
        assert!(!detector.is_unchanged(MediaKind::Music, &discovered("/m/a.mkv", 100)).await);

        store.fail_size_lookup(true);
        assert!(!detector.is_unchanged(MediaKind::Movies, &discovered("/m/a.mkv", 100)).await);
    }
}
