use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::ProviderError;
use super::deezer::{AlbumMatch, ArtistMatch, MusicCatalog};
use super::matching::normalize_title;

/// Per-scan memo in front of a music catalog. Albums with many tracks ask for
/// the same artist and album over and over; only the first ask goes out.
///
/// Successful answers are kept, "no match" included. Errors are not.
pub struct MemoizedMusicCatalog {
    inner: Arc<dyn MusicCatalog>,
    artists: Mutex<HashMap<String, Option<ArtistMatch>>>,
    albums: Mutex<HashMap<String, Option<AlbumMatch>>>,
    upstream_calls: AtomicUsize,
}

impl fmt::Debug for MemoizedMusicCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedMusicCatalog")
            .field("artists", &self.artists.lock().len())
            .field("albums", &self.albums.lock().len())
            .field("upstream_calls", &self.upstream_calls())
            .finish()
    }
}

impl MemoizedMusicCatalog {
    pub fn new(inner: Arc<dyn MusicCatalog>) -> Self {
        Self {
            inner,
            artists: Mutex::new(HashMap::new()),
            albums: Mutex::new(HashMap::new()),
            upstream_calls: AtomicUsize::new(0),
        }
    }

    pub fn clear(&self) {
        self.artists.lock().clear();
        self.albums.lock().clear();
    }

    pub fn upstream_calls(&self) -> usize {
        self.upstream_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MusicCatalog for MemoizedMusicCatalog {
    async fn search_artist(&self, name: &str) -> Result<Option<ArtistMatch>, ProviderError> {
        let key = normalize_title(name);
        let cached = self.artists.lock().get(&key).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.search_artist(name).await?;
        self.artists.lock().insert(key, found.clone());
        Ok(found)
    }

    async fn search_album(&self, title: &str) -> Result<Option<AlbumMatch>, ProviderError> {
        let key = normalize_title(title);
        let cached = self.albums.lock().get(&key).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.search_album(title).await?;
        self.albums.lock().insert(key, found.clone());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::deezer::MockMusicCatalog;

    #[tokio::test]
    async fn repeated_queries_hit_upstream_once() {
        let mut inner = MockMusicCatalog::new();
        inner.expect_search_artist().times(1).returning(|name| {
            Ok(Some(ArtistMatch {
                id: 27,
                name: name.to_string(),
                picture_url: None,
            }))
        });
        inner.expect_search_album().times(1).returning(|_| Ok(None));

        let memo = MemoizedMusicCatalog::new(Arc::new(inner));
        for _ in 0..3 {
            assert_eq!(memo.search_artist("Daft Punk").await.unwrap().unwrap().id, 27);
            assert!(memo.search_album("Unknown Album").await.unwrap().is_none());
        }
        assert!(memo.search_artist("daft  punk").await.unwrap().is_some());
        assert_eq!(memo.upstream_calls(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_memoized() {
        let mut inner = MockMusicCatalog::new();
        let mut seq = mockall::Sequence::new();
        inner
            .expect_search_artist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProviderError::RateLimited));
        inner
            .expect_search_artist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));

        let memo = MemoizedMusicCatalog::new(Arc::new(inner));
        assert!(memo.search_artist("Burial").await.is_err());
        assert!(memo.search_artist("Burial").await.unwrap().is_none());
        assert!(memo.search_artist("Burial").await.unwrap().is_none());
        assert_eq!(memo.upstream_calls(), 2);
    }

    #[tokio::test]
    async fn clear_forgets_answers() {
        let mut inner = MockMusicCatalog::new();
        inner.expect_search_album().times(2).returning(|_| Ok(None));

        let memo = MemoizedMusicCatalog::new(Arc::new(inner));
        memo.search_album("Selected Ambient Works").await.unwrap();
        memo.clear();
        memo.search_album("Selected Ambient Works").await.unwrap();
    }
}
