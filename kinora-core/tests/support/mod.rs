//! Collaborator doubles shared by the scan integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use serde_json::{Map, Value, json};

use kinora_core::database::MemoryCatalog;
use kinora_core::metadata::{MovieNormalizer, ProbeError, ProbeOutput, Prober, TrackNormalizer};
use kinora_core::providers::{
    AlbumMatch, ArtistMatch, MovieCandidate, MovieCatalog, MovieDetails, MusicCatalog,
    ProviderError,
};
use kinora_core::scan::settings::matching_extension;
use kinora_core::scan::{InMemoryFs, MoviePipeline, MusicPipeline, ScanOrchestrator};
use kinora_core::types::MediaKind;

mock! {
    pub Tmdb {}

    #[async_trait]
    impl MovieCatalog for Tmdb {
        async fn search_movies(
            &self,
            title: &str,
            year: Option<i32>,
        ) -> Result<Vec<MovieCandidate>, ProviderError>;

        async fn fetch_movie(&self, id: i64) -> Result<MovieDetails, ProviderError>;
    }
}

/// Answers like ffprobe would for a healthy file of the extension's kind.
/// Files whose name contains `corrupt` fail the way an unreadable container
/// does. Every file shares one tag block.
#[derive(Debug, Default)]
pub struct FakeProber {
    tags: Map<String, Value>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_tags(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            tags: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeOutput, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if name.contains("corrupt") {
            return Err(ProbeError::Failed {
                status: Some(1),
                stderr: "Invalid data found when processing input".into(),
            });
        }

        let document = if matching_extension(MediaKind::Music, path).is_some() {
            json!({
                "streams": [{
                    "index": 0,
                    "codec_type": "audio",
                    "codec_name": "flac",
                    "sample_rate": "44100",
                    "channels": 2,
                    "channel_layout": "stereo"
                }],
                "format": {
                    "format_name": "flac",
                    "duration": "201.5",
                    "bit_rate": "900000",
                    "tags": self.tags
                }
            })
        } else {
            json!({
                "streams": [
                    {
                        "index": 0,
                        "codec_type": "video",
                        "codec_name": "h264",
                        "width": 1920,
                        "height": 1080,
                        "r_frame_rate": "24000/1001"
                    },
                    {
                        "index": 1,
                        "codec_type": "audio",
                        "codec_name": "aac",
                        "channels": 6,
                        "sample_rate": "48000",
                        "tags": { "language": "eng" }
                    }
                ],
                "format": {
                    "format_name": "matroska,webm",
                    "duration": "5400.25",
                    "bit_rate": "8000000",
                    "tags": self.tags
                },
                "chapters": []
            })
        };
        ProbeOutput::from_json(&serde_json::to_vec(&document)?)
    }
}

/// Music catalog that knows a fixed set of artists and albums and counts
/// every call it answers.
#[derive(Debug, Default)]
pub struct FakeMusicCatalog {
    artists: HashMap<String, ArtistMatch>,
    albums: HashMap<String, AlbumMatch>,
    calls: AtomicUsize,
    fail: Mutex<bool>,
}

impl FakeMusicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artist(mut self, id: i64, name: &str) -> Self {
        self.artists.insert(
            name.to_lowercase(),
            ArtistMatch {
                id,
                name: name.to_string(),
                picture_url: Some(format!("https://cdn.example/artist/{id}.jpg")),
            },
        );
        self
    }

    pub fn album(mut self, id: i64, title: &str, artist: &str) -> Self {
        self.albums.insert(
            title.to_lowercase(),
            AlbumMatch {
                id,
                title: title.to_string(),
                artist: Some(artist.to_string()),
                cover_url: Some(format!("https://cdn.example/album/{id}.jpg")),
            },
        );
        self
    }

    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl MusicCatalog for FakeMusicCatalog {
    async fn search_artist(&self, name: &str) -> Result<Option<ArtistMatch>, ProviderError> {
        self.check()?;
        Ok(self.artists.get(&name.to_lowercase()).cloned())
    }

    async fn search_album(&self, title: &str) -> Result<Option<AlbumMatch>, ProviderError> {
        self.check()?;
        Ok(self.albums.get(&title.to_lowercase()).cloned())
    }
}

pub fn movie_pipeline(prober: Arc<FakeProber>, catalog: Option<Arc<dyn MovieCatalog>>) -> MoviePipeline {
    MoviePipeline::new(MovieNormalizer::new(prober, catalog))
}

pub fn music_pipeline(prober: Arc<FakeProber>, catalog: Option<Arc<dyn MusicCatalog>>) -> MusicPipeline {
    MusicPipeline::new(TrackNormalizer::new(prober, catalog))
}

/// Orchestrator over a snapshot of `fs`.
pub fn orchestrator<P: kinora_core::scan::MediaPipeline>(
    pipeline: Arc<P>,
    fs: &InMemoryFs,
    store: &MemoryCatalog,
) -> ScanOrchestrator<P> {
    ScanOrchestrator::new(
        pipeline,
        Arc::new(fs.clone()),
        Arc::new(store.clone()),
        Arc::new(tokio::sync::Mutex::new(())),
    )
}

/// `count` FLAC files named `01 - Track 1.flac` and so on under `root`.
pub fn album_dir(fs: &mut InMemoryFs, root: &str, count: usize) {
    for n in 1..=count {
        fs.add_file(format!("{root}/{n:02} - Track {n}.flac"), 1_000 + n as u64);
    }
}

pub fn candidate(id: i64, title: &str, release_date: &str, popularity: f64, vote_average: f64) -> MovieCandidate {
    MovieCandidate {
        id,
        title: title.to_string(),
        release_date: Some(release_date.to_string()),
        popularity,
        vote_average,
        ..Default::default()
    }
}
