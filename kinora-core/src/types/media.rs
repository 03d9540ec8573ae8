use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which library a scan walks. Each kind has its own root, allow-list,
/// catalog table and concurrency flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movies,
    Music,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Movies, MediaKind::Music];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movies => "movies",
            MediaKind::Music => "music",
        }
    }

    /// Catalog table holding one row per file of this kind.
    pub fn table(self) -> &'static str {
        match self {
            MediaKind::Movies => "movies",
            MediaKind::Music => "tracks",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file matched by the walk. Lives until its batch commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub size: u64,
}

impl DiscoveredFile {
    /// Catalog key for the path. The walker rejects non-UTF-8 paths, so this
    /// is lossless for anything it yields.
    pub fn path_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub index: u32,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub bit_rate: Option<i64>,
    pub pixel_format: Option<String>,
    pub language: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<i64>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub forced: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Row written to `movies`, keyed by `file_path`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRecord {
    pub file_path: String,
    pub file_name: String,
    pub size: u64,
    pub container: Option<String>,
    pub duration_seconds: Option<f64>,
    pub bit_rate: Option<i64>,
    pub video_streams: Vec<VideoStream>,
    pub audio_streams: Vec<AudioStream>,
    pub subtitle_streams: Vec<SubtitleStream>,
    pub chapters: Vec<Chapter>,

    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime_minutes: Option<i32>,
    pub rating: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub tmdb_id: Option<i64>,
}

/// Row written to `tracks`, keyed by `file_path`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub file_path: String,
    pub file_name: String,
    pub size: u64,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub bit_rate: Option<i64>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i32>,
    pub channel_layout: Option<String>,
    pub duration_seconds: Option<f64>,

    pub title: String,
    pub album_id: Option<Uuid>,
    pub track_number: Option<i32>,
    pub track_total: Option<i32>,
    pub disc_number: Option<i32>,
    pub disc_total: Option<i32>,
    pub year: Option<i32>,
}
