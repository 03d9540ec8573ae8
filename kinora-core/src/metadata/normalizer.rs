//! Turns probe output and catalog answers into typed, nullable records.
//!
//! Probing is mandatory and its failure fails the file. Catalog enrichment is
//! best-effort: errors and misses are logged and the record keeps whatever
//! the file itself told us.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::filename_parser::{parse_movie_name, parse_track_name};
use super::parse::{
    parse_count, parse_frame_rate, parse_int, parse_position, parse_seconds, parse_year,
};
use super::probe::{ProbeOutput, ProbeStream, Prober};
use crate::error::{MediaError, Result};
use crate::providers::matching::{same_name, select_movie};
use crate::providers::tmdb::MovieDetails;
use crate::providers::{MemoizedMusicCatalog, MovieCatalog, MusicCatalog};
use crate::types::{
    AudioStream, Chapter, DiscoveredFile, EntityKind, EntitySeed, ImageSource, MovieRecord,
    SubtitleStream, TmdbImageSize, TrackRecord, VideoStream,
};

const CREW_JOBS: &[&str] = &["Director", "Screenplay", "Writer", "Producer", "Original Music Composer"];
const EXTRA_VIDEO_TYPES: &[&str] = &["Trailer", "Teaser", "Featurette", "Behind the Scenes", "Clip"];
const MAX_CAST: usize = 20;

fn audio_from(stream: &ProbeStream) -> AudioStream {
    AudioStream {
        index: stream.index,
        codec: stream.codec_name.clone(),
        profile: stream.profile.clone(),
        channels: stream.channels,
        channel_layout: stream.channel_layout.clone(),
        sample_rate: parse_count(stream.sample_rate.as_deref()).and_then(|r| u32::try_from(r).ok()),
        bit_rate: parse_int(stream.bit_rate.as_deref()),
        language: stream.tags.get("language"),
        title: stream.tags.get("title"),
        is_default: stream.disposition.default != 0,
    }
}

fn video_from(stream: &ProbeStream) -> VideoStream {
    VideoStream {
        index: stream.index,
        codec: stream.codec_name.clone(),
        profile: stream.profile.clone(),
        width: stream.width,
        height: stream.height,
        frame_rate: parse_frame_rate(stream.avg_frame_rate.as_deref())
            .or_else(|| parse_frame_rate(stream.r_frame_rate.as_deref())),
        bit_rate: parse_int(stream.bit_rate.as_deref()),
        pixel_format: stream.pix_fmt.clone(),
        language: stream.tags.get("language"),
        is_default: stream.disposition.default != 0,
    }
}

fn subtitle_from(stream: &ProbeStream) -> SubtitleStream {
    SubtitleStream {
        index: stream.index,
        codec: stream.codec_name.clone(),
        language: stream.tags.get("language"),
        title: stream.tags.get("title"),
        forced: stream.disposition.forced != 0,
        is_default: stream.disposition.default != 0,
    }
}

/// Technical half of a movie record. A file without a real video stream
/// (cover art does not count) is not a movie.
pub fn movie_from_probe(file: &DiscoveredFile, probe: &ProbeOutput) -> Result<MovieRecord> {
    let video_streams: Vec<VideoStream> = probe
        .streams
        .iter()
        .filter(|s| s.is("video") && s.disposition.attached_pic == 0)
        .map(video_from)
        .collect();

    if video_streams.is_empty() {
        return Err(MediaError::InvalidMedia(format!(
            "{}: no video stream found",
            file.path.display()
        )));
    }

    let chapters = probe
        .chapters
        .iter()
        .filter_map(|c| {
            Some(Chapter {
                title: c.tags.get("title"),
                start_seconds: parse_seconds(c.start_time.as_deref())?,
                end_seconds: parse_seconds(c.end_time.as_deref())?,
            })
        })
        .collect();

    Ok(MovieRecord {
        file_path: file.path_key(),
        file_name: file.file_name(),
        size: file.size,
        container: probe.format.format_name.clone(),
        duration_seconds: parse_seconds(probe.format.duration.as_deref()),
        bit_rate: parse_int(probe.format.bit_rate.as_deref()),
        video_streams,
        audio_streams: probe.streams.iter().filter(|s| s.is("audio")).map(audio_from).collect(),
        subtitle_streams: probe
            .streams
            .iter()
            .filter(|s| s.is("subtitle"))
            .map(subtitle_from)
            .collect(),
        chapters,
        ..Default::default()
    })
}

/// Descriptive tags of an audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub genres: Vec<String>,
    pub track: (Option<i32>, Option<i32>),
    pub disc: (Option<i32>, Option<i32>),
    pub year: Option<i32>,
}

fn split_names(raw: Option<String>, separators: &[char]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.map(|value| {
        value
            .split(|c| separators.contains(&c))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_lowercase()))
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Technical half of a track record plus its tag block. Format tags win over
/// stream tags, matching how ffprobe reports most containers.
pub fn track_from_probe(file: &DiscoveredFile, probe: &ProbeOutput) -> Result<(TrackRecord, TrackTags)> {
    let audio = probe
        .streams
        .iter()
        .find(|s| s.is("audio"))
        .ok_or_else(|| {
            MediaError::InvalidMedia(format!("{}: no audio stream found", file.path.display()))
        })?;

    let tag = |keys: &[&str]| probe.format.tags.first(keys).or_else(|| audio.tags.first(keys));

    let tags = TrackTags {
        title: tag(&["title"]),
        // "/" is left alone: AC/DC is one artist.
        artists: split_names(tag(&["artist"]), &[';', '\0']),
        album_artist: tag(&["album_artist", "albumartist", "album artist"]),
        album: tag(&["album"]),
        genres: split_names(tag(&["genre"]), &[';', ',', '/', '\0']),
        track: parse_position(tag(&["track", "tracknumber"]).as_deref()),
        disc: parse_position(tag(&["disc", "discnumber"]).as_deref()),
        year: parse_year(tag(&["date", "year", "originaldate"]).as_deref()),
    };

    let record = TrackRecord {
        file_path: file.path_key(),
        file_name: file.file_name(),
        size: file.size,
        container: probe.format.format_name.clone(),
        codec: audio.codec_name.clone(),
        profile: audio.profile.clone(),
        bit_rate: parse_int(audio.bit_rate.as_deref())
            .or_else(|| parse_int(probe.format.bit_rate.as_deref())),
        sample_rate: parse_count(audio.sample_rate.as_deref()),
        channels: audio.channels.and_then(|c| i32::try_from(c).ok()),
        channel_layout: audio.channel_layout.clone(),
        duration_seconds: parse_seconds(probe.format.duration.as_deref())
            .or_else(|| parse_seconds(audio.duration.as_deref())),
        ..Default::default()
    };

    Ok((record, tags))
}

/// Related entities a movie links to, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRelations {
    pub genres: Vec<EntitySeed>,
    pub companies: Vec<EntitySeed>,
    /// Person and character.
    pub cast: Vec<(EntitySeed, String)>,
    /// Person and job.
    pub crew: Vec<(EntitySeed, String)>,
    /// Video and its type.
    pub extras: Vec<(EntitySeed, String)>,
}

impl MovieRelations {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.companies.is_empty()
            && self.cast.is_empty()
            && self.crew.is_empty()
            && self.extras.is_empty()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Catalog fields replace filename-derived ones wherever the catalog has them.
pub fn apply_movie_details(record: &mut MovieRecord, details: &MovieDetails) {
    if !details.title.trim().is_empty() {
        record.title = details.title.trim().to_string();
    }
    let release_date = details
        .release_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    if let Some(date) = release_date {
        record.release_date = Some(date);
    }
    if let Some(year) = parse_year(details.release_date.as_deref()) {
        record.year = Some(year);
    }
    record.original_title = non_blank(&details.original_title).or(record.original_title.take());
    record.overview = non_blank(&details.overview).or(record.overview.take());
    record.tagline = non_blank(&details.tagline).or(record.tagline.take());
    record.runtime_minutes = details.runtime.filter(|r| *r > 0).or(record.runtime_minutes);
    record.rating = details.vote_average.or(record.rating);
    record.vote_count = details.vote_count.or(record.vote_count);
    record.popularity = details.popularity.or(record.popularity);
    if let Some(poster) = ImageSource::tmdb(details.poster_path.as_deref(), TmdbImageSize::POSTER) {
        record.poster_url = Some(poster.to_url());
    }
    if let Some(backdrop) =
        ImageSource::tmdb(details.backdrop_path.as_deref(), TmdbImageSize::BACKDROP)
    {
        record.backdrop_url = Some(backdrop.to_url());
    }
    record.tmdb_id = Some(details.id);
}

pub fn movie_relations(details: &MovieDetails) -> MovieRelations {
    let genres = details
        .genres
        .iter()
        .map(|g| EntitySeed::new(EntityKind::Genre, &g.name).with_external_id(format!("tmdb:genre:{}", g.id)))
        .collect();

    let companies = details
        .production_companies
        .iter()
        .map(|c| {
            EntitySeed::new(EntityKind::ProductionCompany, &c.name)
                .with_external_id(format!("tmdb:company:{}", c.id))
                .with_image(ImageSource::tmdb(c.logo_path.as_deref(), TmdbImageSize::LOGO))
        })
        .collect();

    let mut cast_members: Vec<_> = details.credits.cast.iter().collect();
    cast_members.sort_by_key(|c| c.order);
    let cast = cast_members
        .into_iter()
        .take(MAX_CAST)
        .map(|c| {
            (
                person_seed(c.id, &c.name, c.profile_path.as_deref()),
                c.character.clone().unwrap_or_default(),
            )
        })
        .collect();

    let crew = details
        .credits
        .crew
        .iter()
        .filter(|c| CREW_JOBS.contains(&c.job.as_str()))
        .map(|c| (person_seed(c.id, &c.name, c.profile_path.as_deref()), c.job.clone()))
        .collect();

    let extras = details
        .videos
        .results
        .iter()
        .filter(|v| v.site.eq_ignore_ascii_case("youtube"))
        .filter(|v| EXTRA_VIDEO_TYPES.contains(&v.video_type.as_str()))
        .map(|v| {
            let name = if v.name.trim().is_empty() { v.video_type.clone() } else { v.name.clone() };
            (
                EntitySeed::new(EntityKind::ExtraVideo, name)
                    .with_external_id(format!("youtube:{}", v.key))
                    .with_image(Some(ImageSource::YouTube { key: v.key.clone() })),
                v.video_type.clone(),
            )
        })
        .collect();

    MovieRelations {
        genres,
        companies,
        cast,
        crew,
        extras,
    }
}

fn person_seed(id: i64, name: &str, profile_path: Option<&str>) -> EntitySeed {
    EntitySeed::new(EntityKind::Person, name)
        .with_external_id(format!("tmdb:person:{id}"))
        .with_image(ImageSource::tmdb(profile_path, TmdbImageSize::PROFILE))
}

/// A movie ready for the write phase.
#[derive(Debug, Clone)]
pub struct NormalizedMovie {
    pub record: MovieRecord,
    pub relations: MovieRelations,
}

/// Probe + filename + optional movie catalog.
#[derive(Clone)]
pub struct MovieNormalizer {
    prober: Arc<dyn Prober>,
    catalog: Option<Arc<dyn MovieCatalog>>,
}

impl std::fmt::Debug for MovieNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieNormalizer")
            .field("catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl MovieNormalizer {
    pub fn new(prober: Arc<dyn Prober>, catalog: Option<Arc<dyn MovieCatalog>>) -> Self {
        Self { prober, catalog }
    }

    pub async fn normalize(&self, file: &DiscoveredFile) -> Result<NormalizedMovie> {
        let probe = self.prober.probe(&file.path).await?;
        let mut record = movie_from_probe(file, &probe)?;

        let parsed = parse_movie_name(&file.path);
        let search_title = probe.format.tags.get("title").unwrap_or(parsed.title);
        let search_year = parsed
            .year
            .or_else(|| parse_year(probe.format.tags.first(&["date", "year"]).as_deref()));
        record.title = search_title.clone();
        record.year = search_year;

        let mut relations = MovieRelations::default();
        if let Some(catalog) = &self.catalog {
            match self.lookup(catalog.as_ref(), &search_title, search_year).await {
                Ok(Some(details)) => {
                    apply_movie_details(&mut record, &details);
                    relations = movie_relations(&details);
                }
                Ok(None) => debug!(
                    path = %file.path.display(),
                    title = %search_title,
                    year = ?search_year,
                    "no catalog match; keeping filename metadata"
                ),
                Err(e) => warn!(
                    path = %file.path.display(),
                    title = %search_title,
                    error = %e,
                    "movie enrichment failed; keeping filename metadata"
                ),
            }
        }

        Ok(NormalizedMovie { record, relations })
    }

    async fn lookup(
        &self,
        catalog: &dyn MovieCatalog,
        title: &str,
        year: Option<i32>,
    ) -> std::result::Result<Option<MovieDetails>, crate::providers::ProviderError> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let candidates = catalog.search_movies(title, year).await?;
        let Some(best) = select_movie(&candidates, title, year) else {
            return Ok(None);
        };
        catalog.fetch_movie(best.id).await.map(Some)
    }
}

/// A track ready for the write phase.
#[derive(Debug, Clone)]
pub struct NormalizedTrack {
    pub record: TrackRecord,
    pub album: Option<EntitySeed>,
    pub album_artists: Vec<EntitySeed>,
    pub artists: Vec<EntitySeed>,
    pub genres: Vec<EntitySeed>,
}

/// Probe + tags + optional, memoized music catalog.
#[derive(Clone)]
pub struct TrackNormalizer {
    prober: Arc<dyn Prober>,
    catalog: Option<Arc<MemoizedMusicCatalog>>,
}

impl std::fmt::Debug for TrackNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackNormalizer")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl TrackNormalizer {
    pub fn new(prober: Arc<dyn Prober>, catalog: Option<Arc<dyn MusicCatalog>>) -> Self {
        Self {
            prober,
            catalog: catalog.map(|c| Arc::new(MemoizedMusicCatalog::new(c))),
        }
    }

    /// Forget memoized catalog answers. Called when a scan ends.
    pub fn clear_memo(&self) {
        if let Some(catalog) = &self.catalog {
            catalog.clear();
        }
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog.as_ref().map_or(0, |c| c.upstream_calls())
    }

    pub async fn normalize(&self, file: &DiscoveredFile) -> Result<NormalizedTrack> {
        let probe = self.prober.probe(&file.path).await?;
        let (mut record, tags) = track_from_probe(file, &probe)?;

        let parsed = parse_track_name(&file.path);
        record.title = tags.title.clone().unwrap_or(parsed.title);
        record.track_number = tags.track.0.or(parsed.number);
        record.track_total = tags.track.1;
        record.disc_number = tags.disc.0.or(parsed.disc);
        record.disc_total = tags.disc.1;
        record.year = tags.year;

        let mut artists: Vec<EntitySeed> = tags
            .artists
            .iter()
            .map(|name| EntitySeed::new(EntityKind::Musician, name))
            .collect();
        let mut album_artists: Vec<EntitySeed> = tags
            .album_artist
            .as_ref()
            .or(tags.artists.first())
            .map(|name| vec![EntitySeed::new(EntityKind::Musician, name)])
            .unwrap_or_default();
        let genres = tags
            .genres
            .iter()
            .map(|name| EntitySeed::new(EntityKind::Genre, name))
            .collect();

        let album_artist_name = album_artists.first().map(|a| a.name.clone());
        let mut album = tags.album.as_ref().map(|title| {
            EntitySeed::new(EntityKind::Album, title).with_scope(album_artist_name.as_deref())
        });

        if let Some(catalog) = &self.catalog {
            for seed in artists.iter_mut().chain(album_artists.iter_mut()) {
                self.enrich_artist(catalog, seed, file).await;
            }
            if let Some(seed) = album.as_mut() {
                self.enrich_album(catalog, seed, album_artist_name.as_deref(), file)
                    .await;
            }
        }

        Ok(NormalizedTrack {
            record,
            album,
            album_artists,
            artists,
            genres,
        })
    }

    async fn enrich_artist(&self, catalog: &MemoizedMusicCatalog, seed: &mut EntitySeed, file: &DiscoveredFile) {
        match catalog.search_artist(&seed.name).await {
            Ok(Some(found)) if same_name(&found.name, &seed.name) => {
                *seed = EntitySeed::new(EntityKind::Musician, found.name)
                    .with_external_id(format!("deezer:artist:{}", found.id))
                    .with_image(ImageSource::absolute(found.picture_url.as_deref()));
            }
            Ok(_) => debug!(path = %file.path.display(), artist = %seed.name, "no catalog artist match"),
            Err(e) => warn!(
                path = %file.path.display(),
                artist = %seed.name,
                error = %e,
                "artist lookup failed; keeping tag metadata"
            ),
        }
    }

    async fn enrich_album(
        &self,
        catalog: &MemoizedMusicCatalog,
        seed: &mut EntitySeed,
        artist: Option<&str>,
        file: &DiscoveredFile,
    ) {
        match catalog.search_album(&seed.name).await {
            Ok(Some(found))
                if same_name(&found.title, &seed.name)
                    && match (artist, found.artist.as_deref()) {
                        (Some(ours), Some(theirs)) => same_name(ours, theirs),
                        _ => true,
                    } =>
            {
                *seed = EntitySeed::new(EntityKind::Album, found.title)
                    .with_external_id(format!("deezer:album:{}", found.id))
                    .with_image(ImageSource::absolute(found.cover_url.as_deref()));
            }
            Ok(_) => debug!(path = %file.path.display(), album = %seed.name, "no catalog album match"),
            Err(e) => warn!(
                path = %file.path.display(),
                album = %seed.name,
                error = %e,
                "album lookup failed; keeping tag metadata"
            ),
        }
    }
}
