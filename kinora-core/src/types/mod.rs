pub mod entities;
pub mod images;
pub mod media;

pub use entities::{EntityKind, EntitySeed, Link, LinkTable, RelatedEntity};
pub use images::{ImageSource, TmdbImageSize, tmdb_image_url};
pub use media::{
    AudioStream, Chapter, DiscoveredFile, MediaKind, MovieRecord, SubtitleStream, TrackRecord,
    VideoStream,
};
