use std::fmt;

use uuid::Uuid;

use super::images::ImageSource;

/// Kinds of records resolved by get-or-create during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Musician,
    Album,
    Genre,
    ProductionCompany,
    Person,
    ExtraVideo,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Musician => "musician",
            EntityKind::Album => "album",
            EntityKind::Genre => "genre",
            EntityKind::ProductionCompany => "production_company",
            EntityKind::Person => "person",
            EntityKind::ExtraVideo => "extra_video",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Musician => "musicians",
            EntityKind::Album => "albums",
            EntityKind::Genre => "genres",
            EntityKind::ProductionCompany => "production_companies",
            EntityKind::Person => "people",
            EntityKind::ExtraVideo => "extra_videos",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to get-or-create: what the catalog (or the file's tags) told us.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntitySeed {
    pub kind: EntityKind,
    pub external_id: Option<String>,
    pub name: String,
    /// Narrows a name-only key, e.g. an album's artist.
    pub scope: Option<String>,
    pub image: Option<ImageSource>,
}

impl EntitySeed {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            external_id: None,
            name: name.into(),
            scope: None,
            image: None,
        }
    }

    pub fn with_external_id(mut self, id: impl ToString) -> Self {
        let id = id.to_string();
        self.external_id = Some(id).filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_scope(mut self, scope: Option<&str>) -> Self {
        self.scope = scope
            .map(normalize_name)
            .filter(|scope| !scope.is_empty());
        self
    }

    pub fn with_image(mut self, image: Option<ImageSource>) -> Self {
        self.image = image;
        self
    }

    /// Natural key the store's uniqueness constraint is built on: the
    /// catalog id when there is one, the normalized name otherwise.
    pub fn external_key(&self) -> String {
        match &self.external_id {
            Some(id) => format!("ext:{}", id.trim()),
            None => match &self.scope {
                Some(scope) => format!("name:{}/{}", scope, normalize_name(&self.name)),
                None => format!("name:{}", normalize_name(&self.name)),
            },
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A persisted related entity. Referenced by `id` once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntity {
    pub id: Uuid,
    pub kind: EntityKind,
    pub external_key: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// Association tables that are replaced wholesale per parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTable {
    MovieGenre,
    MovieProductionCompany,
    MovieCast,
    MovieCrew,
    MovieExtraVideo,
    TrackGenre,
    TrackMusician,
    AlbumMusician,
}

impl LinkTable {
    pub fn table(self) -> &'static str {
        match self {
            LinkTable::MovieGenre => "movie_genres",
            LinkTable::MovieProductionCompany => "movie_production_companies",
            LinkTable::MovieCast => "movie_cast",
            LinkTable::MovieCrew => "movie_crew",
            LinkTable::MovieExtraVideo => "movie_extra_videos",
            LinkTable::TrackGenre => "track_genres",
            LinkTable::TrackMusician => "track_musicians",
            LinkTable::AlbumMusician => "album_musicians",
        }
    }

    pub fn parent_column(self) -> &'static str {
        match self {
            LinkTable::MovieGenre
            | LinkTable::MovieProductionCompany
            | LinkTable::MovieCast
            | LinkTable::MovieCrew
            | LinkTable::MovieExtraVideo => "movie_id",
            LinkTable::TrackGenre | LinkTable::TrackMusician => "track_id",
            LinkTable::AlbumMusician => "album_id",
        }
    }

    pub fn child_column(self) -> &'static str {
        match self {
            LinkTable::MovieGenre | LinkTable::TrackGenre => "genre_id",
            LinkTable::MovieProductionCompany => "company_id",
            LinkTable::MovieCast | LinkTable::MovieCrew => "person_id",
            LinkTable::MovieExtraVideo => "video_id",
            LinkTable::TrackMusician | LinkTable::AlbumMusician => "musician_id",
        }
    }
}

impl fmt::Display for LinkTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// One row of a link table. `role` carries the character for cast, the job
/// for crew and the video type for extras; it is empty elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub child_id: Uuid,
    pub role: String,
    pub ordinal: i32,
}

impl Link {
    pub fn new(child_id: Uuid, ordinal: i32) -> Self {
        Self {
            child_id,
            role: String::new(),
            ordinal,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into().trim().to_string();
        self
    }
}
