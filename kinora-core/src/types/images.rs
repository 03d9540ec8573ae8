const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const YOUTUBE_THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TmdbImageSize {
    W185,
    W300,
    W500,
    W1280,
    Original,
}

impl TmdbImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            TmdbImageSize::W185 => "w185",
            TmdbImageSize::W300 => "w300",
            TmdbImageSize::W500 => "w500",
            TmdbImageSize::W1280 => "w1280",
            TmdbImageSize::Original => "original",
        }
    }

    pub const POSTER: TmdbImageSize = TmdbImageSize::W500;
    pub const BACKDROP: TmdbImageSize = TmdbImageSize::W1280;
    pub const PROFILE: TmdbImageSize = TmdbImageSize::W185;
    pub const LOGO: TmdbImageSize = TmdbImageSize::W300;
}

/// Where a related entity's artwork comes from. Resolved to a URL when the
/// entity is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// TMDB relative path such as `/kqjL17yufvn9OVLyXYpvtyrFfak.jpg`.
    Tmdb { path: String, size: TmdbImageSize },
    /// YouTube video key; resolves to the video's thumbnail.
    YouTube { key: String },
    /// Provider already returned a complete URL.
    Absolute(String),
}

impl ImageSource {
    pub fn tmdb(path: Option<&str>, size: TmdbImageSize) -> Option<Self> {
        let path = path.map(str::trim).filter(|p| !p.is_empty())?;
        Some(ImageSource::Tmdb {
            path: path.to_string(),
            size,
        })
    }

    pub fn absolute(url: Option<&str>) -> Option<Self> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;
        Some(ImageSource::Absolute(url.to_string()))
    }

    pub fn to_url(&self) -> String {
        match self {
            ImageSource::Tmdb { path, size } => tmdb_image_url(path, *size),
            ImageSource::YouTube { key } => {
                format!("{}/{}/hqdefault.jpg", YOUTUBE_THUMBNAIL_BASE, key)
            }
            ImageSource::Absolute(url) => url.clone(),
        }
    }
}

/// Build a TMDB image URL from a relative path.
pub fn tmdb_image_url(path: &str, size: TmdbImageSize) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("{}/{}{}", TMDB_IMAGE_BASE, size.as_str(), path)
}
