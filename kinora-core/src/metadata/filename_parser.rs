use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static FOLDER_TITLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\((\d{4})\)\s*$").expect("valid regex"));

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d])((?:19|20)\d{2})(?:[^\d]|$)").expect("valid regex"));

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").expect("valid regex"));

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\)").expect("valid regex"));

static QUALITY_CUTOFF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\s.\-_]*[\(\[]?\s*\b(BluRay|BDRip|BRRip|WEBRip|WEB-DL|WEBDL|SDTV|HDTV|DVDRip|HDCAM|HDRip|xvid|divx|x264|x265|h264|h265|hevc|10bit|HDR10|HDR|AC3|AAC|DTS|Remux|UHD|4K|\d{3,4}p)\b.*$",
    )
    .expect("valid regex")
});

static EDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\s\-]*\b(unrated|extended|director'?s?\s*cut|theatrical|special\s*edition|ultimate\s*edition|final\s*cut|remastered|uncut)\b.*$",
    )
    .expect("valid regex")
});

static STANDALONE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid regex"));

static RELEASE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*\w+$").expect("valid regex"));

static TRACK_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{1,2})[-.])?(\d{1,3})\s*(?:[-._]\s*|\s+)(.+)$").expect("valid regex")
});

/// Title and year guessed from a movie's folder or file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMovieName {
    pub title: String,
    pub year: Option<i32>,
}

/// Track position and title guessed from a file name like `03 - Title.flac`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrackName {
    pub disc: Option<i32>,
    pub number: Option<i32>,
    pub title: String,
}

/// Parse `Title (Year)/anything.mkv` or `Title.Year.1080p.BluRay-GRP.mkv`.
pub fn parse_movie_name(path: &Path) -> ParsedMovieName {
    if let Some(parsed) = parse_movie_folder(path) {
        return parsed;
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let year = extract_year(stem);

    ParsedMovieName {
        title: clean_movie_title(stem),
        year,
    }
}

fn parse_movie_folder(path: &Path) -> Option<ParsedMovieName> {
    let folder = path.parent()?.file_name()?.to_str()?;
    let captures = FOLDER_TITLE_YEAR.captures(folder)?;
    let title = captures.get(1)?.as_str().trim();
    let year = captures.get(2)?.as_str().parse::<i32>().ok()?;
    if title.is_empty() || !(1900..=2100).contains(&year) {
        return None;
    }
    Some(ParsedMovieName {
        title: title.to_string(),
        year: Some(year),
    })
}

pub fn extract_year(name: &str) -> Option<i32> {
    let captures = YEAR.captures(name)?;
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    (1900..=2100).contains(&year).then_some(year)
}

/// Strip release noise so the remainder is searchable.
pub fn clean_movie_title(raw: &str) -> String {
    let mut cleaned = BRACKETED.replace_all(raw, " ").into_owned();
    cleaned = QUALITY_CUTOFF.replace(&cleaned, "").into_owned();
    cleaned = EDITION.replace(&cleaned, "").into_owned();

    loop {
        let before = cleaned.len();
        cleaned = PARENTHESIZED.replace_all(&cleaned, " ").into_owned();
        cleaned = cleaned.replace(['(', ')'], " ");
        if cleaned.len() == before {
            break;
        }
    }

    cleaned = cleaned.replace(['.', '_'], " ");
    cleaned = STANDALONE_YEAR.replace_all(&cleaned, "").into_owned();
    cleaned = RELEASE_GROUP.replace(&cleaned, "").into_owned();
    cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let cleaned = cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '.')
        .to_string();

    if cleaned.is_empty() {
        raw.replace(['.', '_'], " ").trim().to_string()
    } else {
        cleaned
    }
}

pub fn parse_track_name(path: &Path) -> ParsedTrackName {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim();

    if let Some(captures) = TRACK_PREFIX.captures(stem) {
        let title = captures
            .get(3)
            .map(|m| m.as_str().replace('_', " ").trim().to_string())
            .unwrap_or_default();
        if !title.is_empty() {
            return ParsedTrackName {
                disc: captures.get(1).and_then(|m| m.as_str().parse().ok()),
                number: captures
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .filter(|n| *n > 0),
                title,
            };
        }
    }

    ParsedTrackName {
        disc: None,
        number: None,
        title: stem.replace('_', " "),
    }
}
