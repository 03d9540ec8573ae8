//! Fixed scanner constants. The extension allow-lists are not part of the
//! user configuration.

use std::path::Path;

use crate::types::MediaKind;

/// Number of discovered files handed to one batch transaction.
pub const DEFAULT_BATCH_SIZE: usize = 54;

pub const VIDEO_FILE_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

pub const AUDIO_FILE_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "m4a", "aac", "ogg", "opus", "wma", "alac", "aiff", "ape",
];

pub fn allowed_extensions(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::Movies => VIDEO_FILE_EXTENSIONS,
        MediaKind::Music => AUDIO_FILE_EXTENSIONS,
    }
}

/// Lowercase extension of `path` if it is on the allow-list for `kind`.
pub fn matching_extension(kind: MediaKind, path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    allowed_extensions(kind)
        .contains(&ext.as_str())
        .then_some(ext)
}
