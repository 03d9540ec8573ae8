use std::fs;
use std::path::Path;

use kinora_core::scan::{RealFs, Walker};
use kinora_core::types::MediaKind;
use tempfile::TempDir;

fn touch(root: &Path, relative: &str, bytes: usize) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![0u8; bytes]).unwrap();
}

async fn walk(root: &Path, kind: MediaKind) -> (Vec<(String, String, u64)>, usize) {
    let real = RealFs::new();
    let mut walker = Walker::new(&real, kind, root);
    let mut found = Vec::new();
    while let Some(file) = walker.next().await {
        let relative = file.path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
        found.push((relative, file.extension, file.size));
    }
    (found, walker.errors())
}

#[tokio::test]
async fn walks_a_real_directory_tree() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Artist/Album/01 - Intro.FLAC", 16);
    touch(dir.path(), "Artist/Album/02 - Song.mp3", 32);
    touch(dir.path(), "Artist/Album/cover.jpg", 8);
    touch(dir.path(), "loose.ogg", 4);
    touch(dir.path(), "movie.mkv", 64);
    fs::create_dir_all(dir.path().join("Empty")).unwrap();

    let (found, errors) = walk(dir.path(), MediaKind::Music).await;

    assert_eq!(errors, 0);
    assert_eq!(
        found,
        vec![
            ("loose.ogg".to_string(), "ogg".to_string(), 4),
            ("Artist/Album/01 - Intro.FLAC".to_string(), "flac".to_string(), 16),
            ("Artist/Album/02 - Song.mp3".to_string(), "mp3".to_string(), 32),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn dangling_symlink_is_a_walk_error() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "ok.mkv", 10);
    std::os::unix::fs::symlink(dir.path().join("missing.mkv"), dir.path().join("broken.mkv")).unwrap();

    let (found, errors) = walk(dir.path(), MediaKind::Movies).await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "ok.mkv");
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn missing_root_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let (found, errors) = walk(&dir.path().join("not-there"), MediaKind::Movies).await;
    assert!(found.is_empty());
    assert_eq!(errors, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn directory_symlink_loop_is_not_followed() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "Heat (1995)/Heat.mkv", 10);
    std::os::unix::fs::symlink(dir.path(), dir.path().join("Heat (1995)/loop")).unwrap();
    std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

    let (found, errors) = walk(dir.path(), MediaKind::Movies).await;

    assert_eq!(errors, 0);
    assert_eq!(found, vec![("Heat (1995)/Heat.mkv".to_string(), "mkv".to_string(), 10)]);
}

#[cfg(unix)]
#[tokio::test]
async fn file_symlink_is_followed() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    touch(outside.path(), "Arrival.mkv", 12);
    std::os::unix::fs::symlink(outside.path().join("Arrival.mkv"), dir.path().join("Arrival.mkv")).unwrap();

    let (found, errors) = walk(dir.path(), MediaKind::Movies).await;

    assert_eq!(errors, 0);
    assert_eq!(found, vec![("Arrival.mkv".to_string(), "mkv".to_string(), 12)]);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn non_utf8_file_name_is_a_walk_error() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    touch(dir.path(), "ok.mkv", 10);
    fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.mkv")), [0u8; 10]).unwrap();
    fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfe.mkv")), [0u8; 10]).unwrap();
    fs::write(dir.path().join(OsStr::from_bytes(b"notes\xff.txt")), [0u8; 10]).unwrap();

    let (found, errors) = walk(dir.path(), MediaKind::Movies).await;

    assert_eq!(found, vec![("ok.mkv".to_string(), "mkv".to_string(), 10)]);
    assert_eq!(errors, 2);
}
