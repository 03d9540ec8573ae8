use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure on a single walk entry. Never aborts the walk.
#[derive(Debug, Clone, Error)]
#[error("{op} failed for {path:?}: {message}")]
pub struct FsError {
    pub op: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl FsError {
    pub(crate) fn new(op: &'static str, path: &Path, message: impl ToString) -> Self {
        Self {
            op,
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Async filesystem abstraction the walker runs against.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, FsError>;

    /// Metadata following symlinks, so a dangling link is an error.
    /// `is_symlink` still reports whether the entry itself is a link.
    async fn metadata(&self, path: &Path) -> Result<FsMetadata, FsError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub len: u64,
}

#[async_trait]
pub trait ReadDirStream {
    /// Next entry's path, or None when exhausted.
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, FsError>;
}

/// Filesystem backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFs {
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, FsError> {
        let rd = tokio::fs::read_dir(path)
            .await
            .map_err(|e| FsError::new("read_dir", path, e))?;
        Ok(Box::new(RealReadDir {
            dir: path.to_path_buf(),
            inner: rd,
        }))
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, FsError> {
        let own = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| FsError::new("symlink_metadata", path, e))?;
        let is_symlink = own.file_type().is_symlink();
        let md = if is_symlink {
            tokio::fs::metadata(path)
                .await
                .map_err(|e| FsError::new("metadata", path, e))?
        } else {
            own
        };
        Ok(FsMetadata {
            is_dir: md.is_dir(),
            is_file: md.is_file(),
            is_symlink,
            len: md.len(),
        })
    }
}

struct RealReadDir {
    dir: PathBuf,
    inner: tokio::fs::ReadDir,
}

#[async_trait]
impl ReadDirStream for RealReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, FsError> {
        match self.inner.next_entry().await {
            Ok(entry) => Ok(entry.map(|e| e.path())),
            Err(e) => Err(FsError::new("next_entry", &self.dir, e)),
        }
    }
}

/// In-memory filesystem for tests.
///
/// Paths are taken literally. Entries registered through
/// [`InMemoryFs::add_broken`] and directories registered through
/// [`InMemoryFs::deny_dir`] fail the way a dangling symlink and a permission
/// error would. [`InMemoryFs::fail_listing_after`] makes a directory listing
/// break partway through.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFs {
    nodes: HashMap<PathBuf, Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Dir {
        children: Vec<PathBuf>,
        denied: bool,
        fail_after: Option<usize>,
    },
    File { len: u64 },
    Link { target: PathBuf },
    Broken,
}

const MAX_LINK_HOPS: usize = 8;

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if self.nodes.contains_key(&path) {
            return;
        }
        self.link_parent(&path);
        self.nodes.insert(
            path,
            Node::Dir {
                children: Vec::new(),
                denied: false,
                fail_after: None,
            },
        );
    }

    pub fn add_file<P: Into<PathBuf>>(&mut self, path: P, len: u64) {
        let path = path.into();
        self.link_parent(&path);
        self.nodes.insert(path, Node::File { len });
    }

    /// Change the size of an existing (or new) file.
    pub fn set_len<P: Into<PathBuf>>(&mut self, path: P, len: u64) {
        self.add_file(path, len);
    }

    pub fn add_broken<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        self.link_parent(&path);
        self.nodes.insert(path, Node::Broken);
    }

    pub fn deny_dir<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        self.add_dir(path.clone());
        if let Some(Node::Dir { denied, .. }) = self.nodes.get_mut(&path) {
            *denied = true;
        }
    }

    /// Register `path` as a symbolic link to `target`.
    pub fn add_symlink<P: Into<PathBuf>, T: Into<PathBuf>>(&mut self, path: P, target: T) {
        let path = path.into();
        self.link_parent(&path);
        self.nodes.insert(path, Node::Link { target: target.into() });
    }

    /// Listing `dir` yields `entries` children, then fails.
    pub fn fail_listing_after<P: Into<PathBuf>>(&mut self, dir: P, entries: usize) {
        let dir = dir.into();
        self.add_dir(dir.clone());
        if let Some(Node::Dir { fail_after, .. }) = self.nodes.get_mut(&dir) {
            *fail_after = Some(entries);
        }
    }

    /// Follow links until a non-link node, or `None` if the chain dangles
    /// or is too long.
    fn resolve(&self, path: &Path) -> Option<(&Node, bool)> {
        let mut node = self.nodes.get(path)?;
        let is_symlink = matches!(node, Node::Link { .. });
        for _ in 0..MAX_LINK_HOPS {
            match node {
                Node::Link { target } => node = self.nodes.get(target)?,
                other => return Some((other, is_symlink)),
            }
        }
        None
    }

    fn link_parent(&mut self, path: &Path) {
        let Some(parent) = path.parent() else {
            return;
        };
        if parent.as_os_str().is_empty() {
            return;
        }
        if !self.nodes.contains_key(parent) {
            self.nodes.insert(
                parent.to_path_buf(),
                Node::Dir {
                    children: Vec::new(),
                    denied: false,
                    fail_after: None,
                },
            );
            self.link_parent(parent);
        }
        if let Some(Node::Dir { children, .. }) = self.nodes.get_mut(parent)
            && !children.iter().any(|p| p.as_path() == path)
        {
            children.push(path.to_path_buf());
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn read_dir(&self, path: &Path) -> Result<Box<dyn ReadDirStream + Send>, FsError> {
        let Some((node, _)) = self.resolve(path) else {
            return Err(FsError::new("read_dir", path, "no such file or directory"));
        };
        match node {
            Node::Dir { denied: true, .. } => Err(FsError::new("read_dir", path, "permission denied")),
            Node::Dir {
                children,
                fail_after,
                ..
            } => {
                // Children keep the path they were listed under, like a real
                // directory reached through a link.
                let queue = children
                    .iter()
                    .filter_map(|child| child.file_name())
                    .map(|name| path.join(name))
                    .collect();
                Ok(Box::new(InMemReadDir {
                    dir: path.to_path_buf(),
                    queue,
                    fail_after: *fail_after,
                }))
            }
            _ => Err(FsError::new("read_dir", path, "not a directory")),
        }
    }

    async fn metadata(&self, path: &Path) -> Result<FsMetadata, FsError> {
        match self.resolve(path) {
            Some((Node::Dir { .. }, is_symlink)) => Ok(FsMetadata {
                is_dir: true,
                is_file: false,
                is_symlink,
                len: 0,
            }),
            Some((Node::File { len }, is_symlink)) => Ok(FsMetadata {
                is_dir: false,
                is_file: true,
                is_symlink,
                len: *len,
            }),
            Some(_) => Err(FsError::new("metadata", path, "dangling symlink")),
            None if self.nodes.contains_key(path) => {
                Err(FsError::new("metadata", path, "dangling symlink"))
            }
            None => Err(FsError::new("metadata", path, "no such file or directory")),
        }
    }
}

struct InMemReadDir {
    dir: PathBuf,
    queue: VecDeque<PathBuf>,
    fail_after: Option<usize>,
}

#[async_trait]
impl ReadDirStream for InMemReadDir {
    async fn next_entry(&mut self) -> Result<Option<PathBuf>, FsError> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(FsError::new("next_entry", &self.dir, "input/output error"));
            }
            *remaining -= 1;
        }
        Ok(self.queue.pop_front())
    }
}
