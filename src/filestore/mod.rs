//! Byte storage for synced files.
//!
//! Every path handed to a [`FileStore`] is caller-supplied and untrusted. The
//! containment helpers here are pure path logic so that any backend can use
//! the same rule: a path is accepted only if, after lexical normalization, it
//! lies strictly below the store root.

mod fs;

use async_trait::async_trait;
use md5::{Digest, Md5};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::error::ErrorKind;

pub use fs::FsFileStore;

#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Missing file or a path outside the root. The two are deliberately
    /// indistinguishable.
    #[error("file not found")]
    NotFound,

    #[error("directory not found: {}", .0.display())]
    DirNotFound(PathBuf),

    #[error("file already exists")]
    AlreadyExists,

    #[error("file store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileStoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::AlreadyExists => ErrorKind::Conflict,
            Self::DirNotFound(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Absolute location of an existing, contained file.
    async fn resolve(&self, path: &str) -> Result<PathBuf, FileStoreError>;

    /// Creates or replaces the file, creating parent directories as needed.
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), FileStoreError>;

    async fn load(&self, path: &str) -> Result<Vec<u8>, FileStoreError>;

    async fn delete(&self, path: &str) -> Result<(), FileStoreError>;

    /// Moves an existing file. The destination must not exist.
    async fn rename(&self, from: &str, to: &str) -> Result<(), FileStoreError>;

    /// Removes a directory and everything below it.
    async fn delete_all(&self, path: &str) -> Result<(), FileStoreError>;

    /// Hex MD5 of the stored bytes, recomputed on every call.
    async fn fingerprint(&self, path: &str) -> Result<String, FileStoreError> {
        let bytes = self.load(path).await?;
        Ok(etag(&bytes))
    }
}

#[must_use]
pub fn etag(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Resolves `.` and `..` without touching the filesystem. `..` at the root
/// of an absolute path stays at the root; in a relative path it is kept.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
        }
    }
    out
}

/// Joins `relative` onto `base` and returns the normalized result only if it
/// lies strictly below `base`. `base` must already be absolute and normalized.
///
/// Absolute `relative` values replace the base in the join and are then
/// rejected by the component-wise prefix check, as are `..` escapes and
/// siblings that merely share a textual prefix (`/srv/data2`).
#[must_use]
pub fn contained_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let joined = normalize_lexically(&base.join(relative));
    (joined.as_path() != base && joined.starts_with(base)).then_some(joined)
}

/// Normalizes a logical path into `a/b/c` form. Returns `None` for empty,
/// absolute, or root-escaping input.
#[must_use]
pub fn clean_logical_path(path: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Prefix(_) | Component::RootDir => return None,
        }
    }

    (!parts.is_empty()).then(|| parts.join("/"))
}
