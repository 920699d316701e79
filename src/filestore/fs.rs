use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FileStore, FileStoreError, contained_join, normalize_lexically};

#[cfg(unix)]
const FILE_MODE: u32 = 0o640;

/// Local-disk [`FileStore`] rooted at an absolute directory.
#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    /// Fails with [`FileStoreError::DirNotFound`] when `root` is not an
    /// existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FileStoreError> {
        let root = root.as_ref();
        let absolute = normalize_lexically(&std::path::absolute(root)?);

        if !absolute.is_dir() {
            return Err(FileStoreError::DirNotFound(absolute));
        }

        Ok(Self { root: absolute })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn contain(&self, path: &str) -> Result<PathBuf, FileStoreError> {
        contained_join(&self.root, path).ok_or_else(|| {
            debug!(event = "file_store.path_rejected", "Rejected path outside store root");
            FileStoreError::NotFound
        })
    }

    async fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), FileStoreError> {
        let parent = target.parent().ok_or(FileStoreError::NotFound)?;
        tokio::fs::create_dir_all(parent).await.map_err(clash_or_io)?;

        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        if let Err(e) = Self::write_new(&temp, bytes).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&temp, target).await {
            warn!(error = %e, "Failed to move temporary file into place");
            tokio::fs::remove_file(&temp).await.ok();
            return Err(clash_or_io(e));
        }

        Ok(())
    }

    async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), FileStoreError> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let mut file = options.open(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// A path component already taken by an entry of the other type (a file
/// where a directory is needed, or the reverse).
fn clash_or_io(e: std::io::Error) -> FileStoreError {
    match e.kind() {
        IoErrorKind::AlreadyExists | IoErrorKind::IsADirectory | IoErrorKind::NotADirectory => {
            FileStoreError::AlreadyExists
        }
        _ => FileStoreError::Io(e),
    }
}

fn not_found_or_io(e: std::io::Error) -> FileStoreError {
    if e.kind() == IoErrorKind::NotFound {
        FileStoreError::NotFound
    } else {
        FileStoreError::Io(e)
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn resolve(&self, path: &str) -> Result<PathBuf, FileStoreError> {
        let target = self.contain(path)?;
        tokio::fs::symlink_metadata(&target)
            .await
            .map_err(not_found_or_io)?;
        Ok(target)
    }

    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), FileStoreError> {
        let target = self.contain(path)?;
        Self::write_atomically(&target, bytes).await
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, FileStoreError> {
        let target = self.resolve(path).await?;
        tokio::fs::read(&target).await.map_err(not_found_or_io)
    }

    async fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        let target = self.resolve(path).await?;
        tokio::fs::remove_file(&target).await.map_err(not_found_or_io)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FileStoreError> {
        let source = self.resolve(from).await?;
        let destination = self.contain(to)?;

        if tokio::fs::try_exists(&destination)
            .await
            .map_err(clash_or_io)?
        {
            return Err(FileStoreError::AlreadyExists);
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(clash_or_io)?;
        }

        tokio::fs::rename(&source, &destination)
            .await
            .map_err(not_found_or_io)
    }

    async fn delete_all(&self, path: &str) -> Result<(), FileStoreError> {
        let target = self.resolve(path).await?;
        tokio::fs::remove_dir_all(&target)
            .await
            .map_err(not_found_or_io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filestore::etag;

    fn store() -> (tempfile::TempDir, FsFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("srv").join("data");
        std::fs::create_dir_all(&root).unwrap();
        let store = FsFileStore::new(&root).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            FsFileStore::new(&missing),
            Err(FileStoreError::DirNotFound(_))
        ));
    }

    #[test]
    fn test_root_is_absolute() {
        let (_dir, store) = store();
        assert!(store.root().is_absolute());
    }

    #[tokio::test]
    async fn test_save_load_and_fingerprint() {
        let (_dir, store) = store();

        store.save("notes/a.md", b"hello").await.unwrap();
        assert_eq!(store.load("notes/a.md").await.unwrap(), b"hello");
        assert_eq!(
            store.fingerprint("notes/a.md").await.unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );

        store.save("notes/a.md", b"hello, world").await.unwrap();
        assert_eq!(store.load("notes/a.md").await.unwrap(), b"hello, world");
        assert_eq!(
            store.fingerprint("notes/a.md").await.unwrap(),
            etag(b"hello, world")
        );
    }

    #[tokio::test]
    async fn test_save_leaves_no_temporary_files() {
        let (_dir, store) = store();
        store.save("a.md", b"one").await.unwrap();
        store.save("a.md", b"two").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("a.md")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_files_are_not_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save("private.md", b"secret").await.unwrap();
        let mode = std::fs::metadata(store.root().join("private.md"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o007, 0);
    }

    #[tokio::test]
    async fn test_escapes_are_not_found() {
        let (dir, store) = store();
        let sibling = dir.path().join("srv").join("data2");
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("secret"), b"x").unwrap();
        std::fs::write(dir.path().join("srv").join("escape.md"), b"x").unwrap();

        assert!(matches!(
            store.save("../escape.md", b"hello").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.resolve("../escape.md").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.load("../data2/secret").await,
            Err(FileStoreError::NotFound)
        ));

        let absolute = sibling.join("secret");
        assert!(matches!(
            store.load(&absolute.to_string_lossy()).await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.delete("../escape.md").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(dir.path().join("srv").join("escape.md").exists());
    }

    #[tokio::test]
    async fn test_missing_files_are_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.resolve("nothing.md").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.delete("nothing.md").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.fingerprint("nothing.md").await,
            Err(FileStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_resolve_stays_inside_root() {
        let (_dir, store) = store();
        store.save("notes/a.md", b"x").await.unwrap();

        let resolved = store.resolve("notes/./../notes/a.md").await.unwrap();
        assert!(resolved.starts_with(store.root()));
        assert_eq!(resolved, store.root().join("notes").join("a.md"));
    }

    #[tokio::test]
    async fn test_rename() {
        let (_dir, store) = store();
        store.save("a.md", b"a").await.unwrap();
        store.save("b.md", b"b").await.unwrap();

        assert!(matches!(
            store.rename("a.md", "b.md").await,
            Err(FileStoreError::AlreadyExists)
        ));
        assert!(matches!(
            store.rename("a.md", "../outside.md").await,
            Err(FileStoreError::NotFound)
        ));
        assert!(matches!(
            store.rename("missing.md", "c.md").await,
            Err(FileStoreError::NotFound)
        ));

        store.rename("a.md", "archive/a.md").await.unwrap();
        assert_eq!(store.load("archive/a.md").await.unwrap(), b"a");
        assert!(matches!(
            store.load("a.md").await,
            Err(FileStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_file_and_directory_clashes() {
        let (_dir, store) = store();
        store.save("notes/a.md", b"a").await.unwrap();

        assert!(matches!(
            store.save("notes", b"x").await,
            Err(FileStoreError::AlreadyExists)
        ));
        assert!(matches!(
            store.save("notes/a.md/b.md", b"x").await,
            Err(FileStoreError::AlreadyExists)
        ));
        assert!(matches!(
            store.save("notes/a.md/deep/b.md", b"x").await,
            Err(FileStoreError::AlreadyExists)
        ));

        store.save("b.md", b"b").await.unwrap();
        assert!(matches!(
            store.rename("b.md", "notes/a.md/b.md").await,
            Err(FileStoreError::AlreadyExists)
        ));

        assert_eq!(store.load("notes/a.md").await.unwrap(), b"a");
        let leftovers: Vec<_> = std::fs::read_dir(store.root().join("notes"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("a.md")]);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let (_dir, store) = store();
        store.save("7/a.md", b"a").await.unwrap();
        store.save("7/deep/b.md", b"b").await.unwrap();

        store.delete("7/a.md").await.unwrap();
        assert!(matches!(
            store.load("7/a.md").await,
            Err(FileStoreError::NotFound)
        ));

        store.delete_all("7").await.unwrap();
        assert!(!store.root().join("7").exists());
        assert!(store.root().exists());
    }
}
