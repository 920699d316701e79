use std::sync::Arc;

use obsync::db::Store;
use obsync::error::ErrorKind;
use obsync::filestore::{FileStore, FsFileStore, etag};
use obsync::services::{SeaOrmSyncService, SyncError, SyncService};

struct Harness {
    _dir: tempfile::TempDir,
    store: Store,
    files: Arc<FsFileStore>,
    sync: SeaOrmSyncService,
    user_id: i64,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("Failed to open store");
    let files = Arc::new(FsFileStore::new(dir.path()).unwrap());
    let sync = SeaOrmSyncService::new(store.clone(), files.clone());
    let user = store
        .create_user("alice", "alice@example.com", "$argon2id$test")
        .await
        .unwrap();

    Harness {
        _dir: dir,
        store,
        files,
        sync,
        user_id: user.id,
    }
}

#[tokio::test]
async fn test_upload_and_download() {
    let h = setup().await;

    let file = h.sync.upload(h.user_id, "notes/a.md", b"hello").await.unwrap();
    assert_eq!(file.filepath, "notes/a.md");
    assert_eq!(file.etag, "5d41402abc4b2a76b9719d911017c592");
    assert_eq!(file.created_at, file.updated_at);

    let (meta, bytes) = h.sync.download(h.user_id, "notes/a.md").await.unwrap();
    assert_eq!(bytes, b"hello");
    assert_eq!(meta.id, file.id);

    let on_disk = h.files.root().join(h.user_id.to_string()).join("notes").join("a.md");
    assert_eq!(std::fs::read(on_disk).unwrap(), b"hello");

    let by_id = h.store.get_sync_file(file.id).await.unwrap().unwrap();
    assert_eq!(by_id.filepath, "notes/a.md");
}

#[tokio::test]
async fn test_paths_are_normalized() {
    let h = setup().await;

    let file = h
        .sync
        .upload(h.user_id, "./notes//drafts/../a.md", b"x")
        .await
        .unwrap();
    assert_eq!(file.filepath, "notes/a.md");

    assert!(matches!(
        h.sync.upload(h.user_id, "notes/a.md", b"y").await,
        Err(SyncError::FilepathExists)
    ));
}

#[tokio::test]
async fn test_escaping_paths_are_not_found() {
    let h = setup().await;

    for path in ["../escape.md", "/etc/passwd", "a/../../b.md", ""] {
        let err = h.sync.upload(h.user_id, path, b"x").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound), "{path}");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    assert!(h.sync.list(h.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_upload_is_conflict() {
    let h = setup().await;
    h.sync.upload(h.user_id, "a.md", b"one").await.unwrap();

    let err = h.sync.upload(h.user_id, "a.md", b"two").await.unwrap_err();
    assert!(matches!(err, SyncError::FilepathExists));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let (_, bytes) = h.sync.download(h.user_id, "a.md").await.unwrap();
    assert_eq!(bytes, b"one");
}

#[tokio::test]
async fn test_paths_clashing_on_disk_are_conflicts() {
    let h = setup().await;
    h.sync.upload(h.user_id, "notes/a.md", b"a").await.unwrap();

    let err = h.sync.upload(h.user_id, "notes", b"x").await.unwrap_err();
    assert!(matches!(err, SyncError::FilepathExists));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h
        .sync
        .upload(h.user_id, "notes/a.md/b.md", b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::FilepathExists));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.sync.upload(h.user_id, "b.md", b"b").await.unwrap();
    assert!(matches!(
        h.sync.rename(h.user_id, "b.md", "notes/a.md/b.md").await,
        Err(SyncError::FilepathExists)
    ));

    let files = h.sync.list(h.user_id).await.unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.filepath.as_str()).collect();
    assert_eq!(paths, vec!["b.md", "notes/a.md"]);

    let (_, bytes) = h.sync.download(h.user_id, "notes/a.md").await.unwrap();
    assert_eq!(bytes, b"a");
}

#[tokio::test]
async fn test_update_changes_fingerprint() {
    let h = setup().await;
    let original = h.sync.upload(h.user_id, "a.md", b"one").await.unwrap();

    let updated = h.sync.update(h.user_id, "a.md", b"two").await.unwrap();
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.etag, etag(b"two"));
    assert_ne!(updated.etag, original.etag);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.created_at, original.created_at);

    assert!(matches!(
        h.sync.update(h.user_id, "missing.md", b"x").await,
        Err(SyncError::NotFound)
    ));
}

#[tokio::test]
async fn test_list_is_ordered_and_scoped() {
    let h = setup().await;
    let other = h
        .store
        .create_user("bob", "bob@example.com", "$argon2id$test")
        .await
        .unwrap();

    assert!(h.sync.list(h.user_id).await.unwrap().is_empty());

    h.sync.upload(h.user_id, "b.md", b"b").await.unwrap();
    h.sync.upload(h.user_id, "a/z.md", b"z").await.unwrap();
    h.sync.upload(other.id, "b.md", b"other").await.unwrap();

    let paths: Vec<String> = h
        .sync
        .list(h.user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.filepath)
        .collect();
    assert_eq!(paths, vec!["a/z.md", "b.md"]);

    let (_, bytes) = h.sync.download(other.id, "b.md").await.unwrap();
    assert_eq!(bytes, b"other");
    assert!(matches!(
        h.sync.download(other.id, "a/z.md").await,
        Err(SyncError::NotFound)
    ));
}

#[tokio::test]
async fn test_remove() {
    let h = setup().await;
    h.sync.upload(h.user_id, "a.md", b"a").await.unwrap();

    h.sync.remove(h.user_id, "a.md").await.unwrap();
    assert!(h.sync.list(h.user_id).await.unwrap().is_empty());
    assert!(matches!(
        h.sync.download(h.user_id, "a.md").await,
        Err(SyncError::NotFound)
    ));
    assert!(matches!(
        h.sync.remove(h.user_id, "a.md").await,
        Err(SyncError::NotFound)
    ));
}

#[tokio::test]
async fn test_remove_tolerates_missing_bytes() {
    let h = setup().await;
    h.sync.upload(h.user_id, "a.md", b"a").await.unwrap();
    h.files
        .delete(&format!("{}/a.md", h.user_id))
        .await
        .unwrap();

    h.sync.remove(h.user_id, "a.md").await.unwrap();
    assert!(h.sync.list(h.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename() {
    let h = setup().await;
    h.sync.upload(h.user_id, "a.md", b"a").await.unwrap();
    h.sync.upload(h.user_id, "b.md", b"b").await.unwrap();

    assert!(matches!(
        h.sync.rename(h.user_id, "a.md", "b.md").await,
        Err(SyncError::FilepathExists)
    ));
    assert!(matches!(
        h.sync.rename(h.user_id, "missing.md", "c.md").await,
        Err(SyncError::NotFound)
    ));
    assert!(matches!(
        h.sync.rename(h.user_id, "a.md", "../../c.md").await,
        Err(SyncError::NotFound)
    ));

    let renamed = h
        .sync
        .rename(h.user_id, "a.md", "archive/a.md")
        .await
        .unwrap();
    assert_eq!(renamed.filepath, "archive/a.md");
    assert_eq!(renamed.etag, etag(b"a"));

    let (_, bytes) = h.sync.download(h.user_id, "archive/a.md").await.unwrap();
    assert_eq!(bytes, b"a");
    assert!(matches!(
        h.sync.download(h.user_id, "a.md").await,
        Err(SyncError::NotFound)
    ));
}

#[tokio::test]
async fn test_purge_user() {
    let h = setup().await;

    // Nothing stored yet
    h.sync.purge_user(h.user_id).await.unwrap();

    h.sync.upload(h.user_id, "a.md", b"a").await.unwrap();
    h.sync.upload(h.user_id, "deep/b.md", b"b").await.unwrap();

    h.sync.purge_user(h.user_id).await.unwrap();
    assert!(!h.files.root().join(h.user_id.to_string()).exists());
    assert!(h.files.root().exists());
}
