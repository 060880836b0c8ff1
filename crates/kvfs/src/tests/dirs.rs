use std::sync::Arc;

use super::test_engine;
use crate::engine::Engine;
use crate::error::Error;
use crate::memory::MemoryStore;
use crate::meta::EntryKind;

#[tokio::test]
async fn init_creates_root() {
    let engine = test_engine().await;
    let meta = engine.stat("/").await.unwrap().unwrap();
    assert_eq!(meta.kind, EntryKind::Dir);
    assert_eq!(meta.mode, "0755");
    assert!(engine.is_dir("/").await.unwrap());
}

#[tokio::test]
async fn init_is_idempotent() {
    let engine = test_engine().await;
    engine.chmod("/", "0700").await.unwrap();
    engine.init().await.unwrap();
    let meta = engine.stat("/").await.unwrap().unwrap();
    assert_eq!(meta.mode, "0700");
}

#[tokio::test]
async fn stat_missing_is_none() {
    let engine = test_engine().await;
    assert!(engine.stat("/nope").await.unwrap().is_none());
    assert!(!engine.exists("/nope").await.unwrap());
}

#[tokio::test]
async fn mkdir_creates_entry_and_membership() {
    let engine = test_engine().await;
    engine.mkdir("/projects", false).await.unwrap();
    let meta = engine.stat("/projects").await.unwrap().unwrap();
    assert_eq!(meta.kind, EntryKind::Dir);
    assert_eq!(meta.mode, "0755");
    assert_eq!(engine.read_dir("/").await.unwrap(), vec!["projects"]);
}

#[tokio::test]
async fn mkdir_normalizes_path() {
    let engine = test_engine().await;
    engine.mkdir("/a/../b//c/./..", true).await.unwrap();
    assert!(engine.exists("/b").await.unwrap());
    assert!(!engine.exists("/a").await.unwrap());
    assert!(!engine.exists("/b/c").await.unwrap());
}

#[tokio::test]
async fn mkdir_root_is_noop() {
    let engine = test_engine().await;
    engine.mkdir("/", false).await.unwrap();
    engine.mkdir("/", true).await.unwrap();
}

#[tokio::test]
async fn mkdir_missing_parent_fails() {
    let engine = test_engine().await;
    let err = engine.mkdir("/a/b", false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn mkdir_existing_fails() {
    let engine = test_engine().await;
    engine.mkdir("/a", false).await.unwrap();
    let err = engine.mkdir("/a", false).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[tokio::test]
async fn mkdir_under_file_fails() {
    let engine = test_engine().await;
    engine.write_file("/f", b"x").await.unwrap();
    let err = engine.mkdir("/f/sub", false).await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}

#[tokio::test]
async fn mkdir_parents_creates_chain() {
    let engine = test_engine().await;
    engine.mkdir("/a/b/c", true).await.unwrap();
    assert!(engine.is_dir("/a").await.unwrap());
    assert!(engine.is_dir("/a/b").await.unwrap());
    assert!(engine.is_dir("/a/b/c").await.unwrap());
    assert_eq!(engine.read_dir("/a").await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn mkdir_parents_is_idempotent() {
    let engine = test_engine().await;
    engine.mkdir("/a/b", true).await.unwrap();
    engine.mkdir("/a/b", true).await.unwrap();
    assert_eq!(engine.read_dir("/a").await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn mkdir_parents_through_file_fails() {
    let engine = test_engine().await;
    engine.write_file("/a", b"not a dir").await.unwrap();
    let err = engine.mkdir("/a/b", true).await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(path) if path == "/a"));
}

#[tokio::test]
async fn rmdir_removes_empty_dir() {
    let engine = test_engine().await;
    engine.mkdir("/a", false).await.unwrap();
    engine.rmdir("/a").await.unwrap();
    assert!(engine.stat("/a").await.unwrap().is_none());
    assert!(engine.read_dir("/").await.unwrap().is_empty());
}

#[tokio::test]
async fn rmdir_non_empty_fails() {
    let engine = test_engine().await;
    engine.mkdir("/a/b", true).await.unwrap();
    let err = engine.rmdir("/a").await.unwrap_err();
    assert!(matches!(err, Error::NotEmpty(_)));
}

#[tokio::test]
async fn rmdir_file_fails() {
    let engine = test_engine().await;
    engine.write_file("/f", b"x").await.unwrap();
    let err = engine.rmdir("/f").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}

#[tokio::test]
async fn rmdir_missing_fails() {
    let engine = test_engine().await;
    assert!(engine.rmdir("/nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rmdir_root_fails() {
    let engine = test_engine().await;
    let err = engine.rmdir("/").await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn read_dir_is_sorted() {
    let engine = test_engine().await;
    for name in ["zeta", "alpha", "mid"] {
        engine.mkdir(&format!("/{name}"), false).await.unwrap();
    }
    assert_eq!(
        engine.read_dir("/").await.unwrap(),
        vec!["alpha", "mid", "zeta"]
    );
}

#[tokio::test]
async fn read_dir_missing_fails() {
    let engine = test_engine().await;
    assert!(engine.read_dir("/nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn read_dir_on_file_fails() {
    let engine = test_engine().await;
    engine.write_file("/f", b"x").await.unwrap();
    let err = engine.read_dir("/f").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}

#[tokio::test]
async fn read_dir_with_meta_carries_kinds() {
    let engine = test_engine().await;
    engine.mkdir("/d", false).await.unwrap();
    engine.write_file("/f", b"abc").await.unwrap();
    engine.symlink("/f", "/l").await.unwrap();
    let entries = engine.read_dir_with_meta("/").await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["d", "f", "l"]);
    assert_eq!(entries[0].meta.kind, EntryKind::Dir);
    assert_eq!(entries[1].meta.kind, EntryKind::File);
    assert_eq!(entries[1].meta.size, 3);
    assert_eq!(entries[2].meta.kind, EntryKind::Symlink);
    assert_eq!(entries[2].meta.link_target.as_deref(), Some("/f"));
}

#[tokio::test]
async fn uninitialized_volume_reads_not_found() {
    let engine = Engine::new(Arc::new(MemoryStore::new()), "empty");
    assert!(engine.stat("/").await.unwrap().is_none());
    assert!(engine.read_dir("/").await.unwrap_err().is_not_found());
}
