//! Tests for state module

use super::*;
use crate::error::Error;
use crate::pagination::PageReference;
use crate::record::Record;
use tempfile::tempdir;

// ============================================================================
// CheckpointStore Tests
// ============================================================================

#[test]
fn test_checkpoint_store_in_memory() {
    let store = CheckpointStore::in_memory("quotes");
    assert!(store.is_in_memory());
    assert_eq!(store.checkpoint().job, "quotes");
}

#[tokio::test]
async fn test_in_memory_store_never_touches_disk() {
    let mut store = CheckpointStore::in_memory("quotes");
    store
        .record_page(None, Some(&PageReference::url("https://q.test/page/2/")), 10)
        .await
        .unwrap();
    assert_eq!(store.checkpoint().pages_fetched, 1);
    assert!(!store.load().await.unwrap());
}

#[tokio::test]
async fn test_record_page_saves_atomically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("quotes.checkpoint.json");
    let next = PageReference::url("https://quotes.toscrape.com/page/3/");

    let mut store = CheckpointStore::new(&path, "quotes");
    store.record_page(None, Some(&next), 10).await.unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());

    let reopened = CheckpointStore::open(&path, "quotes").await.unwrap();
    assert_eq!(reopened.checkpoint().pages_fetched, 1);
    assert_eq!(reopened.checkpoint().records_written, 10);
    assert_eq!(reopened.checkpoint().resume_cursor(None), Some(&next));
}

#[tokio::test]
async fn test_without_auto_save_requires_explicit_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vets.json");

    let mut store = CheckpointStore::new(&path, "vets").without_auto_save();
    store
        .record_page(None, Some(&PageReference::offset(50)), 50)
        .await
        .unwrap();
    assert!(!path.exists());

    store.save().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_open_missing_file_starts_fresh() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::open(dir.path().join("absent.json"), "books")
        .await
        .unwrap();
    assert_eq!(store.checkpoint().pages_fetched, 0);
}

#[tokio::test]
async fn test_open_rejects_other_job() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cp.json");

    let mut store = CheckpointStore::new(&path, "quotes");
    store.complete().await.unwrap();

    let err = CheckpointStore::open(&path, "books").await.unwrap_err();
    assert!(matches!(err, Error::State { .. }));
}

#[tokio::test]
async fn test_open_rejects_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cp.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = CheckpointStore::open(&path, "quotes").await.unwrap_err();
    assert!(matches!(err, Error::State { .. }));
}

#[tokio::test]
async fn test_seed_progress_and_clear() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("books.json");

    let mut store = CheckpointStore::new(&path, "books");
    store.complete_seed("Travel").await.unwrap();
    store
        .record_page(
            Some("Mystery"),
            Some(&PageReference::url("https://b.test/mystery/page-2.html")),
            20,
        )
        .await
        .unwrap();

    let reopened = CheckpointStore::open(&path, "books").await.unwrap();
    assert!(reopened.checkpoint().is_seed_completed("Travel"));
    assert!(reopened.checkpoint().resume_cursor(Some("Mystery")).is_some());

    store.clear().await.unwrap();
    let reopened = CheckpointStore::open(&path, "books").await.unwrap();
    assert!(reopened.checkpoint().completed_seeds.is_empty());
}

// ============================================================================
// SeenKeys Tests
// ============================================================================

fn vet(license: Option<&str>) -> Record {
    Record::from_pairs([
        ("licenseNumber", license.map(str::to_string)),
        ("fullName", Some("Jane Doe".to_string())),
    ])
}

#[test]
fn test_seen_keys_insert() {
    let mut seen = SeenKeys::new("licenseNumber");
    assert!(seen.insert(&vet(Some("123"))));
    assert!(!seen.insert(&vet(Some("123"))));
    assert!(seen.insert(&vet(Some("124"))));
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_seen_keys_accepts_missing_key() {
    let mut seen = SeenKeys::new("licenseNumber");
    assert!(seen.insert(&vet(None)));
    assert!(seen.insert(&vet(None)));
    assert!(seen.is_empty());
}

#[test]
fn test_seen_keys_load_from_jsonl() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vets.jsonl");
    std::fs::write(
        &path,
        "{\"licenseNumber\":\"1\",\"fullName\":\"A\"}\n\
         garbage\n\
         \n\
         {\"licenseNumber\":null}\n\
         {\"licenseNumber\":\"2\"}\n\
         {\"licenseNumber\":\"1\"}\n",
    )
    .unwrap();

    let mut seen = SeenKeys::new("licenseNumber");
    assert_eq!(seen.load_from_jsonl(&path).unwrap(), 2);
    assert!(!seen.insert(&vet(Some("2"))));
    assert!(seen.insert(&vet(Some("3"))));
}

#[test]
fn test_seen_keys_load_missing_file() {
    let dir = tempdir().unwrap();
    let mut seen = SeenKeys::new("id");
    assert_eq!(seen.load_from_jsonl(dir.path().join("none.jsonl")).unwrap(), 0);
    assert_eq!(seen.field(), "id");
}
