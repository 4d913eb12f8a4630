use super::*;
use crate::embeddings::Chunk;
use chrono::Utc;

fn record(text: &str, rows: Vec<Vec<f32>>) -> VectorRecord {
    let chunk = Chunk {
        text: text.to_string(),
        source: "doc.md".to_string(),
        start_offset: 0,
        end_offset: text.chars().count(),
        sequence_index: 0,
    };
    VectorRecord::new(
        &chunk,
        MultiVector::from_rows(rows).expect("valid rows"),
        Utc::now(),
    )
}

#[tokio::test]
async fn create_twice_fails() {
    let store = MemoryStore::new();
    store
        .create_collection("docs", &Geometry::new(2))
        .await
        .expect("should create collection");

    let err = store
        .create_collection("docs", &Geometry::new(2))
        .await
        .expect_err("second create fails");
    assert!(matches!(err, DocsError::CollectionAlreadyExists(name) if name == "docs"));
}

#[tokio::test]
async fn search_ranks_by_max_sim() {
    let store = MemoryStore::new();
    store
        .create_collection("docs", &Geometry::new(2))
        .await
        .expect("should create collection");
    store
        .upsert(
            "docs",
            &[
                record("far", vec![vec![0.0, 1.0]]),
                record("near", vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
                record("middle", vec![vec![0.7, 0.7]]),
            ],
        )
        .await
        .expect("should upsert");

    let query = MultiVector::from_rows(vec![vec![1.0, 0.0]]).expect("valid rows");
    let hits = store.search("docs", &query, 2).await.expect("should search");

    let texts: Vec<&str> = hits.iter().map(|h| h.payload.text.as_str()).collect();
    assert_eq!(texts, vec!["near", "middle"]);
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(store.count("docs").await.expect("should count"), 3);
}

#[tokio::test]
async fn missing_collection_is_reported() {
    let store = MemoryStore::new();
    let query = MultiVector::from_rows(vec![vec![1.0]]).expect("valid rows");

    assert!(matches!(
        store.search("nope", &query, 1).await,
        Err(DocsError::CollectionNotFound(_))
    ));
    assert!(matches!(
        store.upsert("nope", &[]).await,
        Err(DocsError::CollectionNotFound(_))
    ));
    assert!(!store.collection_exists("nope").await.expect("should check"));
    assert!(store.collection_geometry("nope").await.expect("should read").is_none());
}

#[tokio::test]
async fn wrong_width_records_are_rejected() {
    let store = MemoryStore::new();
    store
        .create_collection("docs", &Geometry::new(3))
        .await
        .expect("should create collection");

    let result = store.upsert("docs", &[record("x", vec![vec![1.0, 0.0]])]).await;
    assert!(matches!(result, Err(DocsError::Database(_))));
    assert_eq!(store.count("docs").await.expect("should count"), 0);
}

#[tokio::test]
async fn drop_discards_records() {
    let store = MemoryStore::new();
    store
        .create_collection("docs", &Geometry::new(1))
        .await
        .expect("should create collection");
    store
        .upsert("docs", &[record("x", vec![vec![1.0]])])
        .await
        .expect("should upsert");

    assert!(store.drop_collection("docs").await.expect("should drop"));
    assert!(!store.drop_collection("docs").await.expect("should drop"));
    assert!(!store.collection_exists("docs").await.expect("should check"));
}
