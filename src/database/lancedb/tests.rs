use super::*;
use crate::database::Comparator;
use crate::embeddings::Chunk;
use tempfile::TempDir;

async fn create_test_store() -> (LanceStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = LanceStore::open(&temp_dir.path().join("vectors"))
        .await
        .expect("should open lance store");
    (store, temp_dir)
}

fn create_test_record(text: &str, sequence_index: usize, rows: Vec<Vec<f32>>) -> VectorRecord {
    let chunk = Chunk {
        text: text.to_string(),
        source: "guide/install.md".to_string(),
        start_offset: sequence_index * 10,
        end_offset: sequence_index * 10 + text.chars().count(),
        sequence_index,
    };
    VectorRecord::new(
        &chunk,
        MultiVector::from_rows(rows).expect("valid rows"),
        Utc::now(),
    )
}

#[tokio::test]
async fn create_registers_geometry() {
    let (store, _temp_dir) = create_test_store().await;
    let geometry = Geometry::new(4).with_model("hashing-v1/4");

    assert!(!store.collection_exists("docs").await.expect("should check"));
    store
        .create_collection("docs", &geometry)
        .await
        .expect("should create collection");

    assert!(store.collection_exists("docs").await.expect("should check"));
    assert_eq!(
        store.collection_geometry("docs").await.expect("should read"),
        Some(geometry.clone())
    );
    assert_eq!(store.count("docs").await.expect("should count"), 0);

    let err = store
        .create_collection("docs", &geometry)
        .await
        .expect_err("duplicate create fails");
    assert!(matches!(err, DocsError::CollectionAlreadyExists(_)));
}

#[tokio::test]
async fn records_round_trip_through_search() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_collection("docs", &Geometry::new(3))
        .await
        .expect("should create collection");

    let near = create_test_record(
        "Install the plugin",
        0,
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
    );
    let far = create_test_record("Shadows", 1, vec![vec![0.0, 0.0, 1.0]]);
    store
        .upsert("docs", &[far.clone(), near.clone()])
        .await
        .expect("should upsert");

    let query = MultiVector::from_rows(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
        .expect("valid rows");
    let hits = store.search("docs", &query, 5).await.expect("should search");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, near.id);
    assert_eq!(hits[0].payload.text, near.payload.text);
    assert_eq!(hits[0].payload.source, "guide/install.md");
    assert_eq!(hits[0].payload.end_offset, near.payload.end_offset);
    assert!((hits[0].score - 2.0).abs() < 1e-5);
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[1].payload.sequence_index, 1);
}

#[tokio::test]
async fn search_respects_limit_and_empty_collections() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_collection("docs", &Geometry::new(2))
        .await
        .expect("should create collection");

    let query = MultiVector::from_rows(vec![vec![1.0, 0.0]]).expect("valid rows");
    assert!(store.search("docs", &query, 3).await.expect("should search").is_empty());

    let records: Vec<VectorRecord> = (0..4)
        .map(|i| create_test_record(&format!("chunk {}", i), i, vec![vec![1.0, i as f32]]))
        .collect();
    store.upsert("docs", &records).await.expect("should upsert");

    let hits = store.search("docs", &query, 3).await.expect("should search");
    assert_eq!(hits.len(), 3);
    assert_eq!(store.count("docs").await.expect("should count"), 4);
}

#[tokio::test]
async fn drop_removes_table_and_registry_entry() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .create_collection("docs", &Geometry::new(2))
        .await
        .expect("should create collection");

    assert!(store.drop_collection("docs").await.expect("should drop"));
    assert!(!store.collection_exists("docs").await.expect("should check"));
    assert!(!store.drop_collection("docs").await.expect("should drop"));

    store
        .create_collection("docs", &Geometry::new(8))
        .await
        .expect("should recreate with new geometry");
    assert_eq!(
        store
            .collection_geometry("docs")
            .await
            .expect("should read")
            .map(|g| g.dimension),
        Some(8)
    );
}

#[tokio::test]
async fn geometry_survives_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    {
        let store = LanceStore::open(&path).await.expect("should open");
        store
            .create_collection("docs", &Geometry::new(5).with_comparator(Comparator::Dot))
            .await
            .expect("should create collection");
    }

    let store = LanceStore::open(&path).await.expect("should reopen");
    let geometry = store
        .collection_geometry("docs")
        .await
        .expect("should read")
        .expect("collection persisted");
    assert_eq!(geometry.dimension, 5);
    assert_eq!(geometry.comparator, Comparator::Dot);
    assert!(geometry.model.is_none());
}

#[tokio::test]
async fn missing_collection_and_bad_names() {
    let (store, _temp_dir) = create_test_store().await;
    let query = MultiVector::from_rows(vec![vec![1.0]]).expect("valid rows");

    assert!(matches!(
        store.search("absent", &query, 1).await,
        Err(DocsError::CollectionNotFound(_))
    ));
    assert!(matches!(
        store.count("absent").await,
        Err(DocsError::CollectionNotFound(_))
    ));
    assert!(matches!(
        store.collection_exists("x' OR '1'='1").await,
        Err(DocsError::InvalidArgument(_))
    ));
}
