use super::*;
use crate::database::memory::MemoryStore;
use crate::database::{Comparator, VectorRecord};
use crate::embeddings::{Chunk, MultiVector};
use chrono::Utc;

fn manager() -> CollectionManager {
    CollectionManager::new(Arc::new(MemoryStore::new()))
}

async fn add_record(manager: &CollectionManager, name: &str, dimension: usize) {
    let chunk = Chunk {
        text: "text".to_string(),
        source: "doc.md".to_string(),
        start_offset: 0,
        end_offset: 4,
        sequence_index: 0,
    };
    let vectors = MultiVector::new(vec![vec![1.0; dimension]], dimension).expect("valid rows");
    manager
        .store()
        .upsert(name, &[VectorRecord::new(&chunk, vectors, Utc::now())])
        .await
        .expect("should upsert");
}

#[tokio::test]
async fn create_refuses_existing_without_recreate() {
    let manager = manager();
    let geometry = Geometry::new(4);

    manager
        .create("docs", &geometry, false)
        .await
        .expect("should create");
    assert!(manager.exists("docs").await.expect("should check"));

    let err = manager
        .create("docs", &geometry, false)
        .await
        .expect_err("existing collection");
    assert!(matches!(err, DocsError::CollectionAlreadyExists(_)));
}

#[tokio::test]
async fn recreate_discards_records() {
    let manager = manager();
    manager
        .create("docs", &Geometry::new(4), false)
        .await
        .expect("should create");
    add_record(&manager, "docs", 4).await;

    manager
        .create("docs", &Geometry::new(8), true)
        .await
        .expect("should recreate");

    let status = manager.status("docs").await.expect("should read status");
    assert_eq!(status.records, 0);
    assert_eq!(status.geometry.map(|g| g.dimension), Some(8));
}

#[tokio::test]
async fn ensure_creates_then_reuses() {
    let manager = manager();
    let geometry = Geometry::new(4).with_model("hashing-v1/4");

    assert_eq!(
        manager.ensure("docs", &geometry).await.expect("should ensure"),
        Ensured::Created
    );
    add_record(&manager, "docs", 4).await;
    assert_eq!(
        manager.ensure("docs", &geometry).await.expect("should ensure"),
        Ensured::Existing
    );
    assert_eq!(manager.status("docs").await.expect("status").records, 1);
}

#[tokio::test]
async fn ensure_rejects_different_geometry() {
    let manager = manager();
    manager
        .create("docs", &Geometry::new(4), false)
        .await
        .expect("should create");

    let err = manager
        .ensure("docs", &Geometry::new(8))
        .await
        .expect_err("dimension differs");
    assert!(err.is_configuration());
    assert!(matches!(err, DocsError::SchemaMismatch(ref m) if m.found.dimension == 4));

    let err = manager
        .ensure("docs", &Geometry::new(4).with_comparator(Comparator::Dot))
        .await
        .expect_err("comparator differs");
    assert!(matches!(err, DocsError::SchemaMismatch(_)));
}

#[tokio::test]
async fn invalid_names_are_rejected() {
    let manager = manager();
    assert!(matches!(
        manager.exists("").await,
        Err(DocsError::InvalidArgument(_))
    ));
    assert!(matches!(
        manager.create("a b", &Geometry::new(2), false).await,
        Err(DocsError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn status_of_missing_collection() {
    let status = manager().status("absent").await.expect("should read status");
    assert!(status.geometry.is_none());
    assert_eq!(status.records, 0);
    assert_eq!(status.backend, "memory");
}
