use super::*;
use crate::store::{SearchParams, VectorStore};
use std::time::Duration;
use tempfile::TempDir;

async fn create_test_backend() -> (TempDir, SqliteBackend) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let backend = SqliteBackend::connect(&db_path, 3)
        .await
        .expect("Failed to connect test backend");

    (temp_dir, backend)
}

async fn store3() -> (TempDir, VectorStore<SqliteBackend>) {
    let (temp_dir, backend) = create_test_backend().await;
    (temp_dir, VectorStore::new(backend, 3))
}

#[tokio::test]
async fn connect_creates_database_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("fresh.db");
    assert!(!db_path.exists());

    let _backend = SqliteBackend::connect(&db_path, 3)
        .await
        .expect("Failed to connect");
    assert!(db_path.exists());
}

#[tokio::test]
async fn embeddings_survive_persistence() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("persisted.txt")
        .await
        .expect("create should succeed");
    let embedding = vec![0.25_f32, -0.5, 0.75];
    store
        .store(&document_id, "persisted chunk", embedding.clone(), 0)
        .await
        .expect("store should succeed");

    let params = SearchParams {
        top_k: 1,
        threshold: 0.0,
        document_id: None,
    };
    let results = store
        .search(&embedding, &params)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "persisted chunk");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn search_matches_memory_semantics() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("doc.txt")
        .await
        .expect("create should succeed");
    for (index, (content, embedding)) in [
        ("orthogonal", [0.0_f32, 1.0, 0.0]),
        ("close", [0.9, 0.1, 0.0]),
        ("exact", [1.0, 0.0, 0.0]),
    ]
    .iter()
    .enumerate()
    {
        store
            .store(&document_id, content, embedding.to_vec(), index as i64)
            .await
            .expect("store should succeed");
    }

    let params = SearchParams {
        top_k: 2,
        threshold: 0.5,
        document_id: None,
    };
    let results = store
        .search(&[1.0, 0.0, 0.0], &params)
        .await
        .expect("search should succeed");

    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["exact", "close"]);
}

#[tokio::test]
async fn scoped_search_isolates_documents() {
    let (_temp_dir, store) = store3().await;

    let doc_a = store
        .create_document("a.txt")
        .await
        .expect("create should succeed");
    let doc_b = store
        .create_document("b.txt")
        .await
        .expect("create should succeed");
    store
        .store(&doc_a, "from a", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");
    store
        .store(&doc_b, "from b", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");

    let params = SearchParams {
        top_k: 5,
        threshold: 0.0,
        document_id: Some(doc_b.clone()),
    };
    let results = store
        .search(&[1.0, 0.0, 0.0], &params)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, doc_b);
}

#[tokio::test]
async fn delete_cascades_and_counts_recover() {
    let (_temp_dir, store) = store3().await;

    let doomed = store
        .create_document("doomed.txt")
        .await
        .expect("create should succeed");
    let survivor = store
        .create_document("survivor.txt")
        .await
        .expect("create should succeed");
    store
        .store(&doomed, "gone", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");
    store
        .store(&doomed, "also gone", vec![0.0, 1.0, 0.0], 1)
        .await
        .expect("store should succeed");
    store
        .store(&survivor, "stays", vec![0.0, 0.0, 1.0], 0)
        .await
        .expect("store should succeed");

    store
        .delete_document(&doomed)
        .await
        .expect("delete should succeed");

    assert!(!store.exists(&doomed).await.expect("exists should succeed"));
    assert_eq!(
        store
            .total_chunk_count()
            .await
            .expect("count should succeed"),
        1
    );
    assert!(matches!(
        store.delete_document(&doomed).await,
        Err(RagError::DocumentNotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_chunk_index_rejected() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("doc.txt")
        .await
        .expect("create should succeed");
    store
        .store(&document_id, "first", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");

    let result = store
        .store(&document_id, "again", vec![0.0, 1.0, 0.0], 0)
        .await;
    assert!(matches!(result, Err(RagError::InvalidParameters(_))));

    assert_eq!(
        store
            .chunk_count(&document_id)
            .await
            .expect("count should succeed"),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_stores_never_lose_counter_updates() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("racy.txt")
        .await
        .expect("create should succeed");

    let mut handles = Vec::new();
    for index in 0..16_i64 {
        let store = store.clone();
        let document_id = document_id.clone();
        handles.push(tokio::spawn(async move {
            store
                .store(&document_id, &format!("chunk {index}"), vec![1.0, 0.0, 0.0], index)
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("store task should not panic")
            .expect("store should succeed");
    }

    assert_eq!(
        store
            .chunk_count(&document_id)
            .await
            .expect("count should succeed"),
        16
    );
    assert_eq!(
        store
            .total_chunk_count()
            .await
            .expect("count should succeed"),
        16
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_is_all_or_nothing_for_scoped_search() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("racy.txt")
        .await
        .expect("create should succeed");
    for index in 0..4_i64 {
        store
            .store(&document_id, &format!("chunk {index}"), vec![1.0, 0.0, 0.0], index)
            .await
            .expect("store should succeed");
    }

    let params = SearchParams {
        top_k: 10,
        threshold: 0.0,
        document_id: Some(document_id.clone()),
    };
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let searcher = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut started_tx = Some(started_tx);
            let mut observed = Vec::new();
            loop {
                match store.search(&[1.0, 0.0, 0.0], &params).await {
                    Ok(results) => observed.push(results.len()),
                    Err(RagError::DocumentNotFound(_)) => break,
                    Err(e) => panic!("unexpected search error: {e}"),
                }
                if let Some(tx) = started_tx.take() {
                    let _ = tx.send(());
                }
            }
            observed
        })
    };

    // Let the searcher land at least one result, then race the delete
    // against the search loop.
    started_rx.await.expect("searcher should report a result");
    tokio::time::sleep(Duration::from_millis(5)).await;
    store
        .delete_document(&document_id)
        .await
        .expect("delete should succeed");

    // Every search must see the whole document or none of it, never a
    // partially deleted one.
    let observed = searcher.await.expect("search task should not panic");
    assert!(!observed.is_empty());
    for count in observed {
        assert!(
            count == 4 || count == 0,
            "search saw a partially deleted document: {count} chunks"
        );
    }
}

#[tokio::test]
async fn clear_all_resets_the_database() {
    let (_temp_dir, store) = store3().await;

    let document_id = store
        .create_document("doc.txt")
        .await
        .expect("create should succeed");
    store
        .store(&document_id, "content", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");

    store.clear_all().await.expect("clear should succeed");

    assert!(
        store
            .list_documents()
            .await
            .expect("list should succeed")
            .is_empty()
    );
    assert_eq!(
        store
            .total_chunk_count()
            .await
            .expect("count should succeed"),
        0
    );
}

#[tokio::test]
async fn list_documents_reports_counts() {
    let (_temp_dir, store) = store3().await;

    let first = store
        .create_document("first.txt")
        .await
        .expect("create should succeed");
    store
        .store(&first, "one", vec![1.0, 0.0, 0.0], 0)
        .await
        .expect("store should succeed");
    store
        .store(&first, "two", vec![0.0, 1.0, 0.0], 1)
        .await
        .expect("store should succeed");
    let second = store
        .create_document("second.txt")
        .await
        .expect("create should succeed");

    let documents = store.list_documents().await.expect("list should succeed");
    assert_eq!(documents.len(), 2);

    let first_record = documents
        .iter()
        .find(|d| d.id == first)
        .expect("first document should be listed");
    assert_eq!(first_record.chunk_count, 2);

    let second_record = documents
        .iter()
        .find(|d| d.id == second)
        .expect("second document should be listed");
    assert_eq!(second_record.chunk_count, 0);
}
