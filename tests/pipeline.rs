use std::path::Path;
use std::sync::Arc;

use httpmock::{Method::POST, MockServer};
use serde_json::json;

use docrag::error::VectorStoreError;
use docrag::models::{
    ChunkPosition, Config, DocumentType, EmbeddingConfig, StorageConfig,
};
use docrag::services::{
    EmbeddingService, HashEmbeddingBackend, PerformanceMonitor, Pipeline, TextChunker,
    TypeDetector,
};

const DIMENSION: usize = 3;

fn config(base_url: &str, storage: &Path) -> Config {
    Config {
        embedding: EmbeddingConfig {
            url: base_url.to_string(),
            model: "test-model".to_string(),
            dimension: DIMENSION,
            retry_initial_delay_ms: 1,
            ..Default::default()
        },
        storage: StorageConfig {
            path: storage.to_path_buf(),
            collection: "integration".to_string(),
        },
        ..Default::default()
    }
}

fn offline_pipeline(storage: &Path) -> Pipeline {
    let config = config("http://127.0.0.1:1", storage);
    let monitor = Arc::new(PerformanceMonitor::default());
    let embedder = Arc::new(EmbeddingService::with_backend(
        Arc::new(HashEmbeddingBackend::new(DIMENSION)),
        monitor.clone(),
    ));
    Pipeline::with_embedder(&config, embedder, monitor)
}

#[test]
fn test_legal_text_is_detected() {
    let text = "Article 1. Le bailleur s'engage selon la clause suivante. \
                Conformément à l'alinéa 3, le preneur paie le loyer.";
    assert_eq!(TypeDetector::new().detect(text), DocumentType::Legal);
}

#[test]
fn test_plain_text_split_200_50() {
    let text = "Rivers carry water toward the sea after heavy rain falls on the hills. ".repeat(20);
    let chunker = TextChunker::new(Arc::new(PerformanceMonitor::default()));

    let chunks = chunker.split(&text, "rivers.txt", 200, 50).unwrap();
    assert!(chunks.len() >= 3, "got {} chunks", chunks.len());

    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_id, i);
        assert_eq!(chunk.total_chunks, total);
        assert_eq!(chunk.document_type, DocumentType::Default);
        assert!(!chunk.contains_structure);
        assert!(chunk.content.chars().count() <= 200);
        assert_eq!(chunk.filename, "rivers.txt");
    }
    assert_eq!(chunks[0].chunk_position, ChunkPosition::Start);
    assert_eq!(chunks[total - 1].chunk_position, ChunkPosition::End);
    assert!(chunks[1..total - 1]
        .iter()
        .all(|c| c.chunk_position == ChunkPosition::Middle));
}

#[tokio::test]
async fn test_unavailable_endpoint_falls_back_after_three_attempts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/test-model");
            then.status(503).body("model is loading");
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config(&server.base_url(), dir.path());
    let service =
        EmbeddingService::new(&config.embedding, Arc::new(PerformanceMonitor::default())).unwrap();

    let texts = vec!["alpha".to_string(), "beta".to_string()];
    let vectors = service.embed_many(&texts).await;

    assert_eq!(mock.hits_async().await, 3);
    assert!(service.is_degraded());
    assert_eq!(service.fallback_batches(), 1);

    let fallback = HashEmbeddingBackend::new(DIMENSION);
    assert_eq!(vectors[0], fallback.vector_for("alpha"));
    assert_eq!(vectors[1], fallback.vector_for("beta"));
    assert_ne!(vectors[0], vectors[1]);
    assert!(vectors.iter().all(|v| v.len() == DIMENSION));
}

#[tokio::test]
async fn test_ingest_and_query_through_http_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/test-model");
            then.status(200).json_body(json!([[1.0, 0.0, 0.0]]));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&config(&server.base_url(), dir.path())).unwrap();
    assert!(pipeline.probe().await.is_reachable());

    let (count, summary) = pipeline
        .ingest("Run the installer before the first start.", "guide.txt", 500, 50)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(summary.total_chunks, 1);

    let results = pipeline.query("installer guide", 3).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].filename(), "guide.txt");
    let score = results[0].relevance_score.unwrap();
    assert!((score - 1.0).abs() < 1e-6);

    assert!(!pipeline.embedder().is_degraded());
    assert_eq!(pipeline.embedder().fallback_batches(), 0);
    // probe, ingest, query
    assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn test_empty_add_leaves_collection_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = offline_pipeline(dir.path());
    pipeline
        .ingest("A short note about gardening in spring.", "garden.txt", 200, 50)
        .await
        .unwrap();
    let before = pipeline.store().collection_info().await.unwrap();

    let err = pipeline.store().add(Vec::new()).await.unwrap_err();
    assert!(matches!(err, VectorStoreError::EmptyBatch));

    let after = pipeline.store().collection_info().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.count, 1);
}

#[tokio::test]
async fn test_search_on_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = offline_pipeline(dir.path());
    let results = pipeline.query("anything at all", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = offline_pipeline(dir.path());
    pipeline
        .ingest("Notes on bread baking and proofing dough.", "bread.txt", 200, 50)
        .await
        .unwrap();

    pipeline.store().reset("integration").await.unwrap();
    let first = pipeline.store().collection_info().await.unwrap();
    pipeline.store().reset("integration").await.unwrap();
    let second = pipeline.store().collection_info().await.unwrap();

    assert_eq!(first.count, 0);
    assert_eq!(second.count, 0);
    assert_eq!(first.name, second.name);
    assert_eq!(second.dimension, DIMENSION);
}

#[tokio::test]
async fn test_collection_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let pipeline = offline_pipeline(dir.path());
        pipeline
            .ingest("Lighthouses guide ships along the rocky coast.", "coast.txt", 200, 50)
            .await
            .unwrap();
    }

    let pipeline = offline_pipeline(dir.path());
    let results = pipeline.query("rocky coast", 3).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].filename(), "coast.txt");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingest_and_query_keep_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(offline_pipeline(dir.path()));

    let mut ingests = Vec::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        ingests.push(tokio::spawn(async move {
            let text = format!("Report {i} covers harbour traffic in week {i}. ").repeat(12);
            let (count, _) = pipeline
                .ingest(&text, &format!("report_{i}.txt"), 200, 50)
                .await
                .unwrap();
            count
        }));
    }
    let mut queries = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        queries.push(tokio::spawn(async move {
            pipeline.query("harbour traffic", 5).await.unwrap().len()
        }));
    }

    let mut expected = 0;
    for handle in ingests {
        expected += handle.await.unwrap();
    }
    for handle in queries {
        assert!(handle.await.unwrap() <= 5);
    }

    assert!(expected > 8);
    let info = pipeline.store().collection_info().await.unwrap();
    assert_eq!(info.count, expected as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_excludes_running_queries() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(offline_pipeline(dir.path()));
    let text = "Tide tables list the high water times for each port. ".repeat(10);
    pipeline.ingest(&text, "tides.txt", 200, 50).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                pipeline.store().reset("integration").await.unwrap();
            } else {
                // each query sees either the full or the empty collection
                let hits = pipeline.query("high water times", 20).await.unwrap();
                assert!(hits.iter().all(|h| h.filename() == "tides.txt"));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let info = pipeline.store().collection_info().await.unwrap();
    assert_eq!(info.count, 0);
    assert_eq!(pipeline.monitor().summary(Some("search"), None).unwrap().success_rate, 100.0);
}
