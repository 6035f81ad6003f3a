//! End-to-end tests over the local pipeline: chunking, indexing both
//! retrieval signals, scoped retrieval, and the HTTP surface. External
//! collaborators (LLM, GitHub, search backend) are pointed at unroutable
//! addresses so nothing leaves the machine; retrieval degrades to its
//! lexical-only path by design.

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gh_assistant::api;
use gh_assistant::config::Config;
use gh_assistant::models::DocumentChunk;
use gh_assistant::rag::chunker;
use gh_assistant::rag::loader::RepoDocument;
use gh_assistant::rag::retrieve;
use gh_assistant::search::hybrid::rrf_fuse;
use gh_assistant::state::AppState;

fn test_config(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.data_dir = data_dir.to_path_buf();
    config.llm.base_url = "http://127.0.0.1:1".to_string();
    config.search.searxng_url = "http://127.0.0.1:1".to_string();
    config
}

fn chunk(repo: &str, path: &str, idx: usize, content: &str) -> DocumentChunk {
    DocumentChunk {
        repo: repo.to_string(),
        file_path: path.to_string(),
        chunk_index: idx,
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_chunk_index_retrieve_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = AppState::new(config.clone()).unwrap();

    let docs = vec![RepoDocument {
        path: "src/auth.rs".to_string(),
        content: "pub fn verify_session_token(token: &str) -> Result<Claims, AuthError> {\n\
                  // decode and validate the signed session token\n}\n"
            .to_string(),
    }];

    let chunks = chunker::chunk_documents("acme/webapp", &docs);
    assert!(!chunks.is_empty());
    state.bm25.index_chunks(&chunks).unwrap();

    let results = retrieve::retrieve(
        &config,
        &state.http,
        &state.bm25,
        &state.vectors,
        "verify_session_token",
        Some("acme/webapp"),
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    // The indexed text comes back verbatim, with its provenance.
    let hit = &results[0];
    assert!(hit.content.contains("verify_session_token"));
    assert_eq!(hit.repo, "acme/webapp");
    assert_eq!(hit.file_path, "src/auth.rs");
}

#[tokio::test]
async fn test_retrieval_is_scoped_to_one_repository() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = AppState::new(config.clone()).unwrap();

    state
        .bm25
        .index_chunks(&[
            chunk("acme/webapp", "auth.rs", 0, "session token validation logic"),
            chunk("other/service", "auth.py", 0, "session token validation logic"),
        ])
        .unwrap();
    state
        .vectors
        .add_entries(&[
            (chunk("acme/webapp", "auth.rs", 0, "session token validation logic"), vec![1.0, 0.0]),
            (chunk("other/service", "auth.py", 0, "session token validation logic"), vec![1.0, 0.0]),
        ])
        .unwrap();

    let results = retrieve::retrieve(
        &config,
        &state.http,
        &state.bm25,
        &state.vectors,
        "session token",
        Some("acme/webapp"),
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|c| c.repo == "acme/webapp"));
}

#[tokio::test]
async fn test_fusion_prefers_chunks_found_by_both_signals() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = AppState::new(config).unwrap();

    state
        .bm25
        .index_chunks(&[
            chunk("a/b", "both.rs", 0, "connection pool sizing"),
            chunk("a/b", "lexical_only.rs", 0, "connection pool metrics"),
        ])
        .unwrap();
    state
        .vectors
        .add_entries(&[
            (chunk("a/b", "both.rs", 0, "connection pool sizing"), vec![1.0, 0.0]),
            (chunk("a/b", "dense_only.rs", 0, "unrelated words"), vec![0.9, 0.1]),
        ])
        .unwrap();

    let bm25_hits = state.bm25.search("connection pool", 10, Some("a/b")).unwrap();
    let vector_hits = state.vectors.search(&[1.0, 0.0], 10, Some("a/b"));
    let fused = rrf_fuse(&bm25_hits, &vector_hits, 3);

    assert!(!fused.is_empty());
    assert_eq!(fused[0].file_path, "both.rs");
}

#[tokio::test]
async fn test_indexed_chunks_are_immediately_countable() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = AppState::new(config).unwrap();

    let chunks: Vec<DocumentChunk> = (0..5)
        .map(|i| chunk("a/b", "f.rs", i, &format!("chunk body {i}")))
        .collect();
    state.bm25.index_chunks(&chunks).unwrap();

    assert_eq!(state.bm25.doc_count("a/b").unwrap(), 5);
    assert_eq!(state.bm25.doc_count("c/d").unwrap(), 0);
}

#[tokio::test]
async fn test_retried_ingestion_replaces_instead_of_appending() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = AppState::new(config).unwrap();

    let chunks: Vec<DocumentChunk> = (0..4)
        .map(|i| chunk("acme/webapp", "src/lib.rs", i, &format!("module body {i}")))
        .collect();

    // Two indexing rounds for the same repo, as produced by a retry after a
    // partial failure or by a process restart. Each round clears the repo's
    // old records first, exactly as the ingestion pipeline does.
    for _ in 0..2 {
        state.bm25.delete_repo("acme/webapp").unwrap();
        state.bm25.index_chunks(&chunks).unwrap();
        state.vectors.remove_repo("acme/webapp").unwrap();
        state
            .vectors
            .add_entries(
                &chunks
                    .iter()
                    .map(|c| (c.clone(), vec![1.0, 0.0]))
                    .collect::<Vec<_>>(),
            )
            .unwrap();
    }

    assert_eq!(state.bm25.doc_count("acme/webapp").unwrap(), chunks.len());
    assert_eq!(state.vectors.entry_count(), chunks.len());

    // No chunk appears twice in a scoped search either.
    let hits = state.bm25.search("module body", 10, Some("acme/webapp")).unwrap();
    assert_eq!(hits.len(), chunks.len());
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(dir.path())).unwrap();
    let app = api::app(state);

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blank_chat_query_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(dir.path())).unwrap();
    let app = api::app(state);

    let resp = app
        .oneshot(
            Request::post("/chat")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_with_unreachable_llm_returns_designed_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(dir.path())).unwrap();
    let app = api::app(state);

    // Classification cannot reach the model, so the request fails with the
    // designed user-facing message rather than a transport error.
    let resp = app
        .oneshot(
            Request::post("/chat")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"query": "how many stars does a/b have?"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
