//! At-most-once repository ingestion.
//!
//! The registry remembers which repositories have been fully indexed in this
//! process, and serializes concurrent ingestion attempts per repository. A
//! repository is only marked ingested after the whole pipeline (clone, walk,
//! chunk, index both signals) succeeds; any failure leaves it unmarked so a
//! later request retries from scratch.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::RouterError;
use crate::llm::embeddings;
use crate::models::DocumentChunk;
use crate::rag::{chunker, loader};
use crate::search::bm25::Bm25Index;
use crate::search::vector::VectorStore;

/// Embedding batch size. Also the granularity of the per-chunk retry when a
/// whole batch fails.
const EMBED_BATCH: usize = 32;

/// Per-process record of which repositories are fully ingested.
pub struct IngestRegistry {
    ingested: RwLock<HashSet<String>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IngestRegistry {
    pub fn new() -> Self {
        Self {
            ingested: RwLock::new(HashSet::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_ingested(&self, repo: &str) -> bool {
        self.ingested.read().contains(repo)
    }

    fn mark_ingested(&self, repo: &str) {
        self.ingested.write().insert(repo.to_string());
    }

    /// The per-repository mutex that serializes ingestion attempts. Requests
    /// for different repositories never contend with each other.
    fn repo_lock(&self, repo: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(repo.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl Default for IngestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Ingest `repo` unless it already has been. Concurrent callers for the same
/// repository wait on one pipeline run rather than starting their own.
pub async fn ensure_ingested(
    config: &Config,
    client: &reqwest::Client,
    bm25: &Arc<Bm25Index>,
    vectors: &Arc<VectorStore>,
    registry: &IngestRegistry,
    repo: &str,
) -> Result<(), RouterError> {
    ensure_ingested_with(registry, repo, || {
        run_pipeline(config, client, bm25, vectors, repo)
    })
    .await
}

/// The registry protocol, generic over the pipeline: fast-path membership
/// check, per-repo lock, second check under the lock (a concurrent caller may
/// have finished while we waited), then run and mark only on success.
pub async fn ensure_ingested_with<F, Fut>(
    registry: &IngestRegistry,
    repo: &str,
    pipeline: F,
) -> Result<(), RouterError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if registry.is_ingested(repo) {
        return Ok(());
    }

    let lock = registry.repo_lock(repo);
    let _guard = lock.lock().await;

    if registry.is_ingested(repo) {
        return Ok(());
    }

    pipeline().await.map_err(RouterError::Ingestion)?;
    registry.mark_ingested(repo);
    Ok(())
}

/// Clone, walk, chunk, and index one repository into both retrieval signals.
async fn run_pipeline(
    config: &Config,
    client: &reqwest::Client,
    bm25: &Arc<Bm25Index>,
    vectors: &Arc<VectorStore>,
    repo: &str,
) -> Result<()> {
    let started = Instant::now();

    let cfg = config.clone();
    let repo_key = repo.to_string();
    let docs = tokio::task::spawn_blocking(move || loader::load_repo(&cfg, &repo_key))
        .await
        .context("Clone task panicked")??;

    let chunks = chunker::chunk_documents(repo, &docs);
    if chunks.is_empty() {
        anyhow::bail!("No indexable content found in {repo}");
    }
    tracing::info!("Chunked {repo} into {} chunks", chunks.len());

    // Both stores persist across restarts while the registry does not, and a
    // failed attempt may have left a partial write. Clear the repository's
    // old records so this round replaces instead of appending duplicates.
    let bm25_clone = bm25.clone();
    let repo_key = repo.to_string();
    tokio::task::spawn_blocking(move || bm25_clone.delete_repo(&repo_key))
        .await
        .context("Delete task panicked")??;
    vectors
        .remove_repo(repo)
        .context("Failed to clear old embeddings")?;

    let bm25_clone = bm25.clone();
    let lexical_chunks = chunks.clone();
    tokio::task::spawn_blocking(move || bm25_clone.index_chunks(&lexical_chunks))
        .await
        .context("Index task panicked")??;

    let embedded = embed_chunks(client, config, &chunks).await?;
    vectors
        .add_entries(&embedded)
        .context("Failed to store embeddings")?;

    wait_for_visibility(bm25, repo, chunks.len(), config.index_wait_secs).await;

    tracing::info!(
        "Ingested {repo}: {} chunks, {} embedded, {:.1}s",
        chunks.len(),
        embedded.len(),
        started.elapsed().as_secs_f32()
    );
    Ok(())
}

/// Embed chunks in batches. A failed batch is retried chunk by chunk, and
/// individual failures are skipped with a warning; only a total wipeout
/// (nothing embedded at all) fails the pipeline.
async fn embed_chunks(
    client: &reqwest::Client,
    config: &Config,
    chunks: &[DocumentChunk],
) -> Result<Vec<(DocumentChunk, Vec<f32>)>> {
    let mut embedded = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

        match embeddings::embed_batch(client, &config.llm, &texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                embedded.extend(batch.iter().cloned().zip(vectors));
            }
            Ok(vectors) => {
                tracing::warn!(
                    "Embedding batch returned {} vectors for {} texts; retrying individually",
                    vectors.len(),
                    batch.len()
                );
                embed_one_by_one(client, config, batch, &mut embedded).await;
            }
            Err(e) => {
                tracing::warn!("Embedding batch failed ({e:#}); retrying individually");
                embed_one_by_one(client, config, batch, &mut embedded).await;
            }
        }
    }

    if embedded.is_empty() {
        anyhow::bail!("Embedding failed for every chunk");
    }
    Ok(embedded)
}

async fn embed_one_by_one(
    client: &reqwest::Client,
    config: &Config,
    batch: &[DocumentChunk],
    embedded: &mut Vec<(DocumentChunk, Vec<f32>)>,
) {
    for chunk in batch {
        match embeddings::embed_single(client, &config.llm, &chunk.content).await {
            Ok(vector) => embedded.push((chunk.clone(), vector)),
            Err(e) => tracing::warn!(
                "Skipping chunk {}#{}: {e:#}",
                chunk.file_path,
                chunk.chunk_index
            ),
        }
    }
}

/// Poll until the freshly indexed chunks are visible to searches, up to
/// `max_secs`. Timing out is logged but never fails the ingestion; retrieval
/// a moment later will see the documents.
async fn wait_for_visibility(bm25: &Bm25Index, repo: &str, expected: usize, max_secs: u64) {
    let deadline = Instant::now() + Duration::from_secs(max_secs);

    loop {
        match bm25.doc_count(repo) {
            Ok(n) if n >= expected => {
                tracing::debug!("{n} chunks visible for {repo}");
                return;
            }
            Ok(n) => {
                tracing::debug!("Waiting for visibility: {n}/{expected} chunks for {repo}");
            }
            Err(e) => {
                tracing::warn!("Visibility check for {repo} failed: {e:#}");
                return;
            }
        }

        if Instant::now() >= deadline {
            tracing::warn!(
                "Indexed chunks for {repo} not fully visible after {max_secs}s; continuing"
            );
            return;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
