//! Hybrid retrieval: run the lexical and dense signals for a question and
//! fuse their rankings into the top-k context chunks.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::llm::embeddings;
use crate::models::RetrievedChunk;
use crate::search::bm25::Bm25Index;
use crate::search::hybrid::rrf_fuse;
use crate::search::vector::{VectorHit, VectorStore};

/// Candidates fetched per signal before fusion. Wider than the final k so
/// fusion has overlap to work with.
const CANDIDATES_PER_SIGNAL: usize = 10;

/// Retrieve the top-k chunks for `question`, optionally scoped to one
/// repository.
///
/// The dense signal degrades gracefully: if the query embedding cannot be
/// produced, retrieval proceeds on the lexical signal alone with a warning.
pub async fn retrieve(
    config: &Config,
    client: &reqwest::Client,
    bm25: &Arc<Bm25Index>,
    vectors: &Arc<VectorStore>,
    question: &str,
    repo: Option<&str>,
) -> Result<Vec<RetrievedChunk>> {
    let bm25_clone = bm25.clone();
    let query = question.to_string();
    let repo_owned = repo.map(str::to_string);

    let bm25_hits = tokio::task::spawn_blocking(move || {
        bm25_clone.search(&query, CANDIDATES_PER_SIGNAL, repo_owned.as_deref())
    })
    .await
    .context("Lexical search task panicked")?
    .context("Lexical search failed")?;

    let vector_hits: Vec<VectorHit> =
        match embeddings::embed_single(client, &config.llm, question).await {
            Ok(embedding) => vectors.search(&embedding, CANDIDATES_PER_SIGNAL, repo),
            Err(e) => {
                tracing::warn!("Query embedding failed, lexical-only retrieval: {e:#}");
                Vec::new()
            }
        };

    let fused = rrf_fuse(&bm25_hits, &vector_hits, config.retrieval_k);
    tracing::debug!(
        "Retrieved {} chunks ({} lexical, {} dense candidates)",
        fused.len(),
        bm25_hits.len(),
        vector_hits.len()
    );
    Ok(fused)
}

/// Render retrieved chunks as the context block for answer synthesis. Each
/// chunk is labeled with its source file so the answer can cite it.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&format!("--- {} ---\n{}\n\n", chunk.file_path, chunk.content));
    }
    out
}
