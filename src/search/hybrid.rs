use std::collections::HashMap;

use crate::models::RetrievedChunk;
use crate::search::bm25::Bm25Hit;
use crate::search::vector::VectorHit;

/// Reciprocal-rank fusion of the lexical and dense result lists.
///
/// Each list contributes `1 / (k + rank + 1)` per item, so a chunk that
/// appears in both lists accumulates both contributions and consistently
/// outranks chunks present in only one. Raw per-signal scores are kept for
/// observability but ordering comes from the fused score alone.
pub fn rrf_fuse(bm25_hits: &[Bm25Hit], vector_hits: &[VectorHit], limit: usize) -> Vec<RetrievedChunk> {
    let k = 60.0f32; // RRF constant

    // Key: (repo, file_path, chunk_index)
    type Key = (String, String, usize);
    let mut score_map: HashMap<Key, RetrievedChunk> = HashMap::new();

    for (rank, hit) in bm25_hits.iter().enumerate() {
        let key: Key = (hit.repo.clone(), hit.file_path.clone(), hit.chunk_index);
        let rrf_score = 1.0 / (k + rank as f32 + 1.0);

        let entry = score_map.entry(key).or_insert_with(|| RetrievedChunk {
            repo: hit.repo.clone(),
            file_path: hit.file_path.clone(),
            chunk_index: hit.chunk_index,
            content: hit.content.clone(),
            bm25_score: 0.0,
            vector_score: 0.0,
            combined_score: 0.0,
        });

        entry.bm25_score = entry.bm25_score.max(hit.score);
        entry.combined_score += rrf_score;
    }

    for (rank, hit) in vector_hits.iter().enumerate() {
        let key: Key = (hit.repo.clone(), hit.file_path.clone(), hit.chunk_index);
        let rrf_score = 1.0 / (k + rank as f32 + 1.0);

        let entry = score_map.entry(key).or_insert_with(|| RetrievedChunk {
            repo: hit.repo.clone(),
            file_path: hit.file_path.clone(),
            chunk_index: hit.chunk_index,
            content: hit.content.clone(),
            bm25_score: 0.0,
            vector_score: 0.0,
            combined_score: 0.0,
        });

        entry.vector_score = entry.vector_score.max(hit.score);
        entry.combined_score += rrf_score;
    }

    let mut results: Vec<RetrievedChunk> = score_map.into_values().collect();
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
