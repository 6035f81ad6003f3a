use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::DocumentChunk;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    repo: String,
    file_path: String,
    chunk_index: usize,
    content: String,
    embedding: Vec<f32>,
}

/// Dense signal: in-memory vector store with disk persistence and cosine
/// similarity search.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: std::path::PathBuf,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub repo: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data =
                std::fs::read_to_string(&persist_path).context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Add embedded chunks. Each pair is one chunk and its dense embedding.
    pub fn add_entries(&self, embedded: &[(DocumentChunk, Vec<f32>)]) -> Result<()> {
        let mut entries = self.entries.write();

        for (chunk, embedding) in embedded {
            entries.push(VectorEntry {
                repo: chunk.repo.clone(),
                file_path: chunk.file_path.clone(),
                chunk_index: chunk.chunk_index,
                content: chunk.content.clone(),
                embedding: embedding.clone(),
            });
        }

        // Persist to disk
        let data = serde_json::to_string(&*entries)?;
        std::fs::write(&self.persist_path, data)?;

        Ok(())
    }

    /// Drop all entries for a repository and persist the change. Ingestion
    /// calls this before re-adding so retries replace instead of append.
    pub fn remove_repo(&self, repo: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.repo != repo);

        let data = serde_json::to_string(&*entries)?;
        std::fs::write(&self.persist_path, data)?;

        Ok(())
    }

    /// Search by cosine similarity against a query embedding, optionally
    /// filtered to one repository.
    pub fn search(&self, query_embedding: &[f32], limit: usize, repo: Option<&str>) -> Vec<VectorHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .filter(|e| match repo {
                Some(r) => e.repo == r,
                None => true,
            })
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                repo: e.repo.clone(),
                file_path: e.file_path.clone(),
                chunk_index: e.chunk_index,
                content: e.content.clone(),
                score,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(repo: &str, path: &str, embedding: Vec<f32>) -> (DocumentChunk, Vec<f32>) {
        (
            DocumentChunk {
                repo: repo.to_string(),
                file_path: path.to_string(),
                chunk_index: 0,
                content: format!("content of {path}"),
            },
            embedding,
        )
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_entries(&[
                pair("a/b", "db.rs", vec![0.9, 0.1, 0.0]),
                pair("a/b", "http.rs", vec![0.1, 0.9, 0.0]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 10, None);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].file_path, "db.rs");
    }

    #[test]
    fn test_repo_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_entries(&[
                pair("a/b", "x.rs", vec![1.0, 0.0]),
                pair("c/d", "y.rs", vec![1.0, 0.0]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, Some("a/b"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].repo, "a/b");
    }

    #[test]
    fn test_remove_repo_drops_entries_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open_or_create(dir.path()).unwrap();
            store
                .add_entries(&[
                    pair("a/b", "x.rs", vec![1.0, 0.0]),
                    pair("c/d", "y.rs", vec![0.0, 1.0]),
                ])
                .unwrap();
            store.remove_repo("a/b").unwrap();
            assert_eq!(store.entry_count(), 1);
        }

        // The removal survives a reopen.
        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.entry_count(), 1);
        let hits = reopened.search(&[1.0, 1.0], 10, None);
        assert!(hits.iter().all(|h| h.repo == "c/d"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open_or_create(dir.path()).unwrap();
            store.add_entries(&[pair("a/b", "x.rs", vec![0.5, 0.5])]).unwrap();
        }
        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.entry_count(), 1);
    }
}
