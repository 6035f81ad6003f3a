use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};

use crate::models::DocumentChunk;

/// Sparse/lexical signal: a BM25 index over chunk content built on tantivy.
pub struct Bm25Index {
    index: Index,
    f_repo: Field,
    f_file_path: Field,
    f_chunk_index: Field,
    f_content: Field,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub repo: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
}

impl Bm25Index {
    /// Create or open a BM25 index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_repo = schema_builder.add_text_field("repo", STRING | STORED);
        let f_file_path = schema_builder.add_text_field("file_path", TEXT | STORED);
        let f_chunk_index = schema_builder.add_u64_field("chunk_index", STORED);
        let f_content = schema_builder.add_text_field("content", TEXT | STORED);

        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            f_repo,
            f_file_path,
            f_chunk_index,
            f_content,
        })
    }

    /// Index a batch of document chunks. Each chunk carries its own
    /// repository key so the batch may span repositories.
    pub fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        for chunk in chunks {
            writer.add_document(doc!(
                self.f_repo => chunk.repo.clone(),
                self.f_file_path => chunk.file_path.clone(),
                self.f_chunk_index => chunk.chunk_index as u64,
                self.f_content => chunk.content.clone(),
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    /// Delete all indexed chunks for a repository. Ingestion calls this
    /// before re-indexing so a retried or repeated ingestion replaces the
    /// repository's records instead of appending duplicates.
    pub fn delete_repo(&self, repo: &str) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        let term = tantivy::Term::from_field_text(self.f_repo, repo);
        writer.delete_term(term);
        writer.commit().context("Failed to commit delete")?;
        Ok(())
    }

    /// Number of documents currently visible for a repository. Used for the
    /// bounded post-write visibility poll.
    pub fn doc_count(&self, repo: &str) -> Result<usize> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;
        let searcher = reader.searcher();

        let term = tantivy::Term::from_field_text(self.f_repo, repo);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        searcher.search(&query, &Count).context("Count failed")
    }

    /// Search the index and return scored hits, optionally filtered to one
    /// repository.
    pub fn search(&self, query_str: &str, limit: usize, repo: Option<&str>) -> Result<Vec<Bm25Hit>> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        // Lenient parsing: free-text questions contain characters that are
        // query syntax to tantivy ("?", ":", ...).
        let query_parser = QueryParser::for_index(&self.index, vec![self.f_content, self.f_file_path]);
        let (parsed, _errors) = query_parser.parse_query_lenient(query_str);

        // Scope the query itself to the repository so the top-docs window is
        // filled with in-repo candidates; with many repositories indexed, a
        // post-filter alone can starve a scoped search below `limit`.
        let query: Box<dyn Query> = match repo {
            Some(wanted) => {
                let term = tantivy::Term::from_field_text(self.f_repo, wanted);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, parsed),
                    (
                        Occur::Must,
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn Query>,
                    ),
                ]))
            }
            None => parsed,
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit * 2))
            .context("Search failed")?;

        let mut hits = Vec::new();

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let doc_repo = doc
                .get_first(self.f_repo)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            if let Some(wanted) = repo {
                if doc_repo != wanted {
                    continue;
                }
            }

            let file_path = doc
                .get_first(self.f_file_path)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let chunk_index = doc
                .get_first(self.f_chunk_index)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;

            let content = doc
                .get_first(self.f_content)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            hits.push(Bm25Hit {
                repo: doc_repo,
                file_path,
                chunk_index,
                content,
                score,
            });

            if hits.len() >= limit {
                break;
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(repo: &str, path: &str, idx: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            repo: repo.to_string(),
            file_path: path.to_string(),
            chunk_index: idx,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_index_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("a/b", "src/auth.rs", 0, "fn verify_token(token: &str) -> bool"),
                chunk("a/b", "src/db.rs", 0, "pub async fn connect(url: &str)"),
            ])
            .unwrap();

        let hits = index.search("verify_token", 10, None).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].file_path, "src/auth.rs");
    }

    #[test]
    fn test_repo_filter_excludes_other_repos() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("a/b", "main.rs", 0, "user session handling"),
                chunk("c/d", "app.py", 0, "user session handling"),
            ])
            .unwrap();

        let hits = index.search("session", 10, Some("c/d")).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.repo == "c/d"));
    }

    #[test]
    fn test_doc_count_per_repo() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("a/b", "x.rs", 0, "alpha"),
                chunk("a/b", "x.rs", 1, "beta"),
                chunk("c/d", "y.rs", 0, "gamma"),
            ])
            .unwrap();

        assert_eq!(index.doc_count("a/b").unwrap(), 2);
        assert_eq!(index.doc_count("c/d").unwrap(), 1);
        assert_eq!(index.doc_count("e/f").unwrap(), 0);
    }

    #[test]
    fn test_delete_repo_removes_only_that_repo() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("a/b", "x.rs", 0, "alpha"),
                chunk("a/b", "x.rs", 1, "beta"),
                chunk("c/d", "y.rs", 0, "gamma"),
            ])
            .unwrap();

        index.delete_repo("a/b").unwrap();
        assert_eq!(index.doc_count("a/b").unwrap(), 0);
        assert_eq!(index.doc_count("c/d").unwrap(), 1);
    }

    #[test]
    fn test_reindex_after_delete_does_not_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        let chunks = [chunk("a/b", "x.rs", 0, "session token handling")];

        // Two ingestion rounds for the same repo, as a retry or a process
        // restart produces: each one clears the old records first.
        for _ in 0..2 {
            index.delete_repo("a/b").unwrap();
            index.index_chunks(&chunks).unwrap();
        }

        assert_eq!(index.doc_count("a/b").unwrap(), 1);
    }

    #[test]
    fn test_scoped_search_is_not_starved_by_other_repos() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();

        // A large repo dominating the global ranking must not crowd a scoped
        // search below its limit.
        let mut chunks: Vec<DocumentChunk> = (0..30)
            .map(|i| chunk("big/repo", "noise.rs", i, "token parsing routine"))
            .collect();
        for i in 0..5 {
            chunks.push(chunk("small/repo", "auth.rs", i, "token parsing routine"));
        }
        index.index_chunks(&chunks).unwrap();

        let hits = index.search("token parsing", 5, Some("small/repo")).unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.repo == "small/repo"));
    }

    #[test]
    fn test_question_syntax_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index
            .index_chunks(&[chunk("a/b", "auth.rs", 0, "token verification middleware")])
            .unwrap();

        // Raw user questions must never error out of the lexical search.
        let hits = index
            .search("how does token verification work?", 10, None)
            .unwrap();
        assert!(!hits.is_empty());
    }
}
