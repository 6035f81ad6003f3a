//! A GitHub assistant that routes natural-language queries to the right
//! backend: structured GitHub REST lookups for repository metadata, web
//! search for general questions, and retrieval-augmented answering over a
//! repository's own source for code questions.
//!
//! Every query flows through three stages:
//!
//! 1. [`agent::classifier`] asks the configured LLM to map the query onto a
//!    closed action vocabulary plus an optional `owner/repo`.
//! 2. [`agent::router`] dispatches to the matching tool: a GitHub REST
//!    fetcher, the SearxNG search backend, or the RAG pipeline (clone,
//!    chunk, index, hybrid retrieve).
//! 3. [`agent::synthesize`] turns the raw tool output into the final
//!    conversational answer.
//!
//! Repositories are ingested at most once per process; retrieval fuses a
//! tantivy BM25 index with an in-memory vector store via reciprocal-rank
//! fusion, always scoped to the repository in question.

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod search;
pub mod state;
pub mod tools;
