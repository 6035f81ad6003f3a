//! Retrieval-augmented QA over repository source: clone and walk the repo,
//! split it into overlapping chunks, index both retrieval signals, and pull
//! top-k context for a question.

pub mod chunker;
pub mod ingest;
pub mod loader;
pub mod retrieve;
