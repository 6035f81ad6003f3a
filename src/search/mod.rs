//! The two retrieval signals and their fusion.
//!
//! Every indexed record carries its `owner/name` repository key, and every
//! query can filter on it, so content from one repository never leaks into
//! another repository's answers.

pub mod bm25;
pub mod hybrid;
pub mod vector;
