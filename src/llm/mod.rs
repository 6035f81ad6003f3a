//! Thin clients for the external language-model collaborator: chat
//! completion (classification, synthesis) and dense embeddings.

pub mod chat;
pub mod embeddings;
