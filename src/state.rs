use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::rag::ingest::IngestRegistry;
use crate::search::bm25::Bm25Index;
use crate::search::vector::VectorStore;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub bm25: Arc<Bm25Index>,
    pub vectors: Arc<VectorStore>,
    pub registry: Arc<IngestRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        std::fs::create_dir_all(config.repos_dir())
            .context("Failed to create repos directory")?;

        let bm25 = Bm25Index::open_or_create(&config.index_dir())?;
        let vectors = VectorStore::open_or_create(&config.vector_dir())?;

        // One client for all outbound traffic: LLM, GitHub, search. The long
        // request timeout covers slow local model inference.
        let http = reqwest::Client::builder()
            .user_agent("gh-assistant")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config: Arc::new(config),
            http,
            bm25: Arc::new(bm25),
            vectors: Arc::new(vectors),
            registry: Arc::new(IngestRegistry::new()),
        })
    }
}
