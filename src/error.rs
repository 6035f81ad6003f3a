use thiserror::Error;

/// Failures of the routing pipeline that reach the process boundary.
///
/// Collaborator fetch failures (GitHub API, web search) never appear here:
/// they are degraded into formatted strings at the dispatcher boundary and
/// flow into synthesis, which explains them instead of fabricating data.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The reasoning call was unreachable or returned output that does not
    /// conform to the classification contract.
    #[error("classification failed: {0}")]
    Classification(#[source] anyhow::Error),

    /// The classifier returned a tag outside the closed action vocabulary.
    /// Always fatal to the request: an upstream contract violation, not a
    /// handleable input condition.
    #[error("classifier returned unknown action tag '{0}'")]
    UnknownAction(String),

    /// A structured or RAG action was selected but no repository was
    /// resolved. Recovered locally into a prompt for `owner/repo`.
    #[error("no repository identifier was resolved for this action")]
    MissingRepository,

    /// Some stage of the load/chunk/index pipeline failed. The repository
    /// is left out of the ingestion registry so a later request retries.
    #[error("repository ingestion failed: {0}")]
    Ingestion(#[source] anyhow::Error),

    /// Hybrid retrieval against the local indexes failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// The final synthesis call failed.
    #[error("answer synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),
}

impl RouterError {
    /// The designed user-facing message for this failure. This is the only
    /// text that may cross the process boundary; internal error detail goes
    /// to the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            RouterError::Classification(_) | RouterError::UnknownAction(_) => {
                "I'm sorry, I wasn't sure how to handle that request. \
                 Could you rephrase it?"
            }
            RouterError::MissingRepository => {
                "I need a repository name to answer that. \
                 Please specify one in 'owner/repo' format."
            }
            RouterError::Ingestion(_) => {
                "I couldn't fetch and index that repository just now. \
                 Please try again in a moment."
            }
            RouterError::Retrieval(_) | RouterError::Synthesis(_) => {
                "Something went wrong while putting your answer together. \
                 Please try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_never_leak_internals() {
        let err = RouterError::Ingestion(anyhow::anyhow!("connection refused at 10.0.0.3:6333"));
        assert!(!err.user_message().contains("10.0.0.3"));
        let err = RouterError::UnknownAction("DROP_TABLES".to_string());
        assert!(!err.user_message().contains("DROP_TABLES"));
    }

    #[test]
    fn test_missing_repository_asks_for_slug() {
        assert!(RouterError::MissingRepository
            .user_message()
            .contains("owner/repo"));
    }
}
