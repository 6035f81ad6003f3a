//! Dispatch a classified query to the matching tool and assemble the final
//! answer.

use crate::agent::{classifier, synthesize};
use crate::error::RouterError;
use crate::models::{Action, ClassificationResult};
use crate::rag::{ingest, retrieve};
use crate::state::AppState;
use crate::tools;

/// Answer one user query: classify, dispatch, synthesize.
///
/// A missing repository for a repo-scoped action is recovered here with a
/// fixed prompt for an `owner/repo` slug; everything else propagates as a
/// [`RouterError`].
pub async fn answer(state: &AppState, query: &str) -> Result<String, RouterError> {
    let decision = classifier::classify(&state.http, &state.config.llm, query).await?;
    tracing::info!(
        action = %decision.action,
        repo = decision.repo.as_deref().unwrap_or("-"),
        "Routing: {}",
        decision.reason
    );

    let tool_output = match dispatch(state, query, &decision).await {
        Ok(output) => output,
        Err(RouterError::MissingRepository) => {
            return Ok(RouterError::MissingRepository.user_message().to_string());
        }
        Err(e) => return Err(e),
    };

    synthesize::synthesize(&state.http, &state.config.llm, query, &tool_output).await
}

/// Run the tool selected by the classifier and return its raw output.
///
/// The match on [`Action`] is exhaustive: adding a variant will not compile
/// until it is handled here.
pub async fn dispatch(
    state: &AppState,
    query: &str,
    decision: &ClassificationResult,
) -> Result<String, RouterError> {
    match decision.action {
        Action::Github(action) => match decision.repo.as_deref() {
            Some(repo) => {
                Ok(tools::github::fetch(&state.http, &state.config.github, action, repo).await)
            }
            None => Err(RouterError::MissingRepository),
        },

        // The user's query goes to the search backend verbatim.
        Action::Search => {
            Ok(tools::search::web_search(&state.http, &state.config.search, query).await)
        }

        Action::Rag => {
            let repo = decision.repo.as_deref();

            // Ingest on first sight; later queries for the same repo reuse
            // the indexes. Without a repo we skip ingestion and retrieve
            // across everything indexed so far.
            if let Some(repo) = repo {
                ingest::ensure_ingested(
                    &state.config,
                    &state.http,
                    &state.bm25,
                    &state.vectors,
                    &state.registry,
                    repo,
                )
                .await?;
            }

            let chunks = retrieve::retrieve(
                &state.config,
                &state.http,
                &state.bm25,
                &state.vectors,
                query,
                repo,
            )
            .await
            .map_err(RouterError::Retrieval)?;

            if chunks.is_empty() {
                return Ok("No matching content was found in the indexed repositories.".to_string());
            }
            Ok(retrieve::format_context(&chunks))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::GithubAction;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        // Unroutable endpoints so no test ever leaves the machine.
        config.llm.base_url = "http://127.0.0.1:1".to_string();
        config.search.searxng_url = "http://127.0.0.1:1".to_string();
        let state = AppState::new(config).unwrap();
        // Keep the tempdir alive for the test's duration.
        std::mem::forget(dir);
        state
    }

    fn decision(action: Action, repo: Option<&str>) -> ClassificationResult {
        ClassificationResult {
            action,
            repo: repo.map(str::to_string),
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_github_action_without_repo_is_missing_repository() {
        let state = test_state();
        let result = dispatch(
            &state,
            "how many PRs?",
            &decision(Action::Github(GithubAction::PrCount), None),
        )
        .await;
        assert!(matches!(result, Err(RouterError::MissingRepository)));
    }

    #[tokio::test]
    async fn test_rag_without_repo_skips_ingestion_and_degrades() {
        let state = test_state();
        // Nothing indexed and the embedder unreachable: retrieval degrades
        // to lexical-only and reports no content instead of erroring.
        let output = dispatch(&state, "how does auth work?", &decision(Action::Rag, None))
            .await
            .unwrap();
        assert!(output.contains("No matching content"));
    }

    #[tokio::test]
    async fn test_rag_with_unreachable_repo_fails_as_ingestion() {
        let state = test_state();
        // The clone target does not exist, so ingestion must fail and the
        // repo must stay retryable.
        let result = dispatch(
            &state,
            "explain the code",
            &decision(Action::Rag, Some("no-such-owner/no-such-repo-xyz")),
        )
        .await;
        assert!(matches!(result, Err(RouterError::Ingestion(_))));
        assert!(!state.registry.is_ingested("no-such-owner/no-such-repo-xyz"));
    }
}
