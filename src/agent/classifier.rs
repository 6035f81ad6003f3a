//! LLM intent classification against the closed action vocabulary.

use serde::Deserialize;

use crate::config::LlmConfig;
use crate::error::RouterError;
use crate::llm::chat::{self, ChatMessage};
use crate::models::{Action, ClassificationResult};

const CLASSIFIER_PROMPT: &str = r#"You are a routing classifier for a GitHub assistant.
Your output determines which internal tool is called.

Return STRICT JSON with exactly these fields:
{"action": "<TAG>", "repo": "<owner/repo or null>", "reason": "<why>"}

## CLASSIFICATION RULES

### GITHUB_PR_COUNT
Pull request counts or open/closed PR statistics.
Examples: "How many open PRs are in vercel/next.js?", "PR count for facebook/react"

### GITHUB_STATS
Stars, forks, watchers, general repository statistics or description.
Examples: "How many stars does tensorflow/tensorflow have?", "What are the stats for microsoft/vscode?"

### GITHUB_CONTRIBUTORS
Top contributors, who contributes to a repo, contribution statistics.
Examples: "Who are the top contributors to kubernetes/kubernetes?"

### GITHUB_COMMITS
Recent commits, commit history, latest changes.
Examples: "What are the recent commits in rust-lang/rust?"

### GITHUB_ISSUES
Issue counts (open/closed), issue statistics, bug reports.
Examples: "How many issues are open in pytorch/pytorch?"

### GITHUB_LANGUAGES
Programming languages used, language breakdown, tech stack.
Examples: "What languages are used in golang/go?"

### GITHUB_RELEASES
Latest release, release versions, download counts.
Examples: "What is the latest release of electron/electron?"

### GITHUB_OVERVIEW
General overview of a repository, project summary, several metrics at once.
Examples: "Tell me about vercel/next.js", "What is the golang/go repository?"

### SEARCH
Only when the query is a general internet question, not about a specific
repository's data or code.
Examples: "Latest news about GitHub Actions", "Search tutorials on PR workflow"

### RAG
Questions about code content, file structure, or how something works inside
a repository.
Examples: "How does authentication work in vercel/next.js?", "Explain the folder structure of facebook/react"

## TIE-BREAKING
- Repository metadata (counts, stars, releases) -> the matching GITHUB_* tag.
- Understanding a repository's code or internals -> RAG.
- Anything not tied to a repository -> SEARCH.

## OUTPUT FIELDS
- action: exactly one of the tags above, uppercase, nothing else.
- repo: repository in 'owner/repo' format, or null when none is mentioned.
- reason: one sentence explaining the choice."#;

#[derive(Deserialize)]
struct RawClassification {
    action: String,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    reason: String,
}

/// Classify a user query into an action and optional repository.
pub async fn classify(
    client: &reqwest::Client,
    config: &LlmConfig,
    query: &str,
) -> Result<ClassificationResult, RouterError> {
    let messages = vec![
        ChatMessage::system(CLASSIFIER_PROMPT),
        ChatMessage::user(format!("User query: {query}")),
    ];

    let content = chat::complete(client, config, messages)
        .await
        .map_err(RouterError::Classification)?;

    parse_classification(&content)
}

/// Parse the model's reply into a [`ClassificationResult`].
///
/// Models wrap JSON in prose or code fences, so everything outside the
/// outermost braces is stripped before parsing. A tag outside the closed
/// vocabulary is rejected; an empty or whitespace repo normalizes to `None`.
fn parse_classification(content: &str) -> Result<ClassificationResult, RouterError> {
    let json = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => {
            return Err(RouterError::Classification(anyhow::anyhow!(
                "no JSON object in classifier output: {content:?}"
            )))
        }
    };

    let raw: RawClassification = serde_json::from_str(json).map_err(|e| {
        RouterError::Classification(
            anyhow::Error::new(e).context("malformed classification JSON"),
        )
    })?;

    let action =
        Action::parse(&raw.action).ok_or_else(|| RouterError::UnknownAction(raw.action.clone()))?;

    let repo = raw
        .repo
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(ClassificationResult {
        action,
        repo,
        reason: raw.reason,
    })
}
