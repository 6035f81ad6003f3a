use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A structured GitHub metadata lookup. Each variant maps to exactly one
/// REST fetcher in [`crate::tools::github`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GithubAction {
    PrCount,
    Stats,
    Contributors,
    Commits,
    Issues,
    Languages,
    Releases,
    Overview,
}

/// The closed action taxonomy shared between classifier and router.
///
/// Tags are matched exactly and case-sensitively. A tag outside this set is
/// a classifier contract violation, never a valid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Github(GithubAction),
    Search,
    Rag,
}

impl Action {
    /// Parse an exact action tag. Returns `None` for anything outside the
    /// closed vocabulary (including case mismatches).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "GITHUB_PR_COUNT" => Some(Action::Github(GithubAction::PrCount)),
            "GITHUB_STATS" => Some(Action::Github(GithubAction::Stats)),
            "GITHUB_CONTRIBUTORS" => Some(Action::Github(GithubAction::Contributors)),
            "GITHUB_COMMITS" => Some(Action::Github(GithubAction::Commits)),
            "GITHUB_ISSUES" => Some(Action::Github(GithubAction::Issues)),
            "GITHUB_LANGUAGES" => Some(Action::Github(GithubAction::Languages)),
            "GITHUB_RELEASES" => Some(Action::Github(GithubAction::Releases)),
            "GITHUB_OVERVIEW" => Some(Action::Github(GithubAction::Overview)),
            "SEARCH" => Some(Action::Search),
            "RAG" => Some(Action::Rag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Github(GithubAction::PrCount) => "GITHUB_PR_COUNT",
            Action::Github(GithubAction::Stats) => "GITHUB_STATS",
            Action::Github(GithubAction::Contributors) => "GITHUB_CONTRIBUTORS",
            Action::Github(GithubAction::Commits) => "GITHUB_COMMITS",
            Action::Github(GithubAction::Issues) => "GITHUB_ISSUES",
            Action::Github(GithubAction::Languages) => "GITHUB_LANGUAGES",
            Action::Github(GithubAction::Releases) => "GITHUB_RELEASES",
            Action::Github(GithubAction::Overview) => "GITHUB_OVERVIEW",
            Action::Search => "SEARCH",
            Action::Rag => "RAG",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Action::parse(&tag).ok_or_else(|| D::Error::custom(format!("unknown action tag '{tag}'")))
    }
}

/// Output of the intent classifier.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub action: Action,
    /// `owner/name` when the query references a specific repository.
    pub repo: Option<String>,
    /// Free-text justification. Logged for observability, never used for
    /// control flow.
    pub reason: String,
}

/// A bounded span of repository source plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// `owner/name` key of the originating repository.
    pub repo: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
}

/// A retrieved chunk with per-signal and fused scores.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub repo: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub content: String,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

/// One web-search hit from the search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Chat request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// Chat response body
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
}
