//! Final answer synthesis: turn raw tool output into a conversational reply.

use crate::config::LlmConfig;
use crate::error::RouterError;
use crate::llm::chat::{self, ChatMessage};

const SYNTHESIZER_PROMPT: &str = "You are a helpful GitHub assistant. \
Synthesize the gathered information into a friendly, clear, and concise \
answer for the user. Answer only from the gathered information; if it \
indicates an error or contains nothing relevant, apologize and explain \
instead of inventing an answer.";

/// Produce the final answer from the user's query and the dispatched tool's
/// output. Tool outputs that describe failures flow through here too, so the
/// assistant explains them instead of surfacing raw errors.
pub async fn synthesize(
    client: &reqwest::Client,
    config: &LlmConfig,
    query: &str,
    tool_output: &str,
) -> Result<String, RouterError> {
    let user = format!(
        "The user asked: \"{query}\"\n\n\
         Information gathered from tools:\n{tool_output}"
    );

    let messages = vec![ChatMessage::system(SYNTHESIZER_PROMPT), ChatMessage::user(user)];

    let answer = chat::complete(client, config, messages)
        .await
        .map_err(RouterError::Synthesis)?;

    Ok(answer.trim().to_string())
}
