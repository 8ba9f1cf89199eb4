//! Poll-to-completion path used when the server answers with a single JSON reply.

use super::client::AssistantsClient;
use crate::types::{MessageContent, MessageList, Run};
use anyhow::Result;
use std::time::Duration;

/// Shown when the assistant's final message carries no content parts.
pub const FALLBACK_REPLY: &str = "I am unable to provide a response at this time";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    /// The thread holds no assistant message.
    Missing,
    /// The latest assistant message has an empty content array.
    Empty,
    Text(String),
}

/// Re-reads the run every `interval` until it reaches a terminal status.
///
/// There is no deadline: a run parked in `requires_action` is polled until the
/// provider expires it or the caller drops the future.
pub async fn wait_for_terminal_run(
    client: &AssistantsClient,
    thread_id: &str,
    run_id: &str,
    interval: Duration,
) -> Result<Run> {
    let mut run = client.retrieve_run(thread_id, run_id).await?;
    while !run.status.is_terminal() {
        tracing::debug!(run_id, status = %run.status, "run still in flight");
        tokio::time::sleep(interval).await;
        run = client.retrieve_run(thread_id, run_id).await?;
    }
    Ok(run)
}

/// Picks the most recent assistant message from a newest-first listing.
pub fn latest_assistant_reply(messages: &MessageList) -> AssistantReply {
    let Some(message) = messages.data.iter().find(|m| m.role == "assistant") else {
        return AssistantReply::Missing;
    };

    if message.content.is_empty() {
        return AssistantReply::Empty;
    }

    let mut text = String::new();
    for part in &message.content {
        match part {
            MessageContent::Text { text: content } => text.push_str(&content.value),
            MessageContent::ImageFile { image_file } => {
                text.push_str(&format!("[Image: {}]", image_file.file_id));
            }
            MessageContent::Unsupported => {}
        }
    }
    AssistantReply::Text(text)
}
