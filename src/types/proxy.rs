use super::api::ToolOutput;
use serde::{Deserialize, Serialize};

/// Event name reported alongside a reply assembled by the polling path.
pub const RUN_COMPLETED_EVENT: &str = "thread.run.completed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCreated {
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantCreated {
    #[serde(rename = "assistantId")]
    pub assistant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    /// Overrides the server's default response mode for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitActionsRequest {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(rename = "toolCallOutputs")]
    pub tool_call_outputs: Vec<ToolOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub content: String,
    pub event: String,
}

impl ReplyPayload {
    pub fn completed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            event: RUN_COMPLETED_EVENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub prompt: String,
}
