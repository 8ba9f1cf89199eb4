use super::api::{Annotation, ToolCall};

/// One step of a run as seen by the transcript reducer.
///
/// Produced by [`crate::api::stream::StreamParser`] from the provider's
/// server-sent events. Kinds the reducer has no use for arrive as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextCreated,
    TextDelta {
        value: Option<String>,
        annotations: Vec<Annotation>,
    },
    /// A code interpreter call started; its input streams as `CodeDelta`.
    CodeCreated,
    CodeDelta {
        input: String,
    },
    ToolCallRequired {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    RunCompleted,
    Error {
        message: String,
    },
    End,
    Unknown,
}

impl StreamEvent {
    pub fn text_delta(value: impl Into<String>) -> Self {
        Self::TextDelta {
            value: Some(value.into()),
            annotations: Vec::new(),
        }
    }
}
