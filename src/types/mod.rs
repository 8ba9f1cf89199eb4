pub mod api;
pub mod event;
pub mod proxy;

pub use api::{
    Annotation, Assistant, FileRef, FunctionCall, MessageContent, MessageList, RequiredAction,
    Run, RunError, RunStatus, TextContent, Thread, ThreadMessage, ToolCall, ToolOutput,
};
pub use event::StreamEvent;
pub use proxy::{
    AssistantCreated, PostMessageRequest, ReplyPayload, SubmitActionsRequest, SystemPrompt,
    ThreadCreated, RUN_COMPLETED_EVENT,
};
