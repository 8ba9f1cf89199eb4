use super::state::RunFailure;
use crate::tools::ToolRegistry;
use crate::types::{ToolCall, ToolOutput};
use futures::future::try_join_all;
use std::time::Duration;

/// Runs every call concurrently and pairs each result with its call id, in
/// call order. The first failure or timeout aborts the whole batch.
pub(super) async fn run_tool_calls(
    registry: &ToolRegistry,
    tool_calls: &[ToolCall],
    tool_timeout: Duration,
) -> Result<Vec<ToolOutput>, RunFailure> {
    let pending = tool_calls.iter().map(|call| async move {
        let tool_name = call.function.name.as_str();
        tracing::debug!(tool_call_id = %call.id, tool_name, "running tool call");
        match tokio::time::timeout(tool_timeout, registry.invoke(call)).await {
            Ok(Ok(output)) => Ok(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            }),
            Ok(Err(error)) => Err(RunFailure::Tool(format!("{tool_name}: {error:#}"))),
            Err(_) => Err(RunFailure::Tool(format!(
                "{tool_name} timed out after {}s",
                tool_timeout.as_secs()
            ))),
        }
    });

    try_join_all(pending).await
}
