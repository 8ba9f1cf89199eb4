use crate::api::polling::{latest_assistant_reply, wait_for_terminal_run, AssistantReply, FALLBACK_REPLY};
use crate::api::ByteStream;
use crate::error::{WebError, WebResult};
use crate::server::AppState;
use crate::types::{PostMessageRequest, ReplyPayload, SubmitActionsRequest, ThreadCreated};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

pub fn thread_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assistants/threads", post(create_thread))
        .route(
            "/api/assistants/threads/{thread_id}/messages",
            post(post_message),
        )
        .route(
            "/api/assistants/threads/{thread_id}/actions",
            post(submit_actions),
        )
}

async fn create_thread(State(state): State<AppState>) -> WebResult<Json<ThreadCreated>> {
    let thread = state.client.create_thread().await?;
    tracing::info!(thread_id = %thread.id, "thread created");
    Ok(Json(ThreadCreated {
        thread_id: thread.id,
    }))
}

async fn post_message(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> WebResult<Response> {
    let Json(req) = body?;
    if req.content.trim().is_empty() {
        return Err(WebError::BadRequest("content must not be empty".to_string()));
    }
    let assistant_id = state
        .config
        .assistant_id
        .as_deref()
        .ok_or_else(|| WebError::Config("ASSISTANT_ID is not set".to_string()))?;

    state.client.create_message(&thread_id, &req.content).await?;

    if req.stream.unwrap_or(state.config.stream_responses) {
        let stream = state
            .client
            .create_run_stream(&thread_id, assistant_id)
            .await?;
        return Ok(relay(stream));
    }

    let run = state.client.create_run(&thread_id, assistant_id).await?;
    let run = wait_for_terminal_run(
        &state.client,
        &thread_id,
        &run.id,
        state.config.poll_interval,
    )
    .await?;
    if run.status.is_failure() {
        return Err(WebError::RunFailed(run.status));
    }

    let messages = state.client.list_messages(&thread_id).await?;
    let response = match latest_assistant_reply(&messages) {
        AssistantReply::Missing => StatusCode::NO_CONTENT.into_response(),
        AssistantReply::Empty => {
            tracing::warn!(%thread_id, run_id = %run.id, "assistant reply has no content");
            Json(ReplyPayload::completed(FALLBACK_REPLY)).into_response()
        }
        AssistantReply::Text(text) => Json(ReplyPayload::completed(text)).into_response(),
    };
    Ok(response)
}

async fn submit_actions(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    body: Result<Json<SubmitActionsRequest>, JsonRejection>,
) -> WebResult<Response> {
    let Json(req) = body?;
    let stream = state
        .client
        .submit_tool_outputs_stream(&thread_id, &req.run_id, &req.tool_call_outputs)
        .await?;
    Ok(relay(stream))
}

/// Passes the provider's event stream through byte for byte.
fn relay(stream: ByteStream) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
