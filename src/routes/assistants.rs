use crate::error::WebResult;
use crate::server::AppState;
use crate::types::AssistantCreated;
use axum::{extract::State, routing::post, Json, Router};

pub fn assistant_routes() -> Router<AppState> {
    Router::new().route("/api/assistants", post(create_assistant))
}

/// Creates an assistant from the configured template. The returned id is
/// what `ASSISTANT_ID` should be set to.
async fn create_assistant(State(state): State<AppState>) -> WebResult<Json<AssistantCreated>> {
    let assistant = state
        .client
        .create_assistant(&state.config.assistant)
        .await?;
    tracing::info!(assistant_id = %assistant.id, "assistant created");
    Ok(Json(AssistantCreated {
        assistant_id: assistant.id,
    }))
}
