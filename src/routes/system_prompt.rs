use crate::error::{WebError, WebResult};
use crate::server::AppState;
use crate::types::SystemPrompt;
use axum::{extract::State, routing::get, Json, Router};

pub fn system_prompt_routes() -> Router<AppState> {
    Router::new().route("/api/system-prompt", get(get_system_prompt))
}

async fn get_system_prompt(State(state): State<AppState>) -> WebResult<Json<SystemPrompt>> {
    let prompt = state
        .config
        .read_system_prompt()
        .await
        .map_err(WebError::SystemPrompt)?;
    Ok(Json(SystemPrompt { prompt }))
}
