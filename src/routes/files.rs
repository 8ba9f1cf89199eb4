use crate::error::WebResult;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

pub fn file_routes() -> Router<AppState> {
    Router::new().route("/api/files/{file_id}", get(get_file))
}

/// Serves the bytes behind an annotation link.
async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> WebResult<Response> {
    let (content_type, bytes) = state.client.file_content(&file_id).await?;
    let content_type =
        content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
