use crate::api::AssistantsClient;
use crate::config::Config;
use crate::error::{WebError, WebResult};
use crate::routes::{
    assistant_routes, file_routes, health_routes, system_prompt_routes, thread_routes,
};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub client: AssistantsClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = AssistantsClient::new(&config)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(assistant_routes())
        .merge(thread_routes())
        .merge(file_routes())
        .merge(system_prompt_routes())
        .with_state(state)
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(config: Config) -> WebResult<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| WebError::Config(format!("Invalid address: {e}")))?;
    let streaming = config.stream_responses;
    let state = AppState::new(config)?;
    let app = build_router(state);

    tracing::info!(%addr, streaming, "starting threadchat server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
