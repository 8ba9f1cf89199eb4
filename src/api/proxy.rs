//! Client side of the proxy routes, as a browser would call them.

use super::client::ByteStream;
use crate::types::{
    PostMessageRequest, ReplyPayload, SubmitActionsRequest, ThreadCreated, ToolOutput,
};
use crate::util::join_url;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;

/// Transport a [`crate::state::ChatSession`] drives a conversation through.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_thread(&self) -> Result<String>;

    /// Posts a user message and returns the run's event stream.
    async fn stream_message(&self, thread_id: &str, content: &str) -> Result<ByteStream>;

    /// Posts a user message and waits for the assembled reply.
    /// `None` means the run finished without an assistant message.
    async fn post_message(&self, thread_id: &str, content: &str) -> Result<Option<ReplyPayload>>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<ByteStream>;
}

#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut message = format!("HTTP error! Status: {}", status.as_u16());
        match response.text().await {
            Ok(body) if !body.is_empty() => message.push_str(&format!(" - {body}")),
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "failed to read error body"),
        }
        Err(anyhow!(message))
    }

    fn into_stream(response: reqwest::Response) -> ByteStream {
        Box::pin(
            response
                .bytes_stream()
                .map(|item| item.map_err(|error| anyhow!("stream read failed: {error}"))),
        )
    }
}

#[async_trait]
impl ChatBackend for ProxyClient {
    async fn create_thread(&self) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/assistants/threads"))
            .send()
            .await?;
        let created: ThreadCreated = Self::checked(response).await?.json().await?;
        Ok(created.thread_id)
    }

    async fn stream_message(&self, thread_id: &str, content: &str) -> Result<ByteStream> {
        let request = PostMessageRequest {
            content: content.to_string(),
            stream: Some(true),
        };
        let response = self
            .http
            .post(self.url(&format!("/api/assistants/threads/{thread_id}/messages")))
            .json(&request)
            .send()
            .await?;
        Ok(Self::into_stream(Self::checked(response).await?))
    }

    async fn post_message(&self, thread_id: &str, content: &str) -> Result<Option<ReplyPayload>> {
        let request = PostMessageRequest {
            content: content.to_string(),
            stream: Some(false),
        };
        let response = self
            .http
            .post(self.url(&format!("/api/assistants/threads/{thread_id}/messages")))
            .json(&request)
            .send()
            .await?;
        let response = Self::checked(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<ByteStream> {
        let request = SubmitActionsRequest {
            run_id: run_id.to_string(),
            tool_call_outputs: outputs.to_vec(),
        };
        let response = self
            .http
            .post(self.url(&format!("/api/assistants/threads/{thread_id}/actions")))
            .json(&request)
            .send()
            .await?;
        Ok(Self::into_stream(Self::checked(response).await?))
    }
}
