use crate::api::client::ByteStream;
use crate::api::proxy::ChatBackend;
use crate::types::{ReplyPayload, ToolOutput};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted backend: each stream request pops the next list of SSE frames.
#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    replies: Arc<Mutex<Vec<Result<Option<ReplyPayload>, String>>>>,
    submissions: Arc<Mutex<Vec<(String, Vec<ToolOutput>)>>>,
    stall_after_frames: bool,
    latency: Option<Duration>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            replies: Arc::new(Mutex::new(Vec::new())),
            submissions: Arc::new(Mutex::new(Vec::new())),
            stall_after_frames: false,
            latency: None,
        }
    }

    /// Keeps every stream open after its scripted frames instead of closing it.
    pub fn stalling(mut self) -> Self {
        self.stall_after_frames = true;
        self
    }

    /// Delays opening each stream, and then its first frame, by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_replies(self, replies: Vec<Result<Option<ReplyPayload>, String>>) -> Self {
        *self.replies.lock().unwrap() = replies;
        self
    }

    pub fn submissions(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.submissions.lock().unwrap().clone()
    }

    fn next_stream(&self) -> Result<ByteStream> {
        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockApiClient: No more responses configured"
            ));
        }
        let current_sse_chunks = responses_guard.remove(0);

        let sse_byte_chunks: Vec<Result<Bytes>> = current_sse_chunks
            .into_iter()
            .map(|s| {
                let framed = if s.ends_with("\n\n") {
                    s
                } else {
                    format!("{s}\n\n")
                };
                Ok(Bytes::from(framed))
            })
            .collect();

        let frames = stream::iter(sse_byte_chunks);
        let frames: ByteStream = match self.latency {
            Some(latency) => Box::pin(
                stream::once(tokio::time::sleep(latency))
                    .filter_map(|_| async { None::<Result<Bytes>> })
                    .chain(frames),
            ),
            None => Box::pin(frames),
        };
        if self.stall_after_frames {
            Ok(Box::pin(frames.chain(stream::pending())))
        } else {
            Ok(frames)
        }
    }
}

#[async_trait]
impl ChatBackend for MockApiClient {
    async fn create_thread(&self) -> Result<String> {
        Ok("thread_mock".to_string())
    }

    async fn stream_message(&self, _thread_id: &str, _content: &str) -> Result<ByteStream> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_stream()
    }

    async fn post_message(&self, _thread_id: &str, _content: &str) -> Result<Option<ReplyPayload>> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(anyhow::anyhow!("MockApiClient: No more replies configured"));
        }
        replies.remove(0).map_err(anyhow::Error::msg)
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<ByteStream> {
        self.submissions
            .lock()
            .unwrap()
            .push((run_id.to_string(), outputs.to_vec()));
        self.next_stream()
    }
}
