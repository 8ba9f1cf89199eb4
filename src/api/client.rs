use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::{AssistantTemplate, Config};
use crate::types::{Assistant, MessageList, Run, Thread, ThreadMessage, ToolOutput};
use crate::util::{is_local_endpoint_url, join_url};
use anyhow::anyhow;
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const ASSISTANTS_BETA_HEADER: &str = "OpenAI-Beta";
const ASSISTANTS_BETA_VERSION: &str = "assistants=v2";

/// Thin client for the hosted Assistants API (threads, runs, messages, files).
#[derive(Clone)]
pub struct AssistantsClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
}

impl AssistantsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("threadchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| anyhow!("failed to build HTTP client: {error}"))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
        })
    }

    pub async fn create_assistant(&self, template: &AssistantTemplate) -> Result<Assistant> {
        let mut payload = json!({
            "name": template.name,
            "model": template.model,
            "instructions": template.instructions,
            "tools": [
                { "type": "code_interpreter" },
                { "type": "file_search" },
            ],
        });
        if !template.vector_store_ids.is_empty() {
            if let Some(object) = payload.as_object_mut() {
                object.insert(
                    "tool_resources".to_string(),
                    json!({ "file_search": { "vector_store_ids": template.vector_store_ids } }),
                );
            }
        }
        self.send_json(Method::POST, "assistants", Some(payload))
            .await
    }

    pub async fn create_thread(&self) -> Result<Thread> {
        self.send_json(Method::POST, "threads", Some(json!({})))
            .await
    }

    pub async fn create_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let payload = json!({ "role": "user", "content": content });
        self.send_json(
            Method::POST,
            &format!("threads/{thread_id}/messages"),
            Some(payload),
        )
        .await
    }

    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let payload = json!({ "assistant_id": assistant_id });
        self.send_json(Method::POST, &format!("threads/{thread_id}/runs"), Some(payload))
            .await
    }

    /// Starts a run with `stream: true` and returns the raw event-stream bytes.
    pub async fn create_run_stream(&self, thread_id: &str, assistant_id: &str) -> Result<ByteStream> {
        let payload = json!({ "assistant_id": assistant_id, "stream": true });
        self.send_stream(&format!("threads/{thread_id}/runs"), payload)
            .await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.send_json(
            Method::GET,
            &format!("threads/{thread_id}/runs/{run_id}"),
            None,
        )
        .await
    }

    /// Lists the thread's messages newest first.
    pub async fn list_messages(&self, thread_id: &str) -> Result<MessageList> {
        self.send_json(
            Method::GET,
            &format!("threads/{thread_id}/messages?order=desc"),
            None,
        )
        .await
    }

    /// Submits tool outputs for a run blocked on `requires_action` and streams the continuation.
    pub async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<ByteStream> {
        let payload = json!({ "tool_outputs": outputs, "stream": true });
        self.send_stream(
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            payload,
        )
        .await
    }

    /// Downloads a file's bytes together with the provider-reported content type.
    pub async fn file_content(&self, file_id: &str) -> Result<(Option<String>, Bytes)> {
        let request_url = join_url(&self.api_url, &format!("files/{file_id}/content"));
        let response = self
            .request(Method::GET, &request_url)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        let response = ensure_success(response, &request_url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        Ok((content_type, body))
    }

    fn request(&self, method: Method, request_url: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, request_url)
            .header(ASSISTANTS_BETA_HEADER, ASSISTANTS_BETA_VERSION);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        request
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<T> {
        let request_url = join_url(&self.api_url, path);
        let mut request = self.request(method, &request_url);
        if let Some(payload) = &payload {
            if debug_payload_enabled() {
                emit_debug_payload(&request_url, payload);
            }
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        let response = ensure_success(response, &request_url).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| anyhow!("API response from '{request_url}' was not understood: {error}"))
    }

    async fn send_stream(&self, path: &str, payload: Value) -> Result<ByteStream> {
        let request_url = join_url(&self.api_url, path);
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }

        let response = self
            .request(Method::POST, &request_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;
        let response = ensure_success(response, &request_url).await?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }
}

async fn ensure_success(response: reqwest::Response, request_url: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = provider_error_message(&body).unwrap_or(body);
    Err(anyhow!(
        "API endpoint '{}' returned HTTP {}: {}",
        request_url,
        status,
        detail
    ))
}

fn provider_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local API endpoint '{}': {}. Start your local server or update OPENAI_BASE_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach API endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("API request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "API endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("API request to '{}' failed: {}", request_url, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AssistantsClient {
        let config = Config {
            api_key: Some("sk-test".to_string()),
            api_url: format!("{}/v1", server.uri()),
            ..Config::default()
        };
        AssistantsClient::new(&config).expect("client should build")
    }

    #[tokio::test]
    async fn test_requests_carry_beta_and_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads"))
            .and(header("OpenAI-Beta", "assistants=v2"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let thread = client_for(&server).create_thread().await.unwrap();
        assert_eq!(thread.id, "thread_1");
    }

    #[tokio::test]
    async fn test_create_run_sends_assistant_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads/thread_1/runs"))
            .and(body_partial_json(json!({"assistant_id": "asst_1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "run_1", "status": "queued"})),
            )
            .mount(&server)
            .await;

        let run = client_for(&server)
            .create_run("thread_1", "asst_1")
            .await
            .unwrap();
        assert_eq!(run.id, "run_1");
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_list_messages_requests_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/threads/thread_1/messages"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let messages = client_for(&server).list_messages("thread_1").await.unwrap();
        assert!(messages.data.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}),
            ))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .create_thread()
            .await
            .expect_err("401 should be an error");
        let message = error.to_string();
        assert!(message.contains("401"), "{message}");
        assert!(message.contains("Incorrect API key provided"), "{message}");
    }

    #[tokio::test]
    async fn test_create_assistant_attaches_vector_stores_only_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/assistants"))
            .and(body_partial_json(json!({
                "tool_resources": {"file_search": {"vector_store_ids": ["vs_1"]}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "asst_9"})))
            .expect(1)
            .mount(&server)
            .await;

        let template = AssistantTemplate {
            vector_store_ids: vec!["vs_1".to_string()],
            ..AssistantTemplate::default()
        };
        let assistant = client_for(&server)
            .create_assistant(&template)
            .await
            .unwrap();
        assert_eq!(assistant.id, "asst_9");
    }

    #[test]
    fn test_provider_error_message_ignores_non_json_bodies() {
        assert_eq!(provider_error_message("<html>bad gateway</html>"), None);
        assert_eq!(
            provider_error_message(r#"{"error":{"message":"boom"}}"#).as_deref(),
            Some("boom")
        );
    }
}
