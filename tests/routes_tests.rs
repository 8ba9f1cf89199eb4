use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use threadchat::config::Config;
use threadchat::server::{build_router, AppState};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = "event: thread.message.created\ndata: {\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}\n\nevent: thread.run.completed\ndata: {\"id\":\"run_1\",\"status\":\"completed\"}\n\nevent: done\ndata: [DONE]\n\n";

fn test_config(server: &MockServer) -> Config {
    Config {
        api_key: Some("sk-test".to_string()),
        api_url: format!("{}/v1", server.uri()),
        assistant_id: Some("asst_1".to_string()),
        poll_interval: Duration::from_millis(5),
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    build_router(AppState::new(config).expect("client builds"))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Bytes) {
    let response = app.oneshot(request).await.expect("router responds");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    (status, content_type, body)
}

fn json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

async fn mount_message_and_run(server: &MockServer, final_status: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/messages"))
        .and(body_partial_json(json!({"role": "user", "content": "Hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_user", "role": "user", "content": []
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs"))
        .and(body_partial_json(json!({"assistant_id": "asst_1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": "queued"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "run_1", "status": "in_progress"})),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": final_status})),
        )
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, listing: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_polled_message_returns_the_assistant_reply() {
    let server = MockServer::start().await;
    mount_message_and_run(&server, "completed").await;
    mount_listing(
        &server,
        json!({"data": [
            {"id": "msg_2", "role": "assistant", "content": [
                {"type": "text", "text": {"value": "Hello!", "annotations": []}}
            ]},
            {"id": "msg_user", "role": "user", "content": [
                {"type": "text", "text": {"value": "Hi", "annotations": []}}
            ]}
        ]}),
    )
    .await;

    let (status, _, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "Hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({"content": "Hello!", "event": "thread.run.completed"})
    );
}

#[tokio::test]
async fn test_failed_run_maps_to_500_with_status_name() {
    let server = MockServer::start().await;
    mount_message_and_run(&server, "failed").await;

    let (status, _, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "Hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(&body),
        json!({"error": "Run failed with status: failed"})
    );
}

#[tokio::test]
async fn test_empty_assistant_content_degrades_to_fallback_text() {
    let server = MockServer::start().await;
    mount_message_and_run(&server, "completed").await;
    mount_listing(
        &server,
        json!({"data": [{"id": "msg_2", "role": "assistant", "content": []}]}),
    )
    .await;

    let (status, _, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "Hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body)["content"],
        "I am unable to provide a response at this time"
    );
}

#[tokio::test]
async fn test_missing_assistant_message_is_204() {
    let server = MockServer::start().await;
    mount_message_and_run(&server, "completed").await;
    mount_listing(&server, json!({"data": [{"id": "msg_user", "role": "user", "content": []}]})).await;

    let (status, _, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "Hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_streamed_message_relays_provider_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_user", "role": "user", "content": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs"))
        .and(body_partial_json(json!({"assistant_id": "asst_1", "stream": true})))
        .and(header_eq("openai-beta", "assistants=v2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, content_type, body) = send(
        app(test_config(&server)),
        post_json(
            "/api/assistants/threads/thread_1/messages",
            json!({"content": "Hi", "stream": true}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/event-stream"));
    assert_eq!(body, Bytes::from_static(SSE_BODY.as_bytes()));
}

#[tokio::test]
async fn test_actions_submit_outputs_and_relay_continuation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs/run_1/submit_tool_outputs"))
        .and(body_partial_json(json!({
            "tool_outputs": [
                {"tool_call_id": "call_1", "output": "42"},
                {"tool_call_id": "call_2", "output": "sunny"}
            ],
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, content_type, body) = send(
        app(test_config(&server)),
        post_json(
            "/api/assistants/threads/thread_1/actions",
            json!({
                "runId": "run_1",
                "toolCallOutputs": [
                    {"tool_call_id": "call_1", "output": "42"},
                    {"tool_call_id": "call_2", "output": "sunny"}
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/event-stream"));
    assert_eq!(body, Bytes::from_static(SSE_BODY.as_bytes()));
}

#[tokio::test]
async fn test_blank_content_is_rejected() {
    let server = MockServer::start().await;

    let (status, _, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "  "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body), json!({"error": "content must not be empty"}));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let server = MockServer::start().await;

    let (status, content_type, body) = send(
        app(test_config(&server)),
        post_json("/api/assistants/threads/thread_1/messages", json!({"text": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert!(json_body(&body)["error"].as_str().is_some());

    let request = Request::post("/api/assistants/threads/thread_1/actions")
        .body(Body::from("{\"runId\":\"run_1\"}"))
        .expect("request builds");
    let (status, _, body) = send(app(test_config(&server)), request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json_body(&body)["error"].as_str().is_some());

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_assistant_id_is_a_server_error() {
    let server = MockServer::start().await;
    let config = Config {
        assistant_id: None,
        ..test_config(&server)
    };

    let (status, _, body) = send(
        app(config),
        post_json("/api/assistants/threads/thread_1/messages", json!({"content": "Hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"]
        .as_str()
        .unwrap()
        .contains("ASSISTANT_ID"));
}

#[tokio::test]
async fn test_provider_errors_surface_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        app(test_config(&server)),
        Request::post("/api/assistants/threads")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["error"]
        .as_str()
        .unwrap()
        .contains("Incorrect API key provided"));
}

#[tokio::test]
async fn test_create_thread_and_assistant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads"))
        .and(header_eq("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_9"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/assistants"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "asst_new"})))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        app(test_config(&server)),
        Request::post("/api/assistants/threads")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"threadId": "thread_9"}));

    let (status, _, body) = send(
        app(test_config(&server)),
        Request::post("/api/assistants").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"assistantId": "asst_new"}));
}

#[tokio::test]
async fn test_file_route_proxies_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/files/file_abc/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a,b\n1,2\n", "text/csv"))
        .mount(&server)
        .await;

    let (status, content_type, body) = send(
        app(test_config(&server)),
        Request::get("/api/files/file_abc").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/csv"));
    assert_eq!(body, Bytes::from_static(b"a,b\n1,2\n"));
}

#[tokio::test]
async fn test_system_prompt_is_read_per_request() {
    let server = MockServer::start().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "You answer questions about the uploaded files.").unwrap();
    let config = Config {
        system_prompt_path: file.path().to_path_buf(),
        ..test_config(&server)
    };

    let (status, _, body) = send(
        app(config),
        Request::get("/api/system-prompt").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({"prompt": "You answer questions about the uploaded files."})
    );
}

#[tokio::test]
async fn test_unreadable_system_prompt_is_a_500() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        system_prompt_path: dir.path().join("missing.txt"),
        ..test_config(&server)
    };

    let (status, _, body) = send(
        app(config),
        Request::get("/api/system-prompt").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body), json!({"error": "Failed to read system prompt"}));
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;

    let (status, _, body) = send(
        app(test_config(&server)),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "healthy");
}
