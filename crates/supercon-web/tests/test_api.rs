//! Router-level tests with an in-process LLM backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use supercon_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use supercon_query::{QueryConfig, QueryService};
use supercon_web::router::{build_router, router_with_state};
use supercon_web::state::AppState;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tower::ServiceExt;

const NB3SN_REPLY: &str = r#"{"name":"Nb3Sn","type":"Type II","description":"An intermetallic A15 superconductor.","criticalTemperatureKelvin":18.3,"criticalTemperatureCelsius":-254.85,"applications":["Accelerator magnets","NMR"],"crystalStructure":"A15","discoveredBy":"Matthias et al.","yearOfDiscovery":1954}"#;

struct FixedBackend(&'static str);

#[async_trait]
impl LlmBackend for FixedBackend {
    async fn generate(&self, _api_key: &SecretString, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            text: Some(self.0.to_string()),
            model: "fixed".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn provider_name(&self) -> &str { "Gemini" }
    fn model_id(&self) -> &str { "fixed" }
}

/// Holds every call open until the test releases it.
#[derive(Default)]
struct GatedBackend {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl LlmBackend for GatedBackend {
    async fn generate(&self, _api_key: &SecretString, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(LlmResponse {
            text: Some(NB3SN_REPLY.to_string()),
            model: "gated".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn provider_name(&self) -> &str { "Gemini" }
    fn model_id(&self) -> &str { "gated" }
}

const WAIT: Duration = Duration::from_secs(5);

fn gated_app() -> (Router, Arc<AppState>, Arc<GatedBackend>) {
    let backend = Arc::new(GatedBackend::default());
    let config = QueryConfig {
        api_key: Some(SecretString::from("k".to_string())),
        ..Default::default()
    };
    let state = Arc::new(AppState::new(QueryService::new(config, backend.clone())));
    (router_with_state(state.clone()), state, backend)
}

/// Start a query in the background and wait until the backend has it.
async fn query_in_background(
    app: &Router,
    backend: &GatedBackend,
    id: &str,
    material: &'static str,
) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let app = app.clone();
    let uri = format!("/api/sessions/{id}/query");
    let handle = tokio::spawn(async move {
        send(&app, "POST", &uri, Some(json!({ "material": material }))).await
    });
    timeout(WAIT, backend.started.notified()).await.expect("backend never called");
    handle
}

/// Read `count` SSE frames as (event name, JSON data).
async fn read_events(stream: &mut BodyDataStream, count: usize) -> Vec<(String, Value)> {
    let mut buf = String::new();
    let mut out = Vec::new();
    while out.len() < count {
        let chunk = timeout(WAIT, stream.next())
            .await
            .expect("timed out waiting for SSE frame")
            .expect("SSE stream ended")
            .unwrap();
        buf.push_str(std::str::from_utf8(&chunk).unwrap());
        while let Some(end) = buf.find("\n\n") {
            let frame: String = buf.drain(..end + 2).collect();
            let mut name = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim_start().to_string());
                }
                if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str::<Value>(v.trim_start()).unwrap());
                }
            }
            if let (Some(name), Some(data)) = (name, data) {
                out.push((name, data));
            }
        }
    }
    out
}

fn app(reply: &'static str, with_key: bool) -> Router {
    let config = QueryConfig {
        api_key: with_key.then(|| SecretString::from("k".to_string())),
        normalize_temperatures: true,
        ..Default::default()
    };
    let service = QueryService::new(config, Arc::new(FixedBackend(reply)));
    build_router(AppState::new(service))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "idle");
    body["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_query_round_trip() {
    let app = app(NB3SN_REPLY, true);
    let id = new_session(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{id}/query"),
        Some(json!({ "material": "Niobium-tin" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "succeeded");
    assert_eq!(body["isLoading"], false);
    assert_eq!(body["input"], "Niobium-tin");
    assert_eq!(body["result"]["type"], "Type II");
    assert_eq!(body["result"]["criticalTemperatureKelvin"], 18.3);
    assert_eq!(body["error"], Value::Null);

    let (_, fetched) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn test_clear_returns_session_to_idle() {
    let app = app(NB3SN_REPLY, true);
    let id = new_session(&app).await;
    send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({ "material": "Nb3Sn" }))).await;

    let (status, body) = send(&app, "DELETE", &format!("/api/sessions/{id}/result"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["result"], Value::Null);
    assert_eq!(body["input"], "");
}

#[tokio::test]
async fn test_failure_is_reported_as_message() {
    let app = app("not json", true);
    let id = new_session(&app).await;

    let (status, body) =
        send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({ "material": "MgB2" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "failed");
    assert_eq!(
        body["error"],
        "Failed to fetch data from the Gemini API. The material may not be recognized \
         or there could be an issue with the service."
    );
}

#[tokio::test]
async fn test_missing_key_is_surfaced() {
    let app = app(NB3SN_REPLY, false);
    let id = new_session(&app).await;

    let (_, body) =
        send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({ "material": "MgB2" }))).await;

    assert_eq!(body["error"], "Gemini API key is not configured.");
}

#[tokio::test]
async fn test_blank_material_is_bad_request() {
    let app = app(NB3SN_REPLY, true);
    let id = new_session(&app).await;

    let (status, body) =
        send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({ "material": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must not be empty"));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = app(NB3SN_REPLY, true);
    let (status, _) = send(
        &app,
        "GET",
        "/api/sessions/00000000-0000-0000-0000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_examples_and_health() {
    let app = app(NB3SN_REPLY, false);

    let (status, examples) = send(&app, "GET", "/api/examples", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(examples[0]["label"], "YBa₂Cu₃O₇ (YBCO)");
    assert_eq!(examples[0]["material"], "YBa₂Cu₃O₇");

    let (_, health) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(health["provider"], "Gemini");
    assert_eq!(health["credentialConfigured"], false);
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let app = app(NB3SN_REPLY, true);
    let id = new_session(&app).await;

    let (status, body) = send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("material"));
}

#[tokio::test]
async fn test_delete_session_removes_it() {
    let app = app(NB3SN_REPLY, true);
    let id = new_session(&app).await;
    let keep = new_session(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/api/sessions/{id}/events"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/api/sessions/{keep}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_frees_registry_entry() {
    let (app, state, _backend) = gated_app();
    let ids = [new_session(&app).await, new_session(&app).await, new_session(&app).await];
    assert_eq!(state.session_count(), 3);

    for id in &ids {
        send(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;
    }
    assert_eq!(state.session_count(), 0);
}

#[tokio::test]
async fn test_second_query_in_flight_conflicts() {
    let (app, _state, backend) = gated_app();
    let id = new_session(&app).await;
    let first = query_in_background(&app, &backend, &id, "Nb3Sn").await;

    let (status, body) =
        send(&app, "POST", &format!("/api/sessions/{id}/query"), Some(json!({ "material": "MgB2" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already in progress"));

    backend.release.notify_one();
    let (status, body) = timeout(WAIT, first).await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "succeeded");
    assert_eq!(body["input"], "Nb3Sn");
}

#[tokio::test]
async fn test_event_stream_follows_one_session() {
    let (app, _state, backend) = gated_app();
    let id = new_session(&app).await;
    let other = new_session(&app).await;

    let req = Request::builder()
        .uri(format!("/api/sessions/{id}/events"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/event-stream"));
    let mut stream = resp.into_body().into_data_stream();

    let first = query_in_background(&app, &backend, &id, "Nb3Sn").await;
    // activity on another session must not show up on this stream
    send(&app, "DELETE", &format!("/api/sessions/{other}/result"), None).await;
    backend.release.notify_one();
    timeout(WAIT, first).await.unwrap().unwrap();
    send(&app, "DELETE", &format!("/api/sessions/{id}/result"), None).await;
    send(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;

    let events = read_events(&mut stream, 4).await;
    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["session", "session", "session", "closed"]);

    let states: Vec<&str> = events[..3]
        .iter()
        .map(|(_, e)| e["snapshot"]["state"].as_str().unwrap())
        .collect();
    assert_eq!(states, ["requesting", "succeeded", "idle"]);
    assert_eq!(events[1].1["snapshot"]["result"]["name"], "Nb3Sn");
    assert!(events.iter().all(|(_, e)| e["session_id"] == id.as_str()));
}

#[tokio::test]
async fn test_clear_while_pending_discards_late_reply() {
    let (app, state, backend) = gated_app();
    let id = new_session(&app).await;
    let mut rx = state.subscribe();

    let first = query_in_background(&app, &backend, &id, "Nb3Sn").await;

    let (status, cleared) = send(&app, "DELETE", &format!("/api/sessions/{id}/result"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["state"], "idle");

    backend.release.notify_one();
    let (status, late) = timeout(WAIT, first).await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(late, cleared);

    let (_, now) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(now, cleared);
    assert_eq!(now["result"], Value::Null);

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        let value = serde_json::to_value(&event).unwrap();
        states.push(value["snapshot"]["state"].as_str().unwrap().to_string());
    }
    assert_eq!(states, ["requesting", "idle"]);
}
