use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use vibecraft_core::{Error, Result, Tool, ToolDefinition, ToolOutput, ToolRegistry};
use vibecraft_gateway::{GatewayConfig, GatewayServer};

/// Two tools plus the housekeeping pair, with canned answers.
struct StubRegistry;

#[async_trait]
impl ToolRegistry for StubRegistry {
    fn get(&self, _name: &str) -> Option<&dyn Tool> {
        None
    }

    fn list(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "execute_command".into(),
            description: "Run a command".into(),
            parameters: json!({"type": "object"}),
        }]
    }

    async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput> {
        match name {
            "execute_command" => match args["command"].as_str() {
                Some(command) => Ok(ToolOutput::text(format!("ran {}", command))),
                None => Err(Error::invalid_request("missing field `command`")),
            },
            "bridge_status" => Ok(ToolOutput::text("{}").with_data(json!({"connected": false}))),
            "drain_inbox" => Ok(ToolOutput::text("Drained 0 message(s)")
                .with_data(json!({"count": 0, "messages": []}))),
            "offline" => Err(Error::BackoffActive {
                remaining_secs: 3.0,
                failures: 2,
            }),
            "blocked" => Err(Error::governance("Dangerous command blocked: //regen")),
            other => Err(Error::tool_not_found(other)),
        }
    }
}

fn app() -> Router {
    GatewayServer::new(GatewayConfig::default(), Arc::new(StubRegistry)).build_router()
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn call(payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/tools/call")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, json) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_tools() {
    let (status, json) = send(Request::get("/v1/tools").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tools"][0]["name"], "execute_command");
}

#[tokio::test]
async fn test_call_tool() {
    let (status, json) = send(call(json!({
        "name": "execute_command",
        "arguments": {"command": "/time set day"}
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "execute_command");
    assert_eq!(json["success"], true);
    assert_eq!(json["content"], "ran /time set day");
    assert!(json["trace_id"].is_string());
}

#[tokio::test]
async fn test_call_errors_map_to_status() {
    let (status, json) = send(call(json!({"name": "execute_command"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["class"], "fix_input");

    let (status, json) = send(call(json!({"name": "nope"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["class"], "fix_input");

    let (status, json) = send(call(json!({"name": "offline"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["class"], "retry_later");

    let (status, json) = send(call(json!({"name": "blocked"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().unwrap().contains("//regen"));
}

#[tokio::test]
async fn test_bridge_endpoints() {
    let (status, json) = send(
        Request::get("/v1/bridge/status")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["connected"], false);

    let (status, json) = send(
        Request::post("/v1/bridge/inbox/drain")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_metrics_route_absent_without_recorder() {
    let response = app()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
