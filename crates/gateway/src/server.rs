//! Axum-based HTTP server exposing the tool registry.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use vibecraft_core::{
    config::ServerConfig,
    traits::ToolRegistry,
    types::{ToolDefinition, ToolOutput},
    Error, Result,
};

use crate::error::ApiError;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            enable_cors: server.enable_cors,
            enable_tracing: true,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Every tool the agent may call.
    pub tools: Arc<dyn ToolRegistry>,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, tools: Arc<dyn ToolRegistry>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { tools }),
            metrics_handle: None,
        }
    }

    /// Expose the Prometheus recorder at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/v1/tools", get(list_tools_handler))
            .route("/v1/tools/call", post(call_tool_handler))
            .route("/v1/bridge/status", get(bridge_status_handler))
            .route("/v1/bridge/inbox/drain", post(drain_inbox_handler))
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        if self.config.enable_cors {
            router = router.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));
        }

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind: {}", e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::gateway(format!("Server error: {}", e)))?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Tool call request.
#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    /// Tool name.
    pub name: String,
    /// Tool arguments; missing means none.
    #[serde(default)]
    pub arguments: Value,
}

/// Tool call response.
#[derive(Debug, Serialize)]
pub struct CallToolResponse {
    /// Trace ID for this call.
    pub trace_id: String,
    /// Tool name.
    pub name: String,
    #[serde(flatten)]
    pub output: ToolOutput,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Tool listing.
#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDefinition>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ToolsResponse {
        tools: state.tools.list(),
    })
}

async fn call_tool_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CallToolRequest>,
) -> std::result::Result<Json<CallToolResponse>, ApiError> {
    let trace_id = Uuid::new_v4().to_string();
    tracing::info!(trace_id = %trace_id, tool = %payload.name, "Processing tool call");

    let output = state
        .tools
        .execute(&payload.name, payload.arguments)
        .await
        .map_err(|e| {
            tracing::warn!(trace_id = %trace_id, tool = %payload.name, error = %e, "Tool call failed");
            ApiError(e)
        })?;

    Ok(Json(CallToolResponse {
        trace_id,
        name: payload.name,
        output,
    }))
}

/// Run a housekeeping tool and return its structured data.
async fn housekeeping(state: &AppState, tool: &str) -> std::result::Result<Json<Value>, ApiError> {
    let output = state.tools.execute(tool, Value::Null).await?;
    Ok(Json(output.data.unwrap_or(Value::Null)))
}

async fn bridge_status_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Value>, ApiError> {
    housekeeping(&state, "bridge_status").await
}

async fn drain_inbox_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Value>, ApiError> {
    housekeeping(&state, "drain_inbox").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_config_from_server_section() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            enable_cors: false,
        };
        let config = GatewayConfig::from(&server);
        assert_eq!(config.port, 8080);
        assert!(!config.enable_cors);
        assert!(config.enable_tracing);
    }
}
