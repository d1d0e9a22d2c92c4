//! The request/response bridge to the client mod.

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use vibecraft_core::config::{AppConfig, BridgeConfig, WorldEditConfig};
use vibecraft_core::{CommandExecutor, Error, Result};

use crate::backoff::{BackoffPolicy, BackoffState, BackoffStatus};
use crate::messages::{self, kinds, HelloResult, RequestEnvelope, ResponseEnvelope};
use crate::policy;
use crate::router::{self, Inbox, LinkShared, PendingGuard};
use crate::transport::{Connector, Duplex, FrameSink, FrameStream, WebSocketConnector};

// =============================================================================
// Live Connection
// =============================================================================

/// One established connection plus its reader.
struct LiveLink {
    generation: u64,
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
    stream: Mutex<Option<Box<dyn FrameStream>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<LinkShared>,
}

impl LiveLink {
    fn new(generation: u64, duplex: Duplex) -> Self {
        Self {
            generation,
            sink: tokio::sync::Mutex::new(duplex.sink),
            stream: Mutex::new(Some(duplex.stream)),
            reader: Mutex::new(None),
            shared: Arc::new(LinkShared::new()),
        }
    }

    /// Spawn the reader unless one is already running for this link.
    fn start_reader(&self, inbox: Arc<Inbox>) {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let stream = self.stream.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(stream) = stream {
            *reader = Some(tokio::spawn(router::run_reader(
                stream,
                self.shared.clone(),
                inbox,
            )));
        }
    }

    async fn send(&self, text: String) -> Result<()> {
        self.sink.lock().await.send_text(text).await
    }

    /// Fail every waiter, stop the reader and close the socket.
    async fn shutdown(&self) {
        self.shared
            .fault(router::Fault::Connection("Client bridge connection closed".into()));
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = reader {
            handle.abort();
        }
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::debug!(error = %e, "Ignoring error while closing client bridge connection");
        }
    }
}

/// Connection and backoff live under one lock: they change together.
struct LinkState {
    live: Option<Arc<LiveLink>>,
    backoff: BackoffState,
    last_used: Instant,
    next_generation: u64,
}

impl LinkState {
    async fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            tracing::debug!(generation = live.generation, "Closing client bridge connection");
            live.shutdown().await;
        }
    }
}

// =============================================================================
// Client Bridge
// =============================================================================

/// Outcome of the `hello` handshake.
#[derive(Debug, Clone, Serialize)]
pub struct Handshake {
    pub ok: bool,
    /// Decoded result; `None` when the peer's answer did not match the schema.
    pub hello: Option<HelloResult>,
    /// Capabilities snapshot stored by this handshake, if any was reported.
    pub capabilities: Option<Value>,
}

/// Correlated request/response client for the game-side mod.
pub struct ClientBridge {
    connector: Arc<dyn Connector>,
    token: Option<Secret<String>>,
    timeout: Duration,
    max_idle: Duration,
    backoff_policy: BackoffPolicy,
    worldedit: WorldEditConfig,
    link: tokio::sync::Mutex<LinkState>,
    send_lock: tokio::sync::Mutex<()>,
    command_lock: tokio::sync::Mutex<()>,
    inbox: Arc<Inbox>,
    capabilities: RwLock<Value>,
}

impl ClientBridge {
    /// Create a bridge over any connector.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: &BridgeConfig,
        worldedit: WorldEditConfig,
    ) -> Self {
        Self {
            connector,
            token: config.token.clone(),
            timeout: Duration::from_secs_f64(config.timeout_secs.max(0.0)),
            max_idle: Duration::from_secs_f64(config.max_idle_secs.max(0.0)),
            backoff_policy: BackoffPolicy::from_config(&config.backoff),
            worldedit,
            link: tokio::sync::Mutex::new(LinkState {
                live: None,
                backoff: BackoffState::new(),
                last_used: Instant::now(),
                next_generation: 0,
            }),
            send_lock: tokio::sync::Mutex::new(()),
            command_lock: tokio::sync::Mutex::new(()),
            inbox: Arc::new(Inbox::new(config.inbox_capacity)),
            capabilities: RwLock::new(json!({})),
        }
    }

    /// Create a WebSocket-backed bridge from application config.
    pub fn from_config(config: &AppConfig) -> Self {
        let connector = Arc::new(WebSocketConnector::from_config(&config.bridge));
        Self::new(connector, &config.bridge, config.worldedit)
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    // -------------------------------------------------------------------------
    // Connection management
    // -------------------------------------------------------------------------

    async fn ensure_connection(&self) -> Result<Arc<LiveLink>> {
        let mut state = self.link.lock().await;
        let now = Instant::now();

        let stale = match &state.live {
            Some(live) if now.duration_since(state.last_used) > self.max_idle => {
                tracing::debug!(generation = live.generation, "Client bridge connection idle, replacing");
                true
            }
            Some(live) if live.shared.is_faulted() => {
                tracing::debug!(generation = live.generation, "Client bridge connection faulted, replacing");
                true
            }
            _ => false,
        };
        if stale {
            state.teardown().await;
        }

        let live = match state.live.clone() {
            Some(live) => live,
            None => {
                state.backoff.check(now)?;
                match self.connector.connect().await {
                    Ok(duplex) => {
                        state.backoff.reset();
                        state.next_generation += 1;
                        let live = Arc::new(LiveLink::new(state.next_generation, duplex));
                        tracing::info!(
                            endpoint = %self.connector.endpoint(),
                            generation = live.generation,
                            "Connected to client bridge"
                        );
                        state.live = Some(live.clone());
                        live
                    }
                    Err(e) => {
                        state.backoff.record_failure(&self.backoff_policy, Instant::now());
                        vibecraft_governance::track_bridge_connect_failure();
                        let detail = match e {
                            Error::Connection(msg) | Error::Timeout(msg) => msg,
                            other => other.to_string(),
                        };
                        return Err(Error::connection(format!(
                            "Failed to connect to client bridge at {}: {}",
                            self.connector.endpoint(),
                            detail
                        )));
                    }
                }
            }
        };

        live.start_reader(self.inbox.clone());
        state.last_used = now;
        Ok(live)
    }

    /// Tear the connection down if it is still the one identified by `generation`.
    async fn invalidate(&self, generation: u64) {
        let mut state = self.link.lock().await;
        if state.live.as_ref().map(|live| live.generation) == Some(generation) {
            state.teardown().await;
        }
    }

    /// Close the current connection, if any.
    pub async fn close(&self) {
        self.link.lock().await.teardown().await;
    }

    /// Allow an immediate reconnect attempt.
    pub async fn reset_backoff(&self) {
        self.link.lock().await.backoff.reset();
    }

    pub async fn backoff_status(&self) -> BackoffStatus {
        self.link.lock().await.backoff.status(Instant::now())
    }

    /// Whether a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        let state = self.link.lock().await;
        state
            .live
            .as_ref()
            .is_some_and(|live| !live.shared.is_faulted())
    }

    /// Number of requests currently awaiting a response.
    pub async fn pending_requests(&self) -> usize {
        let state = self.link.lock().await;
        state
            .live
            .as_ref()
            .map(|live| live.shared.pending_count())
            .unwrap_or(0)
    }

    /// Return and clear the unsolicited messages received so far.
    pub fn drain_inbox(&self) -> Vec<Value> {
        self.inbox.drain()
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Send one request and wait for the response carrying its correlation id.
    ///
    /// Any error tears the connection down so the next call starts fresh.
    pub async fn request(&self, message_type: &str, payload: Value) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let outcome = self.request_inner(message_type, payload, deadline).await;

        let label = match &outcome {
            Ok(_) => "ok",
            Err(Error::Timeout(_)) => "timeout",
            Err(Error::Protocol(_)) => "protocol_error",
            Err(_) => "connection_error",
        };
        vibecraft_governance::track_bridge_request(
            message_type,
            label,
            started.elapsed().as_secs_f64(),
        );
        outcome
    }

    async fn request_inner(
        &self,
        message_type: &str,
        payload: Value,
        deadline: Instant,
    ) -> Result<ResponseEnvelope> {
        let live = self.ensure_connection().await?;

        let envelope = RequestEnvelope {
            id: Uuid::new_v4().simple().to_string(),
            message_type: message_type.to_owned(),
            token: self.token.as_ref().map(|t| t.expose_secret().clone()),
            payload,
        };
        if let Err(e) = messages::validate_request(&envelope) {
            tracing::warn!(error = %e, "Request schema validation failed");
        }

        match self.round_trip(&live, &envelope, deadline).await {
            Ok(message) => {
                if let Err(e) = messages::validate_response(&message) {
                    tracing::warn!(error = %e, "Response schema validation failed");
                }
                Ok(ResponseEnvelope::from_message(message))
            }
            Err(e) => {
                tracing::debug!(
                    id = %envelope.id,
                    message_type,
                    error = %e,
                    "Client bridge request failed, dropping connection"
                );
                self.invalidate(live.generation).await;
                Err(e)
            }
        }
    }

    async fn round_trip(
        &self,
        live: &LiveLink,
        envelope: &RequestEnvelope,
        deadline: Instant,
    ) -> Result<Value> {
        live.shared.register(&envelope.id)?;
        let _pending = PendingGuard::new(live.shared.clone(), envelope.id.clone());

        let text = serde_json::to_string(envelope)?;
        let send = async {
            let _send = self.send_lock.lock().await;
            tracing::debug!(id = %envelope.id, message_type = %envelope.message_type, "Sending request");
            live.send(text).await
        };
        tokio::time::timeout_at(deadline, send).await.map_err(|_| {
            Error::timeout(format!(
                "Client bridge timed out sending {}",
                envelope.message_type
            ))
        })??;

        live.shared
            .wait_for(&envelope.id, deadline, &envelope.message_type)
            .await
    }

    /// `request` plus the usual `ok=false` handling and a best-effort shape check.
    async fn derived(
        &self,
        message_type: &str,
        payload: Value,
        failure: &str,
        required: &[&str],
    ) -> Result<Value> {
        let response = self.request(message_type, payload).await?;
        if !response.ok {
            return Err(Error::protocol(
                response.error.unwrap_or_else(|| failure.to_owned()),
            ));
        }
        let result = response.result.unwrap_or_else(|| json!({}));
        if !required.is_empty() {
            if let Err(e) = messages::check_result_shape(message_type, &result, required) {
                tracing::warn!(error = %e, "Result schema validation failed");
            }
        }
        Ok(result)
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Run one game command. Commands are serialized end to end.
    pub async fn execute_command(&self, command: &str) -> Result<String> {
        let normalized = policy::normalize_command(command);
        policy::enforce_worldedit_policy(&normalized, &self.worldedit, self.worldedit_available())?;

        let _command = self.command_lock.lock().await;
        let response = self
            .request(kinds::COMMAND_EXECUTE, json!({ "command": normalized }))
            .await?;
        if !response.ok {
            return Err(Error::protocol(
                response.error.unwrap_or_else(|| "Command failed".to_owned()),
            ));
        }
        Ok(match response.result {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        })
    }

    fn worldedit_available(&self) -> Option<bool> {
        let capabilities = self.capabilities.read().unwrap_or_else(|e| e.into_inner());
        policy::worldedit_available(&capabilities)
    }

    /// Installed WorldEdit version reported by `//version`, if any.
    pub async fn detect_worldedit_version(&self) -> Option<String> {
        let response = match self.execute_command("//version").await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to detect WorldEdit version");
                return None;
            }
        };
        if !response.contains("WorldEdit") {
            return None;
        }
        let pattern = Regex::new(r"WorldEdit.*?(\d+\.\d+\.\d+)").ok()?;
        pattern
            .captures(&response)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    }

    // -------------------------------------------------------------------------
    // Handshake
    // -------------------------------------------------------------------------

    /// Exchange `hello` and store the advertised capabilities when present.
    pub async fn handshake(&self) -> Result<Handshake> {
        let response = self.request(kinds::HELLO, json!({})).await?;
        let result = match &response.result {
            Some(result @ Value::Object(_)) => result.clone(),
            _ => json!({}),
        };

        let hello = match messages::validate_hello_result(&result) {
            Ok(hello) => Some(hello),
            Err(e) => {
                tracing::warn!(error = %e, "Hello result schema validation failed");
                None
            }
        };

        let capabilities = response
            .extra
            .get("capabilities")
            .or_else(|| result.get("capabilities"))
            .filter(|caps| !caps.is_null())
            .cloned();
        if let Some(caps) = &capabilities {
            if let Err(e) = messages::validate_capabilities(caps) {
                tracing::warn!(error = %e, "Capabilities schema validation failed");
            }
            *self.capabilities.write().unwrap_or_else(|e| e.into_inner()) = caps.clone();
        }

        Ok(Handshake {
            ok: response.ok,
            hello,
            capabilities,
        })
    }

    /// Whether the client mod answers `hello`. Never fails.
    pub async fn test_connection(&self) -> bool {
        match self.handshake().await {
            Ok(handshake) => handshake.ok,
            Err(e) => {
                tracing::warn!(error = %e, "Client bridge test failed");
                false
            }
        }
    }

    /// Cached capabilities from the last handshake.
    pub fn capabilities(&self) -> Value {
        self.capabilities
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // -------------------------------------------------------------------------
    // Derived operations
    // -------------------------------------------------------------------------

    /// Time, difficulty and players; falls back to plain commands.
    pub async fn server_info(&self) -> Value {
        match self.request(kinds::SERVER_INFO, json!({})).await {
            Ok(response) if response.ok => {
                if let Some(result @ Value::Object(_)) = response.result {
                    if let Err(e) = messages::validate_server_info_result(&result) {
                        tracing::warn!(error = %e, "Server info schema validation failed");
                    }
                    return result;
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "server.info unavailable, using commands"),
        }

        let mut info = serde_json::Map::new();
        for (key, command, placeholder) in [
            ("players", "list", "Unable to retrieve player list"),
            ("time", "time query daytime", "Unable to retrieve time"),
            ("difficulty", "difficulty", "Unable to retrieve difficulty"),
        ] {
            let value = self
                .execute_command(command)
                .await
                .unwrap_or_else(|_| placeholder.to_owned());
            info.insert(key.to_owned(), Value::String(value));
        }
        Value::Object(info)
    }

    pub async fn capture_screenshot(&self, max_width: u32, max_height: u32) -> Result<Value> {
        self.derived(
            kinds::SCREENSHOT_CAPTURE,
            json!({ "max_width": max_width, "max_height": max_height }),
            "Screenshot failed",
            &["image", "width", "height"],
        )
        .await
    }

    pub async fn scan_region(&self, region: Region, include_states: bool) -> Result<Value> {
        let mut payload = region.payload();
        payload["include_states"] = json!(include_states);
        self.derived(
            kinds::REGION_SCAN,
            payload,
            "Region scan failed",
            &["dimensions", "origin", "palette", "blocks"],
        )
        .await
    }

    pub async fn get_heightmap(&self, x1: i64, z1: i64, x2: i64, z2: i64) -> Result<Value> {
        self.derived(
            kinds::REGION_HEIGHTMAP,
            json!({ "x1": x1, "z1": z1, "x2": x2, "z2": z2 }),
            "Heightmap failed",
            &["origin", "dimensions", "heights"],
        )
        .await
    }

    pub async fn get_player_context(&self, reach: f64) -> Result<Value> {
        self.derived(
            kinds::PLAYER_CONTEXT,
            json!({ "reach": reach }),
            "Player context failed",
            &["position", "rotation"],
        )
        .await
    }

    pub async fn get_nearby_entities(&self, radius: f64) -> Result<Value> {
        self.derived(
            kinds::PLAYER_ENTITIES,
            json!({ "radius": radius }),
            "Nearby entities failed",
            &[],
        )
        .await
    }

    pub async fn analyze_palette(&self, x: i64, y: i64, z: i64, radius: i64) -> Result<Value> {
        self.derived(
            kinds::PALETTE_ANALYZE,
            json!({ "x": x, "y": y, "z": z, "radius": radius }),
            "Palette analysis failed",
            &[],
        )
        .await
    }

    pub async fn analyze_palette_region(&self, region: Region) -> Result<Value> {
        self.derived(
            kinds::PALETTE_REGION,
            region.payload(),
            "Palette region failed",
            &[],
        )
        .await
    }

    pub async fn analyze_lighting(&self, region: Region, resolution: i64) -> Result<Value> {
        let mut payload = region.payload();
        payload["resolution"] = json!(resolution);
        self.derived(kinds::LIGHT_ANALYZE, payload, "Light analysis failed", &[])
            .await
    }

    pub async fn check_symmetry(
        &self,
        region: Region,
        axis: &str,
        tolerance: i64,
        resolution: i64,
    ) -> Result<Value> {
        let mut payload = region.payload();
        payload["axis"] = json!(axis);
        payload["tolerance"] = json!(tolerance);
        payload["resolution"] = json!(resolution);
        self.derived(kinds::SYMMETRY_CHECK, payload, "Symmetry check failed", &[])
            .await
    }
}

#[async_trait]
impl CommandExecutor for ClientBridge {
    async fn execute_command(&self, command: &str) -> Result<String> {
        ClientBridge::execute_command(self, command).await
    }
}

/// Axis-aligned box given by two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x1: i64,
    pub y1: i64,
    pub z1: i64,
    pub x2: i64,
    pub y2: i64,
    pub z2: i64,
}

impl Region {
    pub fn new(x1: i64, y1: i64, z1: i64, x2: i64, y2: i64, z2: i64) -> Self {
        Self { x1, y1, z1, x2, y2, z2 }
    }

    fn payload(&self) -> Value {
        json!({
            "x1": self.x1, "y1": self.y1, "z1": self.z1,
            "x2": self.x2, "y2": self.y2, "z2": self.z2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockReply};

    fn bridge_with(mock: Arc<MockConnector>) -> ClientBridge {
        ClientBridge::new(mock, &BridgeConfig::default(), WorldEditConfig::default())
    }

    #[tokio::test]
    async fn test_request_carries_token_and_hex_id() {
        let mock = Arc::new(MockConnector::echo());
        let config = BridgeConfig {
            token: Some(Secret::new("hunter2".to_owned())),
            ..BridgeConfig::default()
        };
        let bridge = ClientBridge::new(mock.clone(), &config, WorldEditConfig::default());

        let response = bridge.request("server.info", json!({})).await.unwrap();
        assert!(response.ok);

        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["token"], "hunter2");
        let id = sent[0]["id"].as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(response.id.as_deref(), Some(id));
    }

    #[tokio::test]
    async fn test_execute_command_normalizes_and_stringifies() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            let command = request["payload"]["command"].as_str().unwrap_or_default();
            vec![MockReply::json(json!({
                "id": request["id"],
                "ok": true,
                "result": {"echo": command}
            }))]
        }));
        let bridge = bridge_with(mock.clone());

        let output = bridge.execute_command("  time set day ").await.unwrap();
        assert_eq!(output, r#"{"echo":"/time set day"}"#);
    }

    #[tokio::test]
    async fn test_peer_failure_is_protocol_error_and_keeps_connection() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            vec![MockReply::json(json!({"id": request["id"], "ok": false}))]
        }));
        let bridge = bridge_with(mock.clone());

        let err = bridge.execute_command("/bogus").await.unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Command failed");
        let err = bridge.capture_screenshot(1920, 1080).await.unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Screenshot failed");
        assert_eq!(mock.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_handshake_stores_capabilities_only_when_present() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            vec![MockReply::json(json!({
                "id": request["id"],
                "ok": true,
                "result": {
                    "client": "fabric",
                    "version": "0.3.1",
                    "minecraft": "1.21.1",
                    "enabled": true,
                    "allow_ai_control": true,
                    "capabilities": {"worldedit": {"available": true, "version": "7.3.0"}}
                }
            }))]
        }));
        let bridge = bridge_with(mock);

        let handshake = bridge.handshake().await.unwrap();
        assert!(handshake.ok);
        assert_eq!(handshake.hello.unwrap().client, "fabric");
        assert_eq!(bridge.capabilities()["worldedit"]["available"], true);
    }

    #[tokio::test]
    async fn test_handshake_without_capabilities_keeps_snapshot() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            vec![MockReply::json(json!({"id": request["id"], "ok": true, "result": "hi"}))]
        }));
        let bridge = bridge_with(mock);
        *bridge.capabilities.write().unwrap() = json!({"worldedit": false});

        let handshake = bridge.handshake().await.unwrap();
        assert!(handshake.hello.is_none());
        assert!(handshake.capabilities.is_none());
        assert_eq!(bridge.capabilities(), json!({"worldedit": false}));
    }

    #[tokio::test]
    async fn test_detect_worldedit_version() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            vec![MockReply::json(json!({
                "id": request["id"],
                "ok": true,
                "result": "WorldEdit version 7.3.4+6801-b8a5e5d"
            }))]
        }));
        let bridge = bridge_with(mock);
        assert_eq!(bridge.detect_worldedit_version().await.as_deref(), Some("7.3.4"));
    }

    #[tokio::test]
    async fn test_server_info_falls_back_to_commands() {
        let mock = Arc::new(MockConnector::new(|request: &Value| {
            if request["type"] == "server.info" {
                return vec![MockReply::json(json!({"id": request["id"], "ok": false, "error": "Unknown message type"}))];
            }
            let command = request["payload"]["command"].as_str().unwrap_or_default();
            let result = match command {
                "/list" => "There are 1 of a max of 20 players online: Steve",
                "/difficulty" => "The difficulty is Normal",
                _ => return vec![MockReply::json(json!({"id": request["id"], "ok": false}))],
            };
            vec![MockReply::json(json!({"id": request["id"], "ok": true, "result": result}))]
        }));
        let bridge = bridge_with(mock);

        let info = bridge.server_info().await;
        assert_eq!(info["players"], "There are 1 of a max of 20 players online: Steve");
        assert_eq!(info["time"], "Unable to retrieve time");
        assert_eq!(info["difficulty"], "The difficulty is Normal");
    }

    #[tokio::test]
    async fn test_derived_payloads() {
        let mock = Arc::new(MockConnector::echo());
        let bridge = bridge_with(mock.clone());

        bridge
            .scan_region(Region::new(0, 60, 0, 4, 64, 4), true)
            .await
            .unwrap();
        bridge
            .check_symmetry(Region::new(0, 60, 0, 4, 64, 4), "z", 1, 2)
            .await
            .unwrap();
        bridge.get_heightmap(-5, -5, 5, 5).await.unwrap();

        let sent = mock.sent();
        assert_eq!(sent[0]["type"], "region.scan");
        assert_eq!(sent[0]["payload"]["include_states"], true);
        assert_eq!(sent[0]["payload"]["y2"], 64);
        assert_eq!(sent[1]["type"], "symmetry.check");
        assert_eq!(sent[1]["payload"]["axis"], "z");
        assert_eq!(sent[2]["payload"], json!({"x1": -5, "z1": -5, "x2": 5, "z2": 5}));
    }
}
