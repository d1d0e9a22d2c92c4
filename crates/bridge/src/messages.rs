//! Wire messages exchanged with the client mod.
//!
//! Requests are `{id, type, token?, payload}`; responses are
//! `{id?, ok, result?, error?}`. Validation here is advisory: the bridge logs
//! mismatches and keeps going, so protocol drift shows up in the logs before
//! it breaks anything.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vibecraft_core::{Error, Result};

/// Message type identifiers understood by the client mod.
pub mod kinds {
    pub const HELLO: &str = "hello";
    pub const SERVER_INFO: &str = "server.info";
    pub const COMMAND_EXECUTE: &str = "command.execute";
    pub const SCREENSHOT_CAPTURE: &str = "screenshot.capture";
    pub const REGION_SCAN: &str = "region.scan";
    pub const REGION_HEIGHTMAP: &str = "region.heightmap";
    pub const PLAYER_CONTEXT: &str = "player.context";
    pub const PLAYER_ENTITIES: &str = "player.entities";
    pub const PALETTE_ANALYZE: &str = "palette.analyze";
    pub const PALETTE_REGION: &str = "palette.region";
    pub const LIGHT_ANALYZE: &str = "light.analyze";
    pub const SYMMETRY_CHECK: &str = "symmetry.check";
}

// =============================================================================
// Envelopes
// =============================================================================

/// Outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RequestEnvelope {
    /// Unique correlation id.
    pub id: String,
    /// Message type identifier.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Message payload.
    #[serde(default)]
    pub payload: Value,
}

fn default_ok() -> bool {
    true
}

/// Incoming response or push message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ResponseEnvelope {
    /// Correlation id; absent on unsolicited pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any other top-level fields (older mods put `capabilities` here).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Decode a message without failing: missing `ok` means success,
    /// odd field types are coerced or dropped.
    pub fn from_message(message: Value) -> Self {
        if let Ok(envelope) = serde_json::from_value::<ResponseEnvelope>(message.clone()) {
            return envelope;
        }
        let field = |name: &str| message.get(name).filter(|v| !v.is_null());
        Self {
            id: field("id").and_then(Value::as_str).map(str::to_owned),
            ok: field("ok").and_then(Value::as_bool).unwrap_or(true),
            result: field("result").cloned(),
            error: field("error").map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            extra: Map::new(),
        }
    }
}

// =============================================================================
// Handshake Types
// =============================================================================

/// WorldEdit availability: a bare flag or a detailed report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum WorldEditCapability {
    Flag(bool),
    Detailed {
        available: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

impl WorldEditCapability {
    pub fn available(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Detailed { available, .. } => *available,
        }
    }
}

/// Feature flags advertised by the client mod.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Capabilities {
    pub worldedit: WorldEditCapability,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub region_snapshot: bool,
}

/// Result of the `hello` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HelloResult {
    /// Client type (e.g. "fabric").
    pub client: String,
    /// Client mod version.
    pub version: String,
    /// Game version.
    #[serde(alias = "minecraft")]
    pub platform_version: String,
    pub enabled: bool,
    /// Whether the player allowed AI-issued commands.
    #[serde(alias = "allow_ai_control")]
    pub privileged_mode_allowed: bool,
    pub capabilities: Capabilities,
}

/// Result of `server.info`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServerInfoResult {
    pub time: String,
    pub difficulty: String,
    pub players: String,
}

// =============================================================================
// Validation
// =============================================================================

/// Check an outgoing request.
pub fn validate_request(request: &RequestEnvelope) -> Result<()> {
    if request.id.is_empty() {
        return Err(Error::protocol("request id must not be empty"));
    }
    if request.message_type.is_empty() {
        return Err(Error::protocol("request type must not be empty"));
    }
    if !request.payload.is_object() {
        return Err(Error::protocol("request payload must be an object"));
    }
    Ok(())
}

/// Strictly decode an incoming response; `ok` must be present.
pub fn validate_response(message: &Value) -> Result<ResponseEnvelope> {
    let object = message
        .as_object()
        .ok_or_else(|| Error::protocol("response must be a JSON object"))?;
    if !object.get("ok").is_some_and(Value::is_boolean) {
        return Err(Error::protocol("response is missing boolean field 'ok'"));
    }
    Ok(serde_json::from_value(message.clone())?)
}

pub fn validate_hello_result(result: &Value) -> Result<HelloResult> {
    Ok(serde_json::from_value(result.clone())?)
}

pub fn validate_capabilities(capabilities: &Value) -> Result<Capabilities> {
    Ok(serde_json::from_value(capabilities.clone())?)
}

pub fn validate_server_info_result(result: &Value) -> Result<ServerInfoResult> {
    Ok(serde_json::from_value(result.clone())?)
}

/// Require `keys` on an object result of `message_type`.
pub fn check_result_shape(message_type: &str, result: &Value, keys: &[&str]) -> Result<()> {
    let object = result
        .as_object()
        .ok_or_else(|| Error::protocol(format!("{} result is not an object", message_type)))?;
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::protocol(format!(
            "{} result is missing {}",
            message_type,
            missing.join(", ")
        )))
    }
}

// =============================================================================
// Schema Export
// =============================================================================

pub fn request_schema() -> Value {
    serde_json::to_value(schema_for!(RequestEnvelope)).unwrap_or(Value::Null)
}

pub fn response_schema() -> Value {
    serde_json::to_value(schema_for!(ResponseEnvelope)).unwrap_or(Value::Null)
}

pub fn hello_result_schema() -> Value {
    serde_json::to_value(schema_for!(HelloResult)).unwrap_or(Value::Null)
}

pub fn capabilities_schema() -> Value {
    serde_json::to_value(schema_for!(Capabilities)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_type_and_skips_missing_token() {
        let request = RequestEnvelope {
            id: "abc".into(),
            message_type: kinds::HELLO.into(),
            token: None,
            payload: json!({}),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded, json!({"id": "abc", "type": "hello", "payload": {}}));
        assert!(validate_request(&request).is_ok());

        let bad = RequestEnvelope {
            id: String::new(),
            ..request
        };
        assert!(validate_request(&bad).is_err());
    }

    #[test]
    fn test_response_defaults_ok_and_keeps_extra_fields() {
        let env = ResponseEnvelope::from_message(json!({
            "id": "x", "result": {"a": 1}, "capabilities": {"worldedit": true}
        }));
        assert!(env.ok);
        assert_eq!(env.result, Some(json!({"a": 1})));
        assert_eq!(env.extra["capabilities"], json!({"worldedit": true}));
        // strict validation wants `ok`
        assert!(validate_response(&json!({"id": "x"})).is_err());
        assert!(validate_response(&json!({"id": "x", "ok": false, "error": "no"})).is_ok());
    }

    #[test]
    fn test_response_lenient_on_bad_types() {
        let env = ResponseEnvelope::from_message(json!({"id": 5, "ok": "yes", "error": {"code": 1}}));
        assert_eq!(env.id, None);
        assert!(env.ok);
        assert_eq!(env.error.as_deref(), Some(r#"{"code":1}"#));
    }

    #[test]
    fn test_hello_accepts_mod_field_names() {
        let hello = validate_hello_result(&json!({
            "client": "fabric",
            "version": "0.3.1",
            "minecraft": "1.21.1",
            "enabled": true,
            "allow_ai_control": false,
            "capabilities": {
                "worldedit": {"available": true, "reason": "mod_detected", "version": "7.3.0"},
                "vision": true
            }
        }))
        .unwrap();
        assert_eq!(hello.platform_version, "1.21.1");
        assert!(!hello.privileged_mode_allowed);
        assert!(hello.capabilities.worldedit.available());
        assert!(!hello.capabilities.region_snapshot);
    }

    #[test]
    fn test_capabilities_flag_form() {
        let caps = validate_capabilities(&json!({"worldedit": false})).unwrap();
        assert_eq!(caps.worldedit, WorldEditCapability::Flag(false));
        assert!(validate_capabilities(&json!({"vision": true})).is_err());
    }

    #[test]
    fn test_result_shape() {
        let ok = json!({"image": "data:", "width": 1, "height": 1});
        assert!(check_result_shape("screenshot.capture", &ok, &["image", "width", "height"]).is_ok());
        let err = check_result_shape("screenshot.capture", &json!({"image": ""}), &["image", "width"])
            .unwrap_err();
        assert!(err.to_string().contains("missing width"));
    }

    #[test]
    fn test_schemas_export() {
        let schema = request_schema();
        assert!(schema["properties"]["type"].is_object());
        assert!(hello_result_schema()["properties"]["capabilities"].is_object());
        assert!(response_schema().is_object());
        assert!(capabilities_schema().is_object());
    }
}
