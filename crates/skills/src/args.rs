//! Tool argument types.
//!
//! Each tool deserializes its JSON arguments into one of these; the same
//! types provide the JSON schema advertised in the tool list.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use vibecraft_bridge::Region;
use vibecraft_core::{Error, Result};

/// Decode tool arguments; a missing body counts as `{}`.
pub fn parse<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| Error::invalid_request(format!("Invalid arguments: {}", e)))
}

/// JSON schema of an argument type.
pub fn schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteCommandArgs {
    /// Game command, with or without the leading slash.
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildArgs {
    /// Commands to run in order; each must start with "/".
    #[serde(default)]
    pub commands: Option<Vec<Value>>,
    /// Script that fills a `commands` list instead.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub preview_only: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildSchematicArgs {
    /// Schematic object, or the same as a JSON string.
    pub schematic: Value,
    #[serde(default)]
    pub preview_only: bool,
    /// Merge adjacent placements into `/fill` commands.
    #[serde(default = "default_true")]
    pub optimize: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotArgs {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

fn default_max_width() -> u32 {
    1920
}

fn default_max_height() -> u32 {
    1080
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct RegionArgs {
    pub x1: i64,
    pub y1: i64,
    pub z1: i64,
    pub x2: i64,
    pub y2: i64,
    pub z2: i64,
}

impl From<RegionArgs> for Region {
    fn from(r: RegionArgs) -> Self {
        Region::new(r.x1, r.y1, r.z1, r.x2, r.y2, r.z2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanRegionArgs {
    #[serde(flatten)]
    pub region: RegionArgs,
    #[serde(default)]
    pub include_states: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeightmapArgs {
    pub x1: i64,
    pub z1: i64,
    pub x2: i64,
    pub z2: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlayerContextArgs {
    /// Ray-cast distance for the targeted block.
    #[serde(default = "default_reach")]
    pub reach: f64,
}

fn default_reach() -> f64 {
    128.0
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NearbyEntitiesArgs {
    #[serde(default = "default_entity_radius")]
    pub radius: f64,
}

fn default_entity_radius() -> f64 {
    32.0
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzePaletteArgs {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    #[serde(default = "default_palette_radius")]
    pub radius: i64,
}

fn default_palette_radius() -> i64 {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeLightingArgs {
    #[serde(flatten)]
    pub region: RegionArgs,
    #[serde(default = "default_light_resolution")]
    pub resolution: i64,
}

fn default_light_resolution() -> i64 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckSymmetryArgs {
    #[serde(flatten)]
    pub region: RegionArgs,
    /// Mirror axis, "x" or "z".
    #[serde(default = "default_axis")]
    pub axis: String,
    #[serde(default)]
    pub tolerance: i64,
    #[serde(default = "default_symmetry_resolution")]
    pub resolution: i64,
}

fn default_axis() -> String {
    "x".to_string()
}

fn default_symmetry_resolution() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchItemArgs {
    /// Part of a block id, e.g. "planks" or "blue".
    pub query: String,
    /// Clamped to 1..=50.
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SurfaceLevelArgs {
    pub x: i64,
    pub z: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidateMaskArgs {
    /// WorldEdit mask, e.g. "stone,dirt", "!air", "#existing" or "%50".
    pub mask: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_null_args() {
        let args: PlayerContextArgs = parse(Value::Null).unwrap();
        assert_eq!(args.reach, 128.0);

        let args: CheckSymmetryArgs =
            parse(json!({"x1": 0, "y1": 0, "z1": 0, "x2": 4, "y2": 4, "z2": 4})).unwrap();
        assert_eq!(args.axis, "x");
        assert_eq!(args.resolution, 1);
        assert_eq!(Region::from(args.region), Region::new(0, 0, 0, 4, 4, 4));

        let args: BuildSchematicArgs = parse(json!({"schematic": {}})).unwrap();
        assert!(args.optimize);
        assert!(!args.preview_only);
    }

    #[test]
    fn test_bad_args_are_invalid_requests() {
        let err = parse::<ExecuteCommandArgs>(json!({"cmd": "/say hi"})).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("missing field `command`"));
    }

    #[test]
    fn test_schema_lists_properties() {
        let schema = schema::<ScanRegionArgs>();
        let properties = &schema["properties"];
        assert!(properties.get("x1").is_some());
        assert!(properties.get("include_states").is_some());
    }
}
