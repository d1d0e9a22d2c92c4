//! Tool handlers against the in-memory client mod.

use std::sync::Arc;

use serde_json::{json, Value};

use vibecraft_bridge::{ClientBridge, MockConnector, MockReply};
use vibecraft_core::config::{BridgeConfig, BuildArea, SafetyConfig, SandboxLimits, WorldEditConfig};
use vibecraft_core::{Error, ToolRegistry};
use vibecraft_governance::CommandGuard;
use vibecraft_sandbox::CodeSandbox;
use vibecraft_schematic::SchematicCompiler;
use vibecraft_skills::{build_registry, SkillContext, SkillRegistry, ToolKind};

// =============================================================================
// Helpers
// =============================================================================

/// Answers commands (with a game-side error for anything mentioning
/// "bogus"), reports the player at (10, 64, -5) and grass at Y=71 everywhere.
fn scripted_mod() -> Arc<MockConnector> {
    Arc::new(MockConnector::new(|request: &Value| {
        let id = request["id"].clone();
        let result = match request["type"].as_str() {
            Some("command.execute") => {
                let command = request["payload"]["command"].as_str().unwrap_or_default();
                if command.contains("bogus") {
                    json!("Unknown or incomplete command")
                } else {
                    json!(format!("ok {}", command))
                }
            }
            Some("player.context") => json!({
                "position": {"x": 10.4, "y": 64.0, "z": -4.6, "block_x": 10, "block_y": 64, "block_z": -5},
                "rotation": {"yaw": 0.0, "pitch": 0.0},
                "target": {"type": "block", "block": "minecraft:oak_log", "position": {"x": 10, "y": 64, "z": -3}}
            }),
            Some("region.heightmap") => json!({
                "origin": [request["payload"]["x1"], request["payload"]["z1"]],
                "dimensions": [1, 1],
                "heights": [[71]],
                "surface_blocks": [["minecraft:grass_block"]]
            }),
            _ => json!({}),
        };
        vec![MockReply::json(json!({"id": id, "ok": true, "result": result}))]
    }))
}

fn registry_with(mock: &Arc<MockConnector>, safety: SafetyConfig) -> SkillRegistry {
    let bridge = Arc::new(ClientBridge::new(
        mock.clone(),
        &BridgeConfig::default(),
        WorldEditConfig::default(),
    ));
    let ctx = SkillContext::new(
        bridge,
        CodeSandbox::new(SandboxLimits::default()),
        SchematicCompiler::default(),
        CommandGuard::from_config(&safety).unwrap(),
    );
    build_registry(Arc::new(ctx))
}

fn sent_commands(mock: &MockConnector) -> Vec<String> {
    mock.sent()
        .iter()
        .filter(|m| m["type"] == "command.execute")
        .map(|m| m["payload"]["command"].as_str().unwrap_or_default().to_string())
        .collect()
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_registry_lists_every_tool() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let tools = registry.list();
    assert_eq!(tools.len(), ToolKind::ALL.len());
    assert_eq!(tools[0].name, "execute_command");
    assert!(tools.iter().all(|t| t.parameters["type"] == "object"));
    assert!(registry.get("build_schematic").is_some());

    let err = registry.execute("teleport_everyone", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));
}

#[tokio::test]
async fn test_bad_arguments_are_rejected() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());
    let err = registry
        .execute("scan_region", json!({"x1": 0}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(mock.sent().is_empty());
}

// =============================================================================
// build
// =============================================================================

#[tokio::test]
async fn test_build_collects_failures_and_continues() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry
        .execute(
            "build",
            json!({"commands": ["/setblock 0 64 0 stone", "/bogus", "/setblock 1 64 0 stone"]}),
        )
        .await
        .unwrap();

    assert!(!output.success);
    assert_eq!(sent_commands(&mock).len(), 3);
    let data = output.data.unwrap();
    assert_eq!(data["executed"], 3);
    assert_eq!(data["errors"].as_array().unwrap().len(), 1);
    assert!(output.content.contains("Command 2 failed: /bogus"));
}

#[tokio::test]
async fn test_build_from_script() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let code = "commands = []\nfor x in range(3):\n    commands.append(f'/setblock {x} 70 0 glass')";
    let output = registry.execute("build", json!({ "code": code })).await.unwrap();

    assert!(output.success, "{}", output.content);
    assert_eq!(
        sent_commands(&mock),
        vec![
            "/setblock 0 70 0 glass",
            "/setblock 1 70 0 glass",
            "/setblock 2 70 0 glass",
        ]
    );
    assert!(output.content.contains("Build completed successfully!"));
}

#[tokio::test]
async fn test_build_script_errors_propagate() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let err = registry
        .execute("build", json!({"code": "import os\ncommands = []"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SandboxValidation(_)));
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn test_build_preview_sends_nothing() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let commands: Vec<String> = (0..25).map(|i| format!("/setblock {} 64 0 stone", i)).collect();
    let output = registry
        .execute("build", json!({"commands": commands, "preview_only": true}))
        .await
        .unwrap();

    assert!(mock.sent().is_empty());
    assert!(output.content.contains("Sample Commands (first 20 of 25):"));
    assert!(output.content.contains("Commands: 25 total (0 WorldEdit, 25 vanilla)"));
}

#[tokio::test]
async fn test_build_requires_input() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());
    let err = registry.execute("build", json!({})).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid request: Either 'commands' list or 'code' must be provided"
    );
}

#[tokio::test]
async fn test_guard_blocks_out_of_area_commands() {
    let mock = scripted_mod();
    let safety = SafetyConfig {
        build_area: Some(BuildArea {
            min_x: Some(-10),
            max_x: Some(10),
            ..BuildArea::default()
        }),
        ..SafetyConfig::default()
    };
    let registry = registry_with(&mock, safety);

    let output = registry
        .execute(
            "build",
            json!({"commands": ["/setblock 0 64 0 stone", "/setblock 50 64 0 stone"]}),
        )
        .await
        .unwrap();

    assert_eq!(sent_commands(&mock), vec!["/setblock 0 64 0 stone"]);
    assert!(output
        .content
        .contains("Coordinates (50, 64, 0) are outside the allowed build area"));

    let err = registry
        .execute("execute_command", json!({"command": "/fill -20 0 0 0 0 0 stone"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Governance(_)));
}

// =============================================================================
// build_schematic
// =============================================================================

#[tokio::test]
async fn test_schematic_at_player_is_packed() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry
        .execute(
            "build_schematic",
            json!({"schematic": {"a": "player", "p": {"S": "stone"}, "l": [[0, "S*3"]]}}),
        )
        .await
        .unwrap();

    assert!(output.success, "{}", output.content);
    assert_eq!(sent_commands(&mock), vec!["/fill 10 64 -5 12 64 -5 stone"]);
    assert!(output.content.contains("Commands: 1/1 executed"));
}

#[tokio::test]
async fn test_schematic_from_string_preview() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let schematic = r#"{"a": [0, 64, 0], "p": {"S": "stone"}, "l": [[0, "S*3|S ? S"]]}"#;
    let output = registry
        .execute(
            "build_schematic",
            json!({"schematic": schematic, "preview_only": true, "optimize": false}),
        )
        .await
        .unwrap();

    assert!(mock.sent().is_empty());
    assert!(output.content.contains("Blocks: 5"));
    assert!(output.content.contains("/setblock 2 64 1 stone"));
    assert_eq!(
        output.warnings,
        vec!["Unknown symbol '?' at layer y=0, z=1, x=1"]
    );
}

#[tokio::test]
async fn test_schematic_errors() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let err = registry
        .execute(
            "build_schematic",
            json!({"schematic": {"a": [0, 0, 0], "p": {"S": "stoone_brickz"}, "l": [[0, "S"]]}}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchematicCompile(_)));

    let err = registry
        .execute("build_schematic", json!({"schematic": "{not json"}))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid request: Invalid JSON schematic"));

    let err = registry
        .execute("build_schematic", json!({"schematic": [1, 2, 3]}))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid request: Schematic must be a JSON object");
    assert!(mock.sent().is_empty());
}

// =============================================================================
// Bridge housekeeping
// =============================================================================

#[tokio::test]
async fn test_status_and_inbox() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    registry
        .execute("execute_command", json!({"command": "time set day"}))
        .await
        .unwrap();
    assert_eq!(sent_commands(&mock), vec!["/time set day"]);

    assert!(mock.push(json!({"event": "chat", "message": "hello"})));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let output = registry.execute("drain_inbox", Value::Null).await.unwrap();
    assert_eq!(output.data.unwrap()["count"], 1);

    let output = registry.execute("bridge_status", json!({})).await.unwrap();
    let status = output.data.unwrap();
    assert_eq!(status["connected"], true);
    assert_eq!(status["backoff"]["consecutive_failures"], 0);
}

// =============================================================================
// Lookup helpers
// =============================================================================

#[tokio::test]
async fn test_search_minecraft_item() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry
        .execute("search_minecraft_item", json!({"query": " Oak_Plank "}))
        .await
        .unwrap();
    assert!(output.success);
    let data = output.data.unwrap();
    let names: Vec<&str> = data["matches"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert!(names.contains(&"oak_planks"), "{:?}", names);
    assert!(names.iter().all(|n| n.contains("oak_plank")));
    assert_eq!(data["matches"][0]["use"], "Warm interiors, traditional builds");

    let output = registry
        .execute("search_minecraft_item", json!({"query": "planks", "limit": 0}))
        .await
        .unwrap();
    let data = output.data.unwrap();
    assert_eq!(data["matches"].as_array().unwrap().len(), 1);
    assert_eq!(data["truncated"], true);

    let output = registry
        .execute("search_minecraft_item", json!({"query": "qqqq"}))
        .await
        .unwrap();
    assert!(!output.success);
    assert!(output.content.starts_with("No blocks found matching 'qqqq'"));

    let err = registry
        .execute("search_minecraft_item", json!({"query": "   "}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn test_get_player_position() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry.execute("get_player_position", json!({})).await.unwrap();
    let data = output.data.unwrap();
    assert_eq!(data["block"], json!({"x": 10, "y": 64, "z": -5}));
    assert_eq!(data["facing"], "south");
    assert_eq!(data["build_points"]["on_ground"], json!([10, 64, -5]));
    assert_eq!(data["build_points"]["foundation"], json!([10, 63, -5]));
    assert_eq!(data["target"]["block"], "minecraft:oak_log");
    assert!(output.content.contains("facing south (+Z)"));
    assert!(output.content.contains("minecraft:oak_log"));
}

#[tokio::test]
async fn test_get_surface_level() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry
        .execute("get_surface_level", json!({"x": 7, "z": 9}))
        .await
        .unwrap();
    let data = output.data.unwrap();
    assert_eq!(data["surface_y"], 71);
    assert_eq!(data["block"], "minecraft:grass_block");
    assert_eq!(data["build_points"]["on_surface"], json!([7, 72, 9]));
    assert_eq!(data["build_points"]["foundation"], json!([7, 71, 9]));

    let request = mock
        .sent()
        .into_iter()
        .find(|m| m["type"] == "region.heightmap")
        .unwrap();
    assert_eq!(request["payload"], json!({"x1": 7, "z1": 9, "x2": 7, "z2": 9}));

    let err = registry
        .execute("get_surface_level", json!({"x": 7}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_validate_mask() {
    let mock = scripted_mod();
    let registry = registry_with(&mock, SafetyConfig::default());

    let output = registry
        .execute("validate_mask", json!({"mask": "stone,dirt"}))
        .await
        .unwrap();
    assert!(output.success);
    assert!(output.content.contains("//replace stone,dirt stone"));
    assert_eq!(output.data.unwrap()["valid"], true);

    let output = registry
        .execute("validate_mask", json!({"mask": "!stone,notablockzz"}))
        .await
        .unwrap();
    assert!(!output.success);
    let data = output.data.unwrap();
    assert_eq!(data["valid"], false);
    assert_eq!(data["notes"][0], "Negation mask (inverted)");

    let output = registry
        .execute("validate_mask", json!({"mask": "#existing"}))
        .await
        .unwrap();
    assert!(output.success);

    let err = registry
        .execute("validate_mask", json!({"mask": ""}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(mock.sent().is_empty());
}
