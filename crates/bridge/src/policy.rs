//! Command normalization and WorldEdit capability gating.

use serde_json::Value;

use vibecraft_core::config::{WorldEditConfig, WorldEditFallback, WorldEditMode};
use vibecraft_core::{Error, Result};

/// Command roots that belong to WorldEdit even when written with one slash.
pub const WORLDEDIT_VERBS: &[&str] = &[
    // need a world context
    "pos1", "pos2", "set", "replace", "copy", "paste", "undo", "redo", "expand", "contract",
    "sphere", "cyl", "walls", "faces", "hollow", "smooth", "distr", "count", "generate",
    "deform", "flora", "forest", "gmask", "sel",
    // everything else
    "hpos1", "hpos2", "size", "overlay", "center", "line", "curve", "move", "stack", "cut",
    "rotate", "flip", "wand", "schem", "schematic", "snapshot", "snap", "biomelist",
    "biomeinfo", "setbiome", "chunkinfo", "listchunks", "delchunks", "clearhistory", "br",
    "brush", "tool", "forestgen", "drain", "fixwater", "fixlava", "naturalize", "pyramid",
    "hpyramid", "hsphere", "hcyl",
];

/// Trim and make sure the command carries a leading slash.
pub fn normalize_command(command: &str) -> String {
    let trimmed = command.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{}", trimmed)
    }
}

/// Whether a normalized command targets WorldEdit.
pub fn is_worldedit_command(command: &str) -> bool {
    if command.starts_with("//") {
        return true;
    }
    if !command.starts_with('/') {
        return false;
    }
    let verb = command
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    WORLDEDIT_VERBS.contains(&verb.as_str())
}

/// WorldEdit availability from a capabilities snapshot; `None` when not reported.
pub fn worldedit_available(capabilities: &Value) -> Option<bool> {
    match capabilities.get("worldedit")? {
        Value::Bool(flag) => Some(*flag),
        Value::Object(report) => report.get("available").and_then(Value::as_bool),
        _ => None,
    }
}

/// Reject WorldEdit commands the configuration or the peer does not allow.
pub fn enforce_worldedit_policy(
    command: &str,
    config: &WorldEditConfig,
    available: Option<bool>,
) -> Result<()> {
    if !is_worldedit_command(command) {
        return Ok(());
    }

    match config.mode {
        WorldEditMode::Off => Err(Error::protocol("WorldEdit is disabled by configuration.")),
        WorldEditMode::Force if available != Some(true) => Err(Error::protocol(
            "WorldEdit is required but not available for this player.",
        )),
        WorldEditMode::Auto
            if available == Some(false) && config.fallback == WorldEditFallback::Disable =>
        {
            Err(Error::protocol(
                "WorldEdit is unavailable and fallback is disabled.",
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(mode: WorldEditMode, fallback: WorldEditFallback) -> WorldEditConfig {
        WorldEditConfig { mode, fallback }
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("  list "), "/list");
        assert_eq!(normalize_command("/time set day"), "/time set day");
        assert_eq!(normalize_command("//set stone"), "//set stone");
        assert_eq!(normalize_command("   "), "");
    }

    #[test]
    fn test_worldedit_detection() {
        assert!(is_worldedit_command("//set stone"));
        assert!(is_worldedit_command("/pos1 0,64,0"));
        assert!(is_worldedit_command("/UNDO"));
        assert!(!is_worldedit_command("/setblock 0 64 0 stone"));
        assert!(!is_worldedit_command("/list"));
        assert!(!is_worldedit_command("set stone"));
    }

    #[test]
    fn test_availability_shapes() {
        assert_eq!(worldedit_available(&json!({"worldedit": true})), Some(true));
        assert_eq!(
            worldedit_available(&json!({"worldedit": {"available": false, "reason": "missing"}})),
            Some(false)
        );
        assert_eq!(worldedit_available(&json!({"worldedit": "yes"})), None);
        assert_eq!(worldedit_available(&json!({})), None);
    }

    #[test]
    fn test_off_always_rejects() {
        let off = config(WorldEditMode::Off, WorldEditFallback::Warn);
        for available in [None, Some(true), Some(false)] {
            let err = enforce_worldedit_policy("//set stone", &off, available).unwrap_err();
            assert_eq!(err.to_string(), "Protocol error: WorldEdit is disabled by configuration.");
        }
        assert!(enforce_worldedit_policy("/list", &off, None).is_ok());
    }

    #[test]
    fn test_force_requires_reported_availability() {
        let force = config(WorldEditMode::Force, WorldEditFallback::Warn);
        assert!(enforce_worldedit_policy("//set stone", &force, Some(true)).is_ok());
        assert!(enforce_worldedit_policy("//set stone", &force, None).is_err());
        assert!(enforce_worldedit_policy("//set stone", &force, Some(false)).is_err());
    }

    #[test]
    fn test_auto_only_rejects_explicit_unavailability_with_disable() {
        let warn = config(WorldEditMode::Auto, WorldEditFallback::Warn);
        let disable = config(WorldEditMode::Auto, WorldEditFallback::Disable);
        assert!(enforce_worldedit_policy("//set stone", &warn, Some(false)).is_ok());
        assert!(enforce_worldedit_policy("//set stone", &disable, None).is_ok());
        assert!(enforce_worldedit_policy("//set stone", &disable, Some(true)).is_ok());
        assert!(enforce_worldedit_policy("//set stone", &disable, Some(false)).is_err());
    }
}
