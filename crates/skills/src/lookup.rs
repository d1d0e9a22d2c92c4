//! Lookup helpers: block names, where the player stands, where the ground
//! is, and whether a WorldEdit mask reads correctly.

use serde_json::{json, Value};
use tracing::info;

use vibecraft_core::{Error, Result, ToolOutput};
use vibecraft_schematic::BlockCatalog;

use crate::args::{SearchItemArgs, SurfaceLevelArgs, ValidateMaskArgs};
use crate::context::SkillContext;

const MAX_SEARCH_RESULTS: i64 = 50;

/// Suggestions offered when a search finds nothing.
const SEARCH_SUGGESTIONS: usize = 5;

/// Ray-cast distance for "looking at".
const TARGET_REACH: f64 = 5.0;

// =============================================================================
// Block search
// =============================================================================

fn usage_hint(name: &str) -> Option<&'static str> {
    let hint = if name.contains("concrete") {
        "Modern builds, clean aesthetic"
    } else if name.contains("stone_brick") {
        "Medieval, refined builds"
    } else if name.contains("cobblestone") {
        "Medieval, rustic, foundations"
    } else if name.contains("plank") {
        "Warm interiors, traditional builds"
    } else if name.contains("glass") {
        "Windows, modern walls, transparency"
    } else if name.contains("terracotta") {
        "Colorful accents, southwestern style"
    } else if name.contains("wool") {
        "Colorful builds, soft textures"
    } else {
        return None;
    };
    Some(hint)
}

pub async fn search_minecraft_item(ctx: &SkillContext, args: SearchItemArgs) -> Result<ToolOutput> {
    let query = args.query.trim().to_lowercase();
    if query.is_empty() {
        return Err(Error::invalid_request("Search query cannot be empty"));
    }
    let limit = args.limit.clamp(1, MAX_SEARCH_RESULTS) as usize;
    let catalog = ctx.compiler.catalog();

    let matches = catalog.search(&query, limit);
    if matches.is_empty() {
        let similar = catalog.find_similar(&query, SEARCH_SUGGESTIONS);
        let mut content = format!("No blocks found matching '{}'", query);
        if !similar.is_empty() {
            content.push_str(&format!(". Similar: {}", similar.join(", ")));
        }
        return Ok(ToolOutput::error(content).with_data(json!({
            "query": query,
            "matches": [],
            "similar": similar,
        })));
    }

    let mut lines = vec![format!(
        "Found {} block(s) matching '{}':",
        matches.len(),
        query
    )];
    let mut items = Vec::with_capacity(matches.len());
    for name in &matches {
        let hint = usage_hint(name);
        match hint {
            Some(hint) => lines.push(format!("- {} (use: {})", name, hint)),
            None => lines.push(format!("- {}", name)),
        }
        items.push(json!({"name": name, "use": hint}));
    }
    let truncated = matches.len() == limit;
    if truncated {
        lines.push(format!("Showing the first {} results; raise 'limit' for more.", limit));
    }

    info!(query = %query, found = matches.len(), "Block search completed");
    Ok(ToolOutput::text(lines.join("\n")).with_data(json!({
        "query": query,
        "matches": items,
        "truncated": truncated,
    })))
}

// =============================================================================
// Player and ground
// =============================================================================

/// Compass direction for a Minecraft yaw (0 = south, 90 = west).
pub fn cardinal(yaw: f64) -> (&'static str, &'static str) {
    let yaw = yaw.rem_euclid(360.0);
    if !(45.0..315.0).contains(&yaw) {
        ("south", "+Z")
    } else if yaw < 135.0 {
        ("west", "-X")
    } else if yaw < 225.0 {
        ("north", "-Z")
    } else {
        ("east", "+X")
    }
}

fn build_points(x: i64, ground: i64, z: i64, key: &str) -> Value {
    json!({
        key: [x, ground, z],
        "foundation": [x, ground.saturating_sub(1), z],
        "elevated": [x, ground.saturating_add(1), z],
    })
}

pub async fn get_player_position(ctx: &SkillContext) -> Result<ToolOutput> {
    let context = ctx.bridge.get_player_context(TARGET_REACH).await?;
    let position = context
        .get("position")
        .ok_or_else(|| Error::protocol("Player context has no position"))?;
    let exact = |key: &str| position.get(key).and_then(Value::as_f64);
    let (Some(x), Some(y), Some(z)) = (exact("x"), exact("y"), exact("z")) else {
        return Err(Error::protocol("Player position is incomplete"));
    };
    let block = |key: &str, fallback: f64| {
        position
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(fallback.floor() as i64)
    };
    let (bx, by, bz) = (block("block_x", x), block("block_y", y), block("block_z", z));

    let angle = |key: &str| {
        context
            .get("rotation")
            .and_then(|r| r.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    let (yaw, pitch) = (angle("yaw"), angle("pitch"));
    let (facing, axis) = cardinal(yaw);
    let target = context.get("target").cloned().unwrap_or(Value::Null);

    let looking_at = match target.get("block").and_then(Value::as_str) {
        Some(block) => format!("{} at {}", block, target.get("position").unwrap_or(&Value::Null)),
        None => "nothing within reach".to_string(),
    };
    let content = format!(
        "Position: {:.2}, {:.2}, {:.2} (block {}, {}, {})\n\
         Rotation: yaw {:.1}, pitch {:.1}, facing {} ({})\n\
         Looking at: {}\n\
         Build on the ground at {},{},{}; foundation at {},{},{}",
        x,
        y,
        z,
        bx,
        by,
        bz,
        yaw,
        pitch,
        facing,
        axis,
        looking_at,
        bx,
        by,
        bz,
        bx,
        by.saturating_sub(1),
        bz
    );

    Ok(ToolOutput::text(content).with_data(json!({
        "position": {"x": x, "y": y, "z": z},
        "block": {"x": bx, "y": by, "z": bz},
        "rotation": {"yaw": yaw, "pitch": pitch},
        "facing": facing,
        "target": target,
        "build_points": build_points(bx, by, bz, "on_ground"),
    })))
}

pub async fn get_surface_level(ctx: &SkillContext, args: SurfaceLevelArgs) -> Result<ToolOutput> {
    let (x, z) = (args.x, args.z);
    let heightmap = ctx.bridge.get_heightmap(x, z, x, z).await?;
    let surface_y = heightmap["heights"][0][0]
        .as_i64()
        .ok_or_else(|| Error::protocol(format!("Heightmap has no height for column {}, {}", x, z)))?;
    let block = heightmap["surface_blocks"][0][0]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    let on_surface = surface_y.saturating_add(1);
    info!(x, z, surface_y, block = %block, "Surface level detected");
    let content = format!(
        "Surface at X={}, Z={}: Y={} ({})\n\
         Build on top at {},{},{}; replace the surface at {},{},{}",
        x, z, surface_y, block, x, on_surface, z, x, surface_y, z
    );
    Ok(ToolOutput::text(content).with_data(json!({
        "x": x,
        "z": z,
        "surface_y": surface_y,
        "block": block,
        "build_points": build_points(x, on_surface, z, "on_surface"),
    })))
}

// =============================================================================
// WorldEdit masks
// =============================================================================

/// What a mask does, and anything wrong with it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MaskReport {
    pub notes: Vec<String>,
    pub problems: Vec<String>,
}

/// Read a WorldEdit mask. Block lists (plain, negated or offset) are
/// checked against `catalog`.
pub fn analyze_mask(mask: &str, catalog: &BlockCatalog) -> MaskReport {
    let mut report = MaskReport::default();

    let (negated, body) = match mask.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, mask),
    };
    if negated {
        report.notes.push("Negation mask (inverted)".into());
    }

    let blocks = if let Some(category) = body.strip_prefix("##") {
        report.notes.push(format!("Block category: {}", category));
        None
    } else if body.starts_with('#') {
        report.notes.push(match body {
            "#existing" => "Special mask: matches all non-air blocks".into(),
            "#solid" => "Special mask: matches solid blocks".into(),
            other => format!("Special mask: {}", other),
        });
        None
    } else if let Some(percent) = body.strip_prefix('%') {
        match percent.parse::<u8>() {
            Ok(p) if p <= 100 => report.notes.push(format!("Random mask: {}% chance", p)),
            _ => report
                .problems
                .push(format!("Random mask needs a whole percentage, got '{}'", percent)),
        }
        None
    } else if body.starts_with('=') {
        report
            .notes
            .push("Expression mask: the expression is evaluated per block".into());
        None
    } else if let Some(rest) = body.strip_prefix('>') {
        report.notes.push("Offset mask: matches blocks above the listed type".into());
        Some(rest)
    } else if let Some(rest) = body.strip_prefix('<') {
        report.notes.push("Offset mask: matches blocks below the listed type".into());
        Some(rest)
    } else {
        report.notes.push("Block mask".into());
        Some(body)
    };

    if let Some(list) = blocks {
        for block in list.split(',').map(str::trim) {
            if block.is_empty() {
                report.problems.push("Empty block in mask list".into());
            } else if let Some(problem) = catalog.explain_invalid(block) {
                report.problems.push(problem);
            }
        }
    }
    report
}

pub async fn validate_mask(ctx: &SkillContext, args: ValidateMaskArgs) -> Result<ToolOutput> {
    let mask = args.mask.trim();
    if mask.is_empty() {
        return Err(Error::invalid_request("Mask cannot be empty"));
    }
    let report = analyze_mask(mask, ctx.compiler.catalog());
    let data = json!({
        "mask": mask,
        "valid": report.problems.is_empty(),
        "notes": report.notes,
        "problems": report.problems,
    });

    if !report.problems.is_empty() {
        let content = format!("Mask '{}' has problems:\n- {}", mask, report.problems.join("\n- "));
        return Ok(ToolOutput::error(content).with_data(data));
    }
    let content = format!(
        "Mask '{}' looks valid.\n{}\nUse it like:\n  //replace {} stone\n  //set stone -m {}",
        mask,
        report.notes.join("\n"),
        mask,
        mask
    );
    Ok(ToolOutput::text(content).with_data(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> BlockCatalog {
        BlockCatalog::from_names(["stone", "dirt", "oak_planks", "grass_block"])
    }

    #[test]
    fn test_cardinal_directions() {
        assert_eq!(cardinal(0.0), ("south", "+Z"));
        assert_eq!(cardinal(-30.0), ("south", "+Z"));
        assert_eq!(cardinal(90.0), ("west", "-X"));
        assert_eq!(cardinal(180.0), ("north", "-Z"));
        assert_eq!(cardinal(-180.0), ("north", "-Z"));
        assert_eq!(cardinal(-90.0), ("east", "+X"));
        assert_eq!(cardinal(720.0 + 44.0), ("south", "+Z"));
    }

    #[test]
    fn test_usage_hints() {
        assert_eq!(usage_hint("white_concrete"), Some("Modern builds, clean aesthetic"));
        assert_eq!(usage_hint("mossy_stone_bricks"), Some("Medieval, refined builds"));
        assert_eq!(usage_hint("spruce_planks"), Some("Warm interiors, traditional builds"));
        assert_eq!(usage_hint("dirt"), None);
    }

    #[test]
    fn test_block_masks_are_checked() {
        let report = analyze_mask("stone,dirt", &catalog());
        assert_eq!(report.notes, vec!["Block mask"]);
        assert!(report.problems.is_empty());

        let report = analyze_mask("!oak_planks", &catalog());
        assert_eq!(report.notes, vec!["Negation mask (inverted)", "Block mask"]);
        assert!(report.problems.is_empty());

        let report = analyze_mask(">grass_block", &catalog());
        assert!(report.notes[0].starts_with("Offset mask: matches blocks above"));

        let report = analyze_mask("stone,stoen", &catalog());
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].starts_with("Invalid block 'stoen'."));

        assert_eq!(analyze_mask("stone,", &catalog()).problems, vec!["Empty block in mask list"]);
    }

    #[test]
    fn test_special_masks() {
        let notes = |mask: &str| analyze_mask(mask, &catalog()).notes;
        assert_eq!(notes("#existing"), vec!["Special mask: matches all non-air blocks"]);
        assert_eq!(notes("##wool"), vec!["Block category: wool"]);
        assert_eq!(notes("%25"), vec!["Random mask: 25% chance"]);
        assert_eq!(
            notes("=y<64"),
            vec!["Expression mask: the expression is evaluated per block"]
        );
        assert_eq!(
            analyze_mask("%half", &catalog()).problems,
            vec!["Random mask needs a whole percentage, got 'half'"]
        );
        assert!(!analyze_mask("%150", &catalog()).problems.is_empty());
    }
}
