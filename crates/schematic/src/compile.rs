//! Schematic compilation.
//!
//! A normalized [`Schematic`] becomes one `/setblock` per placed cell.
//! Structural problems (anchor, palette, missing layers) fail the whole
//! compile with no commands; per-cell problems become warnings.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use vibecraft_core::{Error, Result};

use crate::catalog::BlockCatalog;
use crate::layout::{ExpansionLimits, Schematic};
use crate::pack::optimize_commands;
use crate::rotate::{rotate_block_state, rotate_grid, Facing};

pub const DEFAULT_ANCHOR: [i64; 3] = [0, 64, 0];

const DEFAULT_PALETTE: &[(&str, &str)] = &[(".", "air"), ("_", "air"), (" ", "air")];

/// Placement mode appended to each `/setblock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceMode {
    #[default]
    Replace,
    Keep,
    Destroy,
}

impl PlaceMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(PlaceMode::Replace),
            "keep" => Some(PlaceMode::Keep),
            "destroy" => Some(PlaceMode::Destroy),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            PlaceMode::Replace => "",
            PlaceMode::Keep => " keep",
            PlaceMode::Destroy => " destroy",
        }
    }
}

/// Result of a successful compile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Compiled {
    pub commands: Vec<String>,
    pub blocks_placed: usize,
    pub layers: usize,
    pub warnings: Vec<String>,
    /// Command count before packing, when packing ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_from: Option<usize>,
}

impl Compiled {
    /// Merge adjacent identical placements into `/fill` boxes.
    pub fn optimize(&mut self) {
        let before = self.commands.len();
        self.commands = optimize_commands(std::mem::take(&mut self.commands));
        self.optimized_from = Some(before);
        debug!(before, after = self.commands.len(), "Packed schematic commands");
    }
}

/// Compiler bound to a block catalog.
#[derive(Debug, Clone, Default)]
pub struct SchematicCompiler {
    catalog: BlockCatalog,
    limits: ExpansionLimits,
}

impl SchematicCompiler {
    pub fn new(catalog: BlockCatalog) -> Self {
        Self {
            catalog,
            limits: ExpansionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Normalize and compile a JSON schematic.
    pub fn compile_value(&self, value: &Value, player: Option<[i64; 3]>) -> Result<Compiled> {
        let schematic = Schematic::from_value_with_limits(value, self.limits)?;
        self.compile(&schematic, player)
    }

    /// `player` is the position used for `"anchor": "player"`.
    pub fn compile(&self, schematic: &Schematic, player: Option<[i64; 3]>) -> Result<Compiled> {
        let mut out = Compiled::default();

        let [ax, ay, az] = resolve_anchor(schematic.anchor.as_ref(), player)
            .map_err(|e| Error::SchematicCompile(vec![e]))?;

        let facing = match &schematic.facing {
            None => Facing::North,
            Some(value) => {
                let text = text_of(value).to_lowercase();
                text.parse::<Facing>().unwrap_or_else(|_| {
                    out.warnings
                        .push(format!("Unknown facing '{}', using 'north'", text));
                    Facing::North
                })
            }
        };
        let steps = facing.steps();

        let mode = match &schematic.mode {
            None => PlaceMode::Replace,
            Some(value) => {
                let text = text_of(value);
                PlaceMode::parse(&text).unwrap_or_else(|| {
                    out.warnings
                        .push(format!("Unknown mode '{}', using 'replace'", text));
                    PlaceMode::Replace
                })
            }
        };

        let errors = self.catalog.validate_palette(
            schematic
                .palette
                .iter()
                .map(|(s, b)| (s.as_str(), b.as_str())),
        );
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Schematic palette rejected");
            return Err(Error::SchematicCompile(errors));
        }

        let mut palette: HashMap<&str, &str> = DEFAULT_PALETTE.iter().copied().collect();
        for (symbol, block) in &schematic.palette {
            palette.insert(symbol.as_str(), block.as_str());
        }

        if schematic.layers.is_empty() {
            return Err(Error::SchematicCompile(vec!["No layers defined".into()]));
        }

        for layer in &schematic.layers {
            if layer.grid.is_empty() {
                continue;
            }
            out.layers += 1;

            let Some(y) = ay.checked_add(layer.y) else {
                return Err(out_of_range(layer.y, 0, 0));
            };

            // Rotation pads every row to the width of the first.
            if steps > 0 {
                let padded = layer.grid[0].len().saturating_mul(layer.grid.len());
                if padded > self.limits.max_cells {
                    return Err(Error::SchematicCompile(vec![format!(
                        "Layer y={} rotates to more than {} cells",
                        layer.y, self.limits.max_cells
                    )]));
                }
            }

            let rotated;
            let grid = if steps > 0 {
                rotated = rotate_grid(&layer.grid, steps);
                &rotated
            } else {
                &layer.grid
            };

            for (z, row) in grid.iter().enumerate() {
                for (x, symbol) in row.iter().enumerate() {
                    if matches!(symbol.as_str(), "." | "_" | " " | "") {
                        continue;
                    }
                    let block = match palette.get(symbol.as_str()) {
                        Some(block) => *block,
                        None if looks_like_block(symbol) => symbol.as_str(),
                        None => {
                            out.warnings.push(format!(
                                "Unknown symbol '{}' at layer y={}, z={}, x={}",
                                symbol, layer.y, z, x
                            ));
                            continue;
                        }
                    };
                    if block == "air" {
                        continue;
                    }
                    let (Some(wx), Some(wz)) = (shift(ax, x), shift(az, z)) else {
                        return Err(out_of_range(layer.y, z, x));
                    };
                    let block = rotate_block_state(block, steps);
                    out.commands.push(format!(
                        "/setblock {} {} {} {}{}",
                        wx,
                        y,
                        wz,
                        block,
                        mode.suffix()
                    ));
                    out.blocks_placed += 1;
                }
            }
        }

        debug!(
            blocks = out.blocks_placed,
            layers = out.layers,
            warnings = out.warnings.len(),
            %facing,
            "Compiled schematic"
        );
        Ok(out)
    }
}

fn shift(origin: i64, offset: usize) -> Option<i64> {
    origin.checked_add(i64::try_from(offset).ok()?)
}

fn out_of_range(y: i64, z: usize, x: usize) -> Error {
    Error::SchematicCompile(vec![format!(
        "Block at layer y={}, z={}, x={} is outside the world coordinate range",
        y, z, x
    )])
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A namespaced id, or letters, digits and underscores only.
fn looks_like_block(symbol: &str) -> bool {
    symbol.contains(':') || {
        let bare: String = symbol.chars().filter(|c| *c != '_').collect();
        !bare.is_empty() && bare.chars().all(char::is_alphanumeric)
    }
}

fn coordinate(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn resolve_anchor(
    anchor: Option<&Value>,
    player: Option<[i64; 3]>,
) -> std::result::Result<[i64; 3], String> {
    let Some(anchor) = anchor else {
        return Ok(DEFAULT_ANCHOR);
    };
    if anchor.as_str() == Some("player") {
        return player.ok_or_else(|| "anchor='player' but no player position available".into());
    }
    let invalid = || format!("Invalid anchor: {}", anchor);
    let Value::Array(parts) = anchor else {
        return Err(invalid());
    };
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut resolved = [0i64; 3];
    for (slot, part) in resolved.iter_mut().zip(parts) {
        *slot = coordinate(part).ok_or_else(invalid)?;
    }
    Ok(resolved)
}
