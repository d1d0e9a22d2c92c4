//! Schematic input normalization.
//!
//! Accepts both the compact and the verbose schematic formats and reduces
//! them to a [`Schematic`] whose layers are plain symbol grids:
//!
//! ```text
//! {"a": [0,64,0], "p": {"S": "stone"}, "l": [["0-2", "S*3|S . S~2|S*3"]]}
//! {"anchor": [0,64,0], "palette": {...}, "layers": [{"y": 0, "grid": [["S", ...]]}]}
//! {"a": [0,64,0], "p": {"S": "stone"}, "s": "box:10x5x8:S"}
//! ```
//!
//! Every expansion is charged against [`ExpansionLimits`] before anything
//! is allocated, so a short input can never demand an unbounded grid.

use std::ops::RangeInclusive;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use vibecraft_core::config::SchematicConfig;
use vibecraft_core::{Error, Result};

/// Row-major symbol grid; `grid[z][x]`.
pub type Grid = Vec<Vec<String>>;

/// Symbol every generated interior uses.
const AIR: &str = ".";

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub y: i64,
    pub grid: Grid,
}

/// How large a schematic may become once compact syntax is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionLimits {
    pub max_cells: usize,
    pub max_layers: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self::from(&SchematicConfig::default())
    }
}

impl From<&SchematicConfig> for ExpansionLimits {
    fn from(config: &SchematicConfig) -> Self {
        Self {
            max_cells: config.max_cells,
            max_layers: config.max_layers,
        }
    }
}

/// Running totals for one normalization. An empty row counts as one cell.
struct Budget {
    limits: ExpansionLimits,
    cells: usize,
    layers: usize,
}

impl Budget {
    fn new(limits: ExpansionLimits) -> Self {
        Self {
            limits,
            cells: 0,
            layers: 0,
        }
    }

    fn cells(&mut self, n: usize) -> Result<()> {
        self.cells = self.cells.saturating_add(n);
        if self.cells > self.limits.max_cells {
            return Err(Error::SchematicCompile(vec![format!(
                "Schematic expands to more than {} cells",
                self.limits.max_cells
            )]));
        }
        Ok(())
    }

    fn layers(&mut self, n: usize) -> Result<()> {
        self.layers = self.layers.saturating_add(n);
        if self.layers > self.limits.max_layers {
            return Err(Error::SchematicCompile(vec![format!(
                "Schematic expands to more than {} layers",
                self.limits.max_layers
            )]));
        }
        Ok(())
    }
}

fn row_cells(row: &[String]) -> usize {
    row.len().max(1)
}

fn grid_cells(grid: &Grid) -> usize {
    grid.iter()
        .map(|row| row_cells(row))
        .fold(0, usize::saturating_add)
}

/// Python-style repetition count: negative means none.
fn repeat_count(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

/// Schematic with long key names and fully expanded layers.
#[derive(Debug, Clone, Default)]
pub struct Schematic {
    pub anchor: Option<Value>,
    pub facing: Option<Value>,
    pub mode: Option<Value>,
    /// User palette in key order.
    pub palette: Vec<(String, String)>,
    pub layers: Vec<Layer>,
}

impl Schematic {
    /// Normalize a JSON schematic under the default limits.
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::from_value_with_limits(value, ExpansionLimits::default())
    }

    /// Fails on a non-object or when expansion would exceed `limits`;
    /// everything else is judged by the compiler.
    pub fn from_value_with_limits(value: &Value, limits: ExpansionLimits) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(Error::invalid_request("Schematic must be a JSON object"));
        };
        normalize(object, &mut Budget::new(limits))
    }
}

fn long_key(key: &str) -> &str {
    match key {
        "a" => "anchor",
        "p" => "palette",
        "l" => "layers",
        "f" => "facing",
        "m" => "mode",
        "s" => "shape",
        other => other,
    }
}

fn normalize(object: &Map<String, Value>, budget: &mut Budget) -> Result<Schematic> {
    let mut long = Map::new();
    for (key, value) in object {
        long.insert(long_key(key).to_string(), value.clone());
    }

    let layers = match (long.get("layers"), long.get("shape")) {
        (Some(layers), _) => expand_layers(layers, budget)?,
        (None, Some(Value::String(shape))) => shape_layers(shape, budget)?.unwrap_or_default(),
        _ => Vec::new(),
    };

    let palette = match long.get("palette") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(symbol, block)| (symbol.clone(), scalar_text(block)))
            .collect(),
        _ => Vec::new(),
    };

    Ok(Schematic {
        anchor: long.get("anchor").cloned(),
        facing: long.get("facing").cloned(),
        mode: long.get("mode").cloned(),
        palette,
        layers,
    })
}

fn expand_layers(layers: &Value, budget: &mut Budget) -> Result<Vec<Layer>> {
    let Value::Array(layers) = layers else {
        return Ok(Vec::new());
    };
    let mut expanded = Vec::new();
    for layer in layers {
        match layer {
            Value::Array(pair) if pair.len() == 2 && pair[1].is_string() => {
                let grid = match pair[1].as_str() {
                    Some(text) => parse_rows(text, budget)?,
                    None => Vec::new(),
                };
                let ys = parse_y_range(&pair[0]);
                let copies = span(&ys);
                budget.layers(copies)?;
                budget.cells(grid_cells(&grid).saturating_mul(copies.saturating_sub(1)))?;
                for y in ys {
                    expanded.push(Layer {
                        y,
                        grid: grid.clone(),
                    });
                }
            }
            Value::Object(map) if map.contains_key("rows") => {
                budget.layers(1)?;
                expanded.push(Layer {
                    y: offset(map.get("y")),
                    grid: rows_grid(map.get("rows"), budget)?,
                });
            }
            Value::Object(map) => {
                budget.layers(1)?;
                let grid = verbose_grid(map.get("grid"));
                budget.cells(grid_cells(&grid))?;
                expanded.push(Layer {
                    y: offset(map.get("y")),
                    grid,
                });
            }
            // Unrecognized layers keep their slot but place nothing.
            _ => {
                budget.layers(1)?;
                expanded.push(Layer {
                    y: 0,
                    grid: Vec::new(),
                });
            }
        }
    }
    Ok(expanded)
}

fn offset(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).unwrap_or(0)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn verbose_grid(grid: Option<&Value>) -> Grid {
    let Some(Value::Array(rows)) = grid else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(scalar_text).collect(),
            Value::String(s) => s.chars().map(String::from).collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn rows_grid(rows: Option<&Value>, budget: &mut Budget) -> Result<Grid> {
    let Some(Value::Array(rows)) = rows else {
        return Ok(Vec::new());
    };
    let mut grid = Vec::new();
    for row in rows {
        match row {
            Value::String(s) => push_repeated_row(&mut grid, s, budget)?,
            Value::Array(cells) => {
                let cells: Vec<String> = cells.iter().map(scalar_text).collect();
                budget.cells(row_cells(&cells))?;
                grid.push(cells);
            }
            Value::Object(map) if map.contains_key("r") => {
                let pattern = map.get("r").and_then(Value::as_str).unwrap_or("");
                let count = map.get("n").and_then(Value::as_i64).map_or(1, repeat_count);
                push_copies(&mut grid, expand_rle_row(pattern, budget)?, count, budget)?;
            }
            _ => {}
        }
    }
    Ok(grid)
}

// =============================================================================
// Row syntax
// =============================================================================

/// Expand `"S*3 P . G*2"` into `["S","S","S","P",".","G","G"]`.
/// A run with an unreadable count is a single cell; a negative one is none.
fn expand_rle_row(row: &str, budget: &mut Budget) -> Result<Vec<String>> {
    let mut cells = Vec::new();
    for token in row.split_whitespace() {
        match token.split_once('*') {
            Some((symbol, count)) => {
                let count = count.parse::<i64>().map_or(1, repeat_count);
                budget.cells(count)?;
                cells.extend(std::iter::repeat(symbol.to_string()).take(count));
            }
            None => {
                budget.cells(1)?;
                cells.push(token.to_string());
            }
        }
    }
    if cells.is_empty() {
        budget.cells(1)?;
    }
    Ok(cells)
}

/// The row itself was charged when it was expanded.
fn push_copies(grid: &mut Grid, row: Vec<String>, count: usize, budget: &mut Budget) -> Result<()> {
    budget.cells(row_cells(&row).saturating_mul(count.saturating_sub(1)))?;
    for _ in 0..count {
        grid.push(row.clone());
    }
    Ok(())
}

/// `pattern~N` adds the expanded pattern N times; anything else adds it once.
fn push_repeated_row(grid: &mut Grid, row: &str, budget: &mut Budget) -> Result<()> {
    match row.rsplit_once('~') {
        Some((pattern, count)) => {
            let count = count.trim().parse::<i64>().map_or(1, repeat_count);
            let expanded = expand_rle_row(pattern.trim(), budget)?;
            push_copies(grid, expanded, count, budget)
        }
        None => {
            grid.push(expand_rle_row(row, budget)?);
            Ok(())
        }
    }
}

/// A compact layer string: either a 2D shape primitive or `row|row|...`.
fn parse_rows(text: &str, budget: &mut Budget) -> Result<Grid> {
    if let Some(grid) = shape_grid(text, budget)? {
        return Ok(grid);
    }
    let mut grid = Vec::new();
    for row in text.split('|').map(str::trim).filter(|r| !r.is_empty()) {
        push_repeated_row(&mut grid, row, budget)?;
    }
    Ok(grid)
}

/// `5`, `"5"` or an inclusive `"1-3"`. Anything else is offset 0.
fn parse_y_range(spec: &Value) -> RangeInclusive<i64> {
    let single = |y: i64| y..=y;
    match spec {
        Value::Number(n) => single(n.as_i64().unwrap_or(0)),
        Value::String(s) => match s.split_once('-') {
            Some((start, end)) => match (start.trim().parse::<i64>(), end.trim().parse::<i64>()) {
                (Ok(start), Ok(end)) => start..=end,
                _ => single(0),
            },
            None => single(s.trim().parse().unwrap_or(0)),
        },
        _ => single(0),
    }
}

fn span(range: &RangeInclusive<i64>) -> usize {
    if range.is_empty() {
        return 0;
    }
    let width = i128::from(*range.end()) - i128::from(*range.start()) + 1;
    usize::try_from(width).unwrap_or(usize::MAX)
}

// =============================================================================
// Shape primitives
// =============================================================================

fn shape_2d_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(fill|outline|frame|walls):(\d+)x(\d+):([A-Za-z_][A-Za-z0-9_]*)(?::([A-Za-z_][A-Za-z0-9_]*))?$",
            )
            .ok()
        })
        .as_ref()
}

fn shape_3d_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(box|room):(\d+)x(\d+)x(\d+):([A-Za-z_][A-Za-z0-9_]*)(?::([A-Za-z_][A-Za-z0-9_]*))?$",
            )
            .ok()
        })
        .as_ref()
}

fn solid(width: usize, depth: usize, symbol: &str) -> Grid {
    vec![vec![symbol.to_string(); width]; depth]
}

/// Border of `edge` around a `fill` interior.
fn ring(width: usize, depth: usize, edge: &str, fill: &str) -> Grid {
    (0..depth)
        .map(|z| {
            if z == 0 || z + 1 == depth {
                vec![edge.to_string(); width]
            } else {
                let mut row = vec![fill.to_string(); width];
                row[0] = edge.to_string();
                row[width - 1] = edge.to_string();
                row
            }
        })
        .collect()
}

/// `fill:WxD:S`, `outline:WxD:S`, `walls:WxD:S` or `frame:WxD:S:I`.
fn shape_grid(text: &str, budget: &mut Budget) -> Result<Option<Grid>> {
    let Some(caps) = shape_2d_pattern().and_then(|p| p.captures(text.trim())) else {
        return Ok(None);
    };
    let (Ok(width), Ok(depth)) = (caps[2].parse::<usize>(), caps[3].parse::<usize>()) else {
        return Ok(None);
    };
    if width < 1 || depth < 1 {
        return Ok(None);
    }
    budget.cells(width.saturating_mul(depth))?;
    let edge = &caps[4];
    let grid = match &caps[1] {
        "fill" => solid(width, depth, edge),
        "frame" => ring(
            width,
            depth,
            edge,
            caps.get(5).map_or(AIR, |m| m.as_str()),
        ),
        _ => ring(width, depth, edge, AIR),
    };
    Ok(Some(grid))
}

/// `box:WxHxD:S` or `room:WxHxD:S:F`: solid floor, hollow walls and a
/// solid ceiling.
fn shape_layers(text: &str, budget: &mut Budget) -> Result<Option<Vec<Layer>>> {
    let Some(caps) = shape_3d_pattern().and_then(|p| p.captures(text.trim())) else {
        return Ok(None);
    };
    let (Ok(width), Ok(height), Ok(depth)) = (
        caps[2].parse::<usize>(),
        caps[3].parse::<usize>(),
        caps[4].parse::<usize>(),
    ) else {
        return Ok(None);
    };
    if width < 1 || height < 1 || depth < 1 {
        return Ok(None);
    }
    budget.layers(height)?;
    budget.cells(width.saturating_mul(depth).saturating_mul(height))?;
    let top = i64::try_from(height - 1).unwrap_or(i64::MAX);
    let wall = &caps[5];
    let floor = caps.get(6).map_or(wall, |m| m.as_str());

    let mut layers = vec![Layer {
        y: 0,
        grid: solid(width, depth, floor),
    }];
    if top > 1 {
        let walls = ring(width, depth, wall, AIR);
        layers.extend((1..top).map(|y| Layer {
            y,
            grid: walls.clone(),
        }));
    }
    if top > 0 {
        layers.push(Layer {
            y: top,
            grid: solid(width, depth, wall),
        });
    }
    Ok(Some(layers))
}
