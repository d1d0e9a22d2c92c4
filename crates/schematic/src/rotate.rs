//! Quarter-turn rotation of grids and block states.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::layout::Grid;

/// Build orientation. Grids are authored facing north; every other value
/// turns the structure clockwise by whole quarter-turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    #[default]
    North,
    East,
    South,
    West,
}

impl Facing {
    pub const CLOCKWISE: [Facing; 4] = [Facing::North, Facing::East, Facing::South, Facing::West];

    pub fn as_str(self) -> &'static str {
        match self {
            Facing::North => "north",
            Facing::East => "east",
            Facing::South => "south",
            Facing::West => "west",
        }
    }

    /// Clockwise quarter-turns from north.
    pub fn steps(self) -> usize {
        self as usize
    }

    fn turned(self, steps: usize) -> Facing {
        Self::CLOCKWISE[(self.steps() + steps) % 4]
    }
}

impl FromStr for Facing {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::CLOCKWISE
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn `grid` clockwise `steps` times. Short rows are padded with air.
pub fn rotate_grid(grid: &Grid, steps: usize) -> Grid {
    let mut result = grid.clone();
    for _ in 0..steps % 4 {
        let cols = result.first().map_or(0, Vec::len);
        result = (0..cols)
            .map(|col| {
                result
                    .iter()
                    .rev()
                    .map(|row| row.get(col).cloned().unwrap_or_else(|| ".".to_string()))
                    .collect()
            })
            .collect();
    }
    result
}

fn block_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([a-z_:]+)(\[.*?\])?(\{.*\})?$").ok())
        .as_ref()
}

/// Rotate the directional states of `block` (`id[states]{nbt}`) by `steps`
/// clockwise quarter-turns: `facing` cycles, `axis` swaps x and z on odd
/// turns, and sign `rotation` advances 4 per turn. Other states and the NBT
/// are kept as written.
pub fn rotate_block_state(block: &str, steps: usize) -> String {
    let steps = steps % 4;
    if steps == 0 {
        return block.to_string();
    }
    let Some(caps) = block_pattern().and_then(|p| p.captures(block)) else {
        return block.to_string();
    };
    let Some(states) = caps.get(2) else {
        return block.to_string();
    };
    let id = &caps[1];
    let nbt = caps.get(3).map_or("", |m| m.as_str());

    let inner = &states.as_str()[1..states.as_str().len() - 1];
    let mut pairs: Vec<(String, String)> = Vec::new();
    for part in inner.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim().to_string(), value.trim().to_string());
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => pairs.push((key, value)),
        }
    }

    for (key, value) in pairs.iter_mut() {
        match key.as_str() {
            "facing" => {
                if let Ok(facing) = value.parse::<Facing>() {
                    *value = facing.turned(steps).to_string();
                }
            }
            "axis" if steps % 2 == 1 => {
                let swapped = match value.as_str() {
                    "x" => "z",
                    "z" => "x",
                    other => other,
                };
                *value = swapped.to_string();
            }
            "rotation" => {
                if let Ok(rotation) = value.parse::<u64>() {
                    *value = ((rotation % 16 + 4 * steps as u64) % 16).to_string();
                }
            }
            _ => {}
        }
    }

    let states = if pairs.is_empty() {
        String::new()
    } else {
        let joined: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("[{}]", joined.join(","))
    };
    format!("{}{}{}", id, states, nbt)
}
