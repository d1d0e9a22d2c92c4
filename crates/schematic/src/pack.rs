//! Greedy box packing of `/setblock` commands.
//!
//! Placements of the same block are merged into axis-aligned boxes: from
//! each unused cell (in y, z, x order) grow along X, then the whole row
//! along Z, then the whole plane along Y. The result is not globally
//! minimal but places exactly the same cells.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// World position `(x, y, z)`.
pub type Pos = (i64, i64, i64);

fn setblock_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^/setblock\s+(-?\d+)\s+(-?\d+)\s+(-?\d+)\s+(.+)$").ok())
        .as_ref()
}

/// A parsed `/setblock x y z block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub pos: Pos,
    pub block: String,
}

impl Placement {
    pub fn parse(command: &str) -> Option<Self> {
        let caps = setblock_pattern()?.captures(command)?;
        Some(Self {
            pos: (
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            ),
            block: caps[4].to_string(),
        })
    }
}

/// Pack placements into `/fill` boxes. Commands that are not plain
/// `/setblock` lines come first, in their original order.
pub fn optimize_commands(commands: Vec<String>) -> Vec<String> {
    if commands.len() < 2 {
        return commands;
    }

    let mut optimized = Vec::new();
    // Groups in order of first appearance.
    let mut groups: Vec<(String, Vec<Pos>)> = Vec::new();
    for command in commands {
        match Placement::parse(&command) {
            Some(Placement { pos, block }) => {
                match groups.iter_mut().find(|(b, _)| *b == block) {
                    Some((_, positions)) => positions.push(pos),
                    None => groups.push((block, vec![pos])),
                }
            }
            None => optimized.push(command),
        }
    }

    for (block, positions) in groups {
        for (min, max) in pack_group(positions) {
            if min == max {
                optimized.push(format!("/setblock {} {} {} {}", min.0, min.1, min.2, block));
            } else {
                optimized.push(format!(
                    "/fill {} {} {} {} {} {} {}",
                    min.0, min.1, min.2, max.0, max.1, max.2, block
                ));
            }
        }
    }
    optimized
}

/// Boxes (min corner, max corner) covering `positions` exactly.
fn pack_group(mut positions: Vec<Pos>) -> Vec<(Pos, Pos)> {
    let present: HashSet<Pos> = positions.iter().copied().collect();
    let mut used: HashSet<Pos> = HashSet::new();
    positions.sort_by_key(|&(x, y, z)| (y, z, x));

    let free = |used: &HashSet<Pos>, p: Pos| present.contains(&p) && !used.contains(&p);

    let mut boxes = Vec::new();
    for (x1, y1, z1) in positions {
        if used.contains(&(x1, y1, z1)) {
            continue;
        }

        // Growth stops at the edge of the coordinate range.
        let mut x2 = x1;
        while let Some(next) = x2.checked_add(1).filter(|&x| free(&used, (x, y1, z1))) {
            x2 = next;
        }

        let mut z2 = z1;
        while let Some(next) = z2
            .checked_add(1)
            .filter(|&z| (x1..=x2).all(|x| free(&used, (x, y1, z))))
        {
            z2 = next;
        }

        let mut y2 = y1;
        while let Some(next) = y2
            .checked_add(1)
            .filter(|&y| (z1..=z2).all(|z| (x1..=x2).all(|x| free(&used, (x, y, z)))))
        {
            y2 = next;
        }

        for y in y1..=y2 {
            for z in z1..=z2 {
                for x in x1..=x2 {
                    used.insert((x, y, z));
                }
            }
        }
        boxes.push(((x1, y1, z1), (x2, y2, z2)));
    }
    boxes
}
