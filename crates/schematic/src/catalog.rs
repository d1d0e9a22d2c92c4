//! Known block identifiers.
//!
//! Palette entries are checked against this list before anything is
//! compiled. The built-in list covers the common building blocks; a full
//! item dump can be loaded from a JSON file (`[{"name": "stone"}, ...]`).

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use vibecraft_core::config::SchematicConfig;
use vibecraft_core::{Error, Result};

/// How many suggestions a palette error carries.
const PALETTE_SUGGESTIONS: usize = 3;

/// Symbols that always mean air and are never looked up.
const AIR_SYMBOLS: &[&str] = &[".", "_", " "];

const BUILTIN_BLOCKS: &[&str] = &[
    "air", "stone", "granite", "polished_granite", "diorite", "polished_diorite", "andesite",
    "polished_andesite", "deepslate", "cobbled_deepslate", "polished_deepslate",
    "deepslate_bricks", "deepslate_tiles", "calcite", "tuff", "dripstone_block", "grass_block",
    "dirt", "coarse_dirt", "podzol", "rooted_dirt", "mud", "mud_bricks", "packed_mud",
    "dirt_path", "farmland", "cobblestone", "mossy_cobblestone", "bedrock", "sand", "red_sand",
    "gravel", "clay", "snow", "snow_block", "ice", "packed_ice", "blue_ice", "obsidian",
    "crying_obsidian", "netherrack", "soul_sand", "soul_soil", "glowstone", "basalt",
    "polished_basalt", "blackstone", "polished_blackstone", "polished_blackstone_bricks",
    "end_stone", "end_stone_bricks", "purpur_block", "purpur_pillar", "sandstone",
    "chiseled_sandstone", "cut_sandstone", "smooth_sandstone", "red_sandstone",
    "cut_red_sandstone", "smooth_red_sandstone", "stone_bricks", "mossy_stone_bricks",
    "cracked_stone_bricks", "chiseled_stone_bricks", "smooth_stone", "bricks", "nether_bricks",
    "red_nether_bricks", "quartz_block", "smooth_quartz", "quartz_bricks", "quartz_pillar",
    "chiseled_quartz_block", "prismarine", "prismarine_bricks", "dark_prismarine",
    "sea_lantern", "terracotta", "white_terracotta", "orange_terracotta", "red_terracotta",
    "brown_terracotta", "cyan_terracotta", "black_terracotta", "gray_terracotta",
    "oak_log", "spruce_log", "birch_log", "jungle_log", "acacia_log", "dark_oak_log",
    "mangrove_log", "cherry_log", "stripped_oak_log", "stripped_spruce_log",
    "stripped_birch_log", "stripped_dark_oak_log", "oak_wood", "spruce_wood", "birch_wood",
    "oak_planks", "spruce_planks", "birch_planks", "jungle_planks", "acacia_planks",
    "dark_oak_planks", "mangrove_planks", "cherry_planks", "bamboo_planks", "crimson_planks",
    "warped_planks", "oak_leaves", "spruce_leaves", "birch_leaves", "jungle_leaves",
    "acacia_leaves", "dark_oak_leaves", "azalea_leaves", "cherry_leaves", "oak_slab",
    "spruce_slab", "birch_slab", "dark_oak_slab", "stone_slab", "smooth_stone_slab",
    "stone_brick_slab", "cobblestone_slab", "brick_slab", "sandstone_slab", "quartz_slab",
    "oak_stairs", "spruce_stairs", "birch_stairs", "dark_oak_stairs", "stone_stairs",
    "stone_brick_stairs", "cobblestone_stairs", "brick_stairs", "sandstone_stairs",
    "quartz_stairs", "deepslate_brick_stairs", "oak_fence", "spruce_fence", "dark_oak_fence",
    "nether_brick_fence", "oak_fence_gate", "spruce_fence_gate", "cobblestone_wall",
    "stone_brick_wall", "brick_wall", "oak_door", "spruce_door", "birch_door", "dark_oak_door",
    "iron_door", "oak_trapdoor", "spruce_trapdoor", "iron_trapdoor", "glass", "glass_pane",
    "tinted_glass", "white_stained_glass", "light_blue_stained_glass", "black_stained_glass",
    "white_stained_glass_pane", "light_blue_stained_glass_pane", "white_wool",
    "orange_wool", "magenta_wool", "light_blue_wool", "yellow_wool", "lime_wool", "pink_wool",
    "gray_wool", "light_gray_wool", "cyan_wool", "purple_wool", "blue_wool", "brown_wool",
    "green_wool", "red_wool", "black_wool", "white_concrete", "orange_concrete",
    "yellow_concrete", "lime_concrete", "light_blue_concrete", "blue_concrete",
    "gray_concrete", "light_gray_concrete", "cyan_concrete", "green_concrete",
    "red_concrete", "black_concrete", "white_carpet", "red_carpet", "gray_carpet",
    "iron_block", "gold_block", "diamond_block", "emerald_block", "lapis_block",
    "redstone_block", "copper_block", "cut_copper", "coal_block", "netherite_block",
    "amethyst_block", "bookshelf", "chiseled_bookshelf", "crafting_table", "furnace",
    "blast_furnace", "smoker", "chest", "barrel", "anvil", "lectern", "loom", "cartography_table",
    "smithing_table", "stonecutter", "grindstone", "bell", "cauldron", "composter",
    "enchanting_table", "brewing_stand", "torch", "wall_torch", "soul_torch", "lantern",
    "soul_lantern", "campfire", "redstone_lamp", "shroomlight", "ladder", "scaffolding",
    "chain", "iron_bars", "hay_block", "bone_block", "white_bed", "red_bed", "oak_sign",
    "oak_wall_sign", "spruce_sign", "flower_pot", "water", "lava", "moss_block",
    "moss_carpet", "sponge", "slime_block", "honey_block", "target", "tnt", "jack_o_lantern",
    "carved_pumpkin", "pumpkin", "melon", "cactus", "sugar_cane", "bamboo", "vine",
    "short_grass", "tall_grass", "fern", "dandelion", "poppy", "blue_orchid", "allium",
    "oxeye_daisy", "cornflower", "lily_of_the_valley", "sunflower", "rose_bush", "peony",
    "lilac", "glow_lichen", "beacon", "end_rod", "lightning_rod",
];

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    name: String,
}

/// Set of valid block identifiers, without the `minecraft:` namespace.
#[derive(Debug, Clone)]
pub struct BlockCatalog {
    names: BTreeSet<String>,
}

impl Default for BlockCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BlockCatalog {
    pub fn builtin() -> Self {
        Self::from_names(BUILTIN_BLOCKS.iter().copied())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| strip_namespace(n.as_ref()).to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Parse an item dump of the form `[{"name": "stone"}, ...]`.
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(text)?;
        Ok(Self::from_names(entries.into_iter().map(|e| e.name)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read block catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json(&text)?;
        info!(path = %path.display(), blocks = catalog.len(), "Loaded block catalog");
        Ok(catalog)
    }

    /// Catalog named by the config, or the built-in one. A broken file is
    /// logged and replaced by the built-in list.
    pub fn from_config(config: &SchematicConfig) -> Self {
        match &config.block_catalog_path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to built-in block catalog");
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when `spec` names a known block. States and NBT are ignored.
    pub fn is_valid(&self, spec: &str) -> bool {
        if spec.is_empty() || matches!(spec, "." | "_" | "air" | "minecraft:air") {
            return true;
        }
        self.names.contains(base_name(spec))
    }

    /// Names sharing the most `_`-separated parts with `query`, best first,
    /// ties alphabetical.
    pub fn find_similar(&self, query: &str, limit: usize) -> Vec<String> {
        let query = query.to_lowercase();
        let parts: Vec<&str> = query.split('_').collect();
        let mut scored: Vec<(usize, &String)> = self
            .names
            .iter()
            .filter_map(|name| {
                let lowered = name.to_lowercase();
                let score = parts.iter().filter(|p| lowered.contains(**p)).count();
                (score > 0).then_some((score, name))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Names containing `query`, case-insensitive, alphabetical.
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let query = query.to_lowercase();
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Error message for an unknown block, or `None` when it is valid.
    pub fn explain_invalid(&self, spec: &str) -> Option<String> {
        if self.is_valid(spec) {
            return None;
        }
        let base = base_name(spec);
        let suggestions = self.find_similar(base, PALETTE_SUGGESTIONS);
        Some(if suggestions.is_empty() {
            format!("Invalid block '{}'. This block does not exist in Minecraft.", base)
        } else {
            format!(
                "Invalid block '{}'. Did you mean: {}?",
                base,
                suggestions.join(", ")
            )
        })
    }

    /// One error per palette entry naming an unknown block.
    pub fn validate_palette<'a, I>(&self, palette: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        palette
            .into_iter()
            .filter(|(symbol, _)| !AIR_SYMBOLS.contains(symbol))
            .filter_map(|(symbol, spec)| {
                self.explain_invalid(spec)
                    .map(|e| format!("Palette '{}': {}", symbol, e))
            })
            .collect()
    }
}

fn strip_namespace(spec: &str) -> &str {
    spec.strip_prefix("minecraft:").unwrap_or(spec)
}

/// Block id without namespace, states or NBT.
fn base_name(spec: &str) -> &str {
    let spec = strip_namespace(spec);
    match spec.find(['[', '{']) {
        Some(i) => &spec[..i],
        None => spec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ignores_namespace_states_and_nbt() {
        let catalog = BlockCatalog::builtin();
        assert!(catalog.is_valid("stone"));
        assert!(catalog.is_valid("minecraft:stone"));
        assert!(catalog.is_valid("oak_stairs[facing=north,half=bottom]"));
        assert!(catalog.is_valid("chest{Items:[]}"));
        assert!(catalog.is_valid("minecraft:chest[facing=south]{Lock:\"\"}"));
        assert!(catalog.is_valid(""));
        assert!(catalog.is_valid("minecraft:air"));
        assert!(!catalog.is_valid("stoen"));
    }

    #[test]
    fn test_find_similar_orders_by_score_then_name() {
        let catalog =
            BlockCatalog::from_names(["cyan_wool", "cyan_terracotta", "red_terracotta", "glass"]);
        assert_eq!(
            catalog.find_similar("cyan_terracotta_stairs", 3),
            vec!["cyan_terracotta", "cyan_wool", "red_terracotta"]
        );
        assert!(catalog.find_similar("zzz", 3).is_empty());
    }

    #[test]
    fn test_search_is_substring_and_bounded() {
        let catalog =
            BlockCatalog::from_names(["oak_planks", "oak_log", "spruce_planks", "minecraft:stone"]);
        assert_eq!(catalog.search("PLANKS", 10), vec!["oak_planks", "spruce_planks"]);
        assert_eq!(catalog.search("oak", 1), vec!["oak_log"]);
        assert_eq!(catalog.search("stone", 10), vec!["stone"]);
        assert!(catalog.search("diamond", 10).is_empty());
    }

    #[test]
    fn test_palette_errors() {
        let catalog = BlockCatalog::from_names(["oak_planks", "oak_log", "stone"]);
        let errors = catalog.validate_palette([
            ("S", "stone"),
            (".", "whatever"),
            ("P", "oak_plank"),
            ("X", "qqq"),
        ]);
        assert_eq!(
            errors,
            vec![
                "Palette 'P': Invalid block 'oak_plank'. Did you mean: oak_planks, oak_log?",
                "Palette 'X': Invalid block 'qqq'. This block does not exist in Minecraft.",
            ]
        );
    }

    #[test]
    fn test_from_json() {
        let catalog =
            BlockCatalog::from_json(r#"[{"name": "stone"}, {"name": "minecraft:dirt"}, {}]"#)
                .unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.is_valid("dirt"));
        assert!(BlockCatalog::from_json("{}").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = SchematicConfig {
            block_catalog_path: Some("/nonexistent/blocks.json".into()),
            ..SchematicConfig::default()
        };
        let catalog = BlockCatalog::from_config(&config);
        assert!(!catalog.is_empty());
        assert!(catalog.is_valid("stone"));
    }
}
