//! The closed set of tools.

use serde_json::Value;

use crate::args::{
    schema, AnalyzeLightingArgs, AnalyzePaletteArgs, BuildArgs, BuildSchematicArgs,
    CheckSymmetryArgs, ExecuteCommandArgs, HeightmapArgs, NearbyEntitiesArgs, NoArgs,
    PlayerContextArgs, RegionArgs, ScanRegionArgs, ScreenshotArgs, SearchItemArgs,
    SurfaceLevelArgs, ValidateMaskArgs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ExecuteCommand,
    Build,
    BuildSchematic,
    CaptureScreenshot,
    ScanRegion,
    GetHeightmap,
    GetPlayerContext,
    GetNearbyEntities,
    AnalyzePalette,
    AnalyzePaletteRegion,
    AnalyzeLighting,
    CheckSymmetry,
    GetServerInfo,
    SearchMinecraftItem,
    GetPlayerPosition,
    GetSurfaceLevel,
    ValidateMask,
    BridgeStatus,
    DrainInbox,
    ResetBackoff,
}

impl ToolKind {
    pub const ALL: [ToolKind; 20] = [
        ToolKind::ExecuteCommand,
        ToolKind::Build,
        ToolKind::BuildSchematic,
        ToolKind::CaptureScreenshot,
        ToolKind::ScanRegion,
        ToolKind::GetHeightmap,
        ToolKind::GetPlayerContext,
        ToolKind::GetNearbyEntities,
        ToolKind::AnalyzePalette,
        ToolKind::AnalyzePaletteRegion,
        ToolKind::AnalyzeLighting,
        ToolKind::CheckSymmetry,
        ToolKind::GetServerInfo,
        ToolKind::SearchMinecraftItem,
        ToolKind::GetPlayerPosition,
        ToolKind::GetSurfaceLevel,
        ToolKind::ValidateMask,
        ToolKind::BridgeStatus,
        ToolKind::DrainInbox,
        ToolKind::ResetBackoff,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ExecuteCommand => "execute_command",
            ToolKind::Build => "build",
            ToolKind::BuildSchematic => "build_schematic",
            ToolKind::CaptureScreenshot => "capture_screenshot",
            ToolKind::ScanRegion => "scan_region",
            ToolKind::GetHeightmap => "get_heightmap",
            ToolKind::GetPlayerContext => "get_player_context",
            ToolKind::GetNearbyEntities => "get_nearby_entities",
            ToolKind::AnalyzePalette => "analyze_palette",
            ToolKind::AnalyzePaletteRegion => "analyze_palette_region",
            ToolKind::AnalyzeLighting => "analyze_lighting",
            ToolKind::CheckSymmetry => "check_symmetry",
            ToolKind::GetServerInfo => "get_server_info",
            ToolKind::SearchMinecraftItem => "search_minecraft_item",
            ToolKind::GetPlayerPosition => "get_player_position",
            ToolKind::GetSurfaceLevel => "get_surface_level",
            ToolKind::ValidateMask => "validate_mask",
            ToolKind::BridgeStatus => "bridge_status",
            ToolKind::DrainInbox => "drain_inbox",
            ToolKind::ResetBackoff => "reset_backoff",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Position in [`ToolKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ExecuteCommand => "Run a single game command through the client bridge",
            ToolKind::Build => {
                "Place blocks from a list of commands, or from a script that fills a 'commands' list"
            }
            ToolKind::BuildSchematic => {
                "Build from a declarative schematic (palette plus layer grids); adjacent blocks are merged into fills"
            }
            ToolKind::CaptureScreenshot => "Capture the player's current view",
            ToolKind::ScanRegion => "Read the blocks inside a box",
            ToolKind::GetHeightmap => "Surface heights for an X/Z rectangle",
            ToolKind::GetPlayerContext => "Player position, rotation and targeted block",
            ToolKind::GetNearbyEntities => "Entities around the player",
            ToolKind::AnalyzePalette => "Block palette around a point",
            ToolKind::AnalyzePaletteRegion => "Block palette inside a box",
            ToolKind::AnalyzeLighting => "Light levels and dark spots inside a box",
            ToolKind::CheckSymmetry => "Compare the two halves of a box across an axis",
            ToolKind::GetServerInfo => "Time, difficulty and online players",
            ToolKind::SearchMinecraftItem => "Find block ids containing a search term",
            ToolKind::GetPlayerPosition => {
                "Player position, facing direction, targeted block and suggested build points"
            }
            ToolKind::GetSurfaceLevel => "Top solid block at an X/Z column and where to build on it",
            ToolKind::ValidateMask => "Check a WorldEdit mask before using it in a command",
            ToolKind::BridgeStatus => "Connection, backoff and capability state of the client bridge",
            ToolKind::DrainInbox => "Return and clear unsolicited messages from the client mod",
            ToolKind::ResetBackoff => "Allow an immediate reconnect to the client mod",
        }
    }

    /// JSON schema of the tool's arguments.
    pub fn parameters(self) -> Value {
        match self {
            ToolKind::ExecuteCommand => schema::<ExecuteCommandArgs>(),
            ToolKind::Build => schema::<BuildArgs>(),
            ToolKind::BuildSchematic => schema::<BuildSchematicArgs>(),
            ToolKind::CaptureScreenshot => schema::<ScreenshotArgs>(),
            ToolKind::ScanRegion => schema::<ScanRegionArgs>(),
            ToolKind::GetHeightmap => schema::<HeightmapArgs>(),
            ToolKind::GetPlayerContext => schema::<PlayerContextArgs>(),
            ToolKind::GetNearbyEntities => schema::<NearbyEntitiesArgs>(),
            ToolKind::AnalyzePalette => schema::<AnalyzePaletteArgs>(),
            ToolKind::AnalyzePaletteRegion => schema::<RegionArgs>(),
            ToolKind::AnalyzeLighting => schema::<AnalyzeLightingArgs>(),
            ToolKind::CheckSymmetry => schema::<CheckSymmetryArgs>(),
            ToolKind::SearchMinecraftItem => schema::<SearchItemArgs>(),
            ToolKind::GetSurfaceLevel => schema::<SurfaceLevelArgs>(),
            ToolKind::ValidateMask => schema::<ValidateMaskArgs>(),
            ToolKind::GetServerInfo
            | ToolKind::GetPlayerPosition
            | ToolKind::BridgeStatus
            | ToolKind::DrainInbox
            | ToolKind::ResetBackoff => schema::<NoArgs>(),
        }
    }
}
