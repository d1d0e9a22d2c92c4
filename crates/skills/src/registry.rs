//! Static tool table.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use vibecraft_core::{
    traits::{Tool, ToolRegistry},
    types::{ToolDefinition, ToolOutput},
    Error, Result,
};

use crate::args::parse;
use crate::context::SkillContext;
use crate::kind::ToolKind;
use crate::{build, lookup, world};

/// One entry of the table: a tool kind bound to the shared context.
pub struct SkillTool {
    kind: ToolKind,
    ctx: Arc<SkillContext>,
}

impl SkillTool {
    pub fn kind(&self) -> ToolKind {
        self.kind
    }
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameters(&self) -> Value {
        self.kind.parameters()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let ctx = self.ctx.as_ref();
        match self.kind {
            ToolKind::ExecuteCommand => build::execute_command(ctx, parse(args)?).await,
            ToolKind::Build => build::build(ctx, parse(args)?).await,
            ToolKind::BuildSchematic => build::build_schematic(ctx, parse(args)?).await,
            ToolKind::CaptureScreenshot => world::capture_screenshot(ctx, parse(args)?).await,
            ToolKind::ScanRegion => world::scan_region(ctx, parse(args)?).await,
            ToolKind::GetHeightmap => world::get_heightmap(ctx, parse(args)?).await,
            ToolKind::GetPlayerContext => world::get_player_context(ctx, parse(args)?).await,
            ToolKind::GetNearbyEntities => world::get_nearby_entities(ctx, parse(args)?).await,
            ToolKind::AnalyzePalette => world::analyze_palette(ctx, parse(args)?).await,
            ToolKind::AnalyzePaletteRegion => {
                world::analyze_palette_region(ctx, parse(args)?).await
            }
            ToolKind::AnalyzeLighting => world::analyze_lighting(ctx, parse(args)?).await,
            ToolKind::CheckSymmetry => world::check_symmetry(ctx, parse(args)?).await,
            ToolKind::GetServerInfo => world::get_server_info(ctx).await,
            ToolKind::SearchMinecraftItem => {
                lookup::search_minecraft_item(ctx, parse(args)?).await
            }
            ToolKind::GetPlayerPosition => lookup::get_player_position(ctx).await,
            ToolKind::GetSurfaceLevel => lookup::get_surface_level(ctx, parse(args)?).await,
            ToolKind::ValidateMask => lookup::validate_mask(ctx, parse(args)?).await,
            ToolKind::BridgeStatus => world::bridge_status(ctx).await,
            ToolKind::DrainInbox => world::drain_inbox(ctx).await,
            ToolKind::ResetBackoff => world::reset_backoff(ctx).await,
        }
    }
}

/// Every tool, indexed by [`ToolKind::index`].
pub struct SkillRegistry {
    tools: Vec<SkillTool>,
}

/// Build the tool table once; it never changes afterwards.
pub fn build_registry(ctx: Arc<SkillContext>) -> SkillRegistry {
    let tools = ToolKind::ALL
        .into_iter()
        .map(|kind| SkillTool {
            kind,
            ctx: ctx.clone(),
        })
        .collect();
    SkillRegistry { tools }
}

impl SkillRegistry {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&SkillTool> {
        ToolKind::from_name(name).and_then(|kind| self.tools.get(kind.index()))
    }
}

#[async_trait]
impl ToolRegistry for SkillRegistry {
    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.lookup(name).map(|tool| tool as &dyn Tool)
    }

    fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self.lookup(name).ok_or_else(|| Error::tool_not_found(name))?;

        tracing::debug!(tool = %name, "Executing tool");
        let outcome = tool.execute(args).await;

        let success = matches!(&outcome, Ok(output) if output.success);
        vibecraft_governance::track_tool_call(name, success);
        if let Err(e) = &outcome {
            tracing::warn!(tool = %name, error = %e, "Tool failed");
        }
        outcome
    }
}
