//! Read-only world queries and bridge housekeeping.

use serde_json::{json, Value};

use vibecraft_core::{Result, ToolOutput};

use crate::args::{
    AnalyzeLightingArgs, AnalyzePaletteArgs, CheckSymmetryArgs, HeightmapArgs,
    NearbyEntitiesArgs, PlayerContextArgs, RegionArgs, ScanRegionArgs, ScreenshotArgs,
};
use crate::context::SkillContext;

/// Pretty JSON report carrying the same value as data.
fn report(value: Value) -> ToolOutput {
    let content = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    ToolOutput::text(content).with_data(value)
}

pub async fn capture_screenshot(ctx: &SkillContext, args: ScreenshotArgs) -> Result<ToolOutput> {
    let shot = ctx
        .bridge
        .capture_screenshot(args.max_width, args.max_height)
        .await?;
    // The image itself is too large for the text report.
    let content = format!(
        "Screenshot captured ({}x{})",
        shot.get("width").cloned().unwrap_or(Value::Null),
        shot.get("height").cloned().unwrap_or(Value::Null)
    );
    Ok(ToolOutput::text(content).with_data(shot))
}

pub async fn scan_region(ctx: &SkillContext, args: ScanRegionArgs) -> Result<ToolOutput> {
    let scan = ctx
        .bridge
        .scan_region(args.region.into(), args.include_states)
        .await?;
    Ok(report(scan))
}

pub async fn get_heightmap(ctx: &SkillContext, args: HeightmapArgs) -> Result<ToolOutput> {
    let heights = ctx
        .bridge
        .get_heightmap(args.x1, args.z1, args.x2, args.z2)
        .await?;
    Ok(report(heights))
}

pub async fn get_player_context(ctx: &SkillContext, args: PlayerContextArgs) -> Result<ToolOutput> {
    Ok(report(ctx.bridge.get_player_context(args.reach).await?))
}

pub async fn get_nearby_entities(
    ctx: &SkillContext,
    args: NearbyEntitiesArgs,
) -> Result<ToolOutput> {
    Ok(report(ctx.bridge.get_nearby_entities(args.radius).await?))
}

pub async fn analyze_palette(ctx: &SkillContext, args: AnalyzePaletteArgs) -> Result<ToolOutput> {
    let palette = ctx
        .bridge
        .analyze_palette(args.x, args.y, args.z, args.radius)
        .await?;
    Ok(report(palette))
}

pub async fn analyze_palette_region(ctx: &SkillContext, args: RegionArgs) -> Result<ToolOutput> {
    Ok(report(ctx.bridge.analyze_palette_region(args.into()).await?))
}

pub async fn analyze_lighting(ctx: &SkillContext, args: AnalyzeLightingArgs) -> Result<ToolOutput> {
    let lighting = ctx
        .bridge
        .analyze_lighting(args.region.into(), args.resolution)
        .await?;
    Ok(report(lighting))
}

pub async fn check_symmetry(ctx: &SkillContext, args: CheckSymmetryArgs) -> Result<ToolOutput> {
    let symmetry = ctx
        .bridge
        .check_symmetry(args.region.into(), &args.axis, args.tolerance, args.resolution)
        .await?;
    Ok(report(symmetry))
}

pub async fn get_server_info(ctx: &SkillContext) -> Result<ToolOutput> {
    Ok(report(ctx.bridge.server_info().await))
}

pub async fn bridge_status(ctx: &SkillContext) -> Result<ToolOutput> {
    let bridge = &ctx.bridge;
    let status = json!({
        "endpoint": bridge.endpoint(),
        "connected": bridge.is_connected().await,
        "pending_requests": bridge.pending_requests().await,
        "backoff": bridge.backoff_status().await,
        "capabilities": bridge.capabilities(),
    });
    Ok(report(status))
}

pub async fn drain_inbox(ctx: &SkillContext) -> Result<ToolOutput> {
    let messages = ctx.bridge.drain_inbox();
    let content = format!("Drained {} message(s)", messages.len());
    Ok(ToolOutput::text(content).with_data(json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

pub async fn reset_backoff(ctx: &SkillContext) -> Result<ToolOutput> {
    ctx.bridge.reset_backoff().await;
    Ok(ToolOutput::text("Backoff reset; the next request will reconnect immediately"))
}
