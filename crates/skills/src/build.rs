//! Command, script and schematic builds.

use serde_json::{json, Value};
use tracing::{info, warn};

use vibecraft_core::{Error, Result, ToolOutput};

use crate::args::{BuildArgs, BuildSchematicArgs, ExecuteCommandArgs};
use crate::context::SkillContext;

/// Words in a command result that mean the game refused it.
const FAILURE_WORDS: &[&str] = &["error", "unknown", "incorrect", "invalid", "cannot"];

const BUILD_PREVIEW_LIMIT: usize = 20;
const SCHEMATIC_PREVIEW_LIMIT: usize = 30;
const SCHEMATIC_SAMPLE: usize = 15;
const REPORTED_ERRORS: usize = 5;

// =============================================================================
// Batch execution
// =============================================================================

#[derive(Debug, Default)]
struct BatchReport {
    executed: usize,
    errors: Vec<String>,
}

impl BatchReport {
    fn summarize(&self, lines: &mut Vec<String>) {
        lines.push(String::new());
        if self.errors.is_empty() {
            lines.push("Build completed successfully!".into());
            return;
        }
        lines.push("Build completed with errors:".into());
        for error in self.errors.iter().take(REPORTED_ERRORS) {
            lines.push(format!("  - {}", error));
        }
        if self.errors.len() > REPORTED_ERRORS {
            lines.push(format!(
                "  ... and {} more errors",
                self.errors.len() - REPORTED_ERRORS
            ));
        }
    }
}

/// Run `commands` one at a time. A failing command is recorded and the
/// batch continues.
async fn run_batch(ctx: &SkillContext, commands: &[String]) -> BatchReport {
    let mut report = BatchReport::default();
    for (i, command) in commands.iter().enumerate() {
        if let Err(e) = ctx.guard.enforce(command).await {
            report
                .errors
                .push(format!("Command {}: {}\nBlocked: {}", i + 1, command, e));
            continue;
        }
        match ctx.bridge.execute_command(command).await {
            Ok(result) => {
                report.executed += 1;
                let lowered = result.to_lowercase();
                if FAILURE_WORDS.iter().any(|w| lowered.contains(w)) {
                    warn!(command = %command, result = %result, "Command reported an error");
                    report.errors.push(format!(
                        "Command {} failed: {}\nResult: {}",
                        i + 1,
                        command,
                        result
                    ));
                }
            }
            Err(e) => {
                warn!(command = %command, error = %e, "Command failed");
                report
                    .errors
                    .push(format!("Command {}: {}\nError: {}", i + 1, command, e));
            }
        }
    }
    report
}

fn finish(lines: Vec<String>, report: &BatchReport, total: usize) -> ToolOutput {
    let data = json!({
        "total": total,
        "executed": report.executed,
        "errors": report.errors,
    });
    let content = lines.join("\n");
    let output = if report.errors.is_empty() {
        ToolOutput::text(content)
    } else {
        ToolOutput::error(content)
    };
    output.with_data(data)
}

fn code_block(lines: &mut Vec<String>, commands: &[String], truncated: bool) {
    lines.push("```".into());
    lines.extend(commands.iter().cloned());
    if truncated {
        lines.push("...".into());
    }
    lines.push("```".into());
}

// =============================================================================
// execute_command
// =============================================================================

pub async fn execute_command(ctx: &SkillContext, args: ExecuteCommandArgs) -> Result<ToolOutput> {
    ctx.guard.enforce(&args.command).await?;
    let result = ctx.bridge.execute_command(&args.command).await?;
    let content = if result.is_empty() {
        "Command executed (no output)".to_string()
    } else {
        result.clone()
    };
    Ok(ToolOutput::text(content).with_data(json!({ "result": result })))
}

// =============================================================================
// build
// =============================================================================

/// Commands must be strings starting with "/".
fn checked_commands(raw: Vec<Value>) -> Result<Vec<String>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::String(command) if command.starts_with('/') => Ok(command),
            Value::String(command) => Err(Error::invalid_request(format!(
                "command at index {} must start with '/' or '//'. Got: {}",
                i, command
            ))),
            _ => Err(Error::invalid_request(format!(
                "command at index {} is not a string",
                i
            ))),
        })
        .collect()
}

pub async fn build(ctx: &SkillContext, args: BuildArgs) -> Result<ToolOutput> {
    let description = args
        .description
        .unwrap_or_else(|| "Building structure".to_string());

    let commands = match (args.code.filter(|c| !c.trim().is_empty()), args.commands) {
        (Some(code), _) => {
            info!(description = %description, "Generating build commands from script");
            ctx.sandbox.run(code).await?
        }
        (None, Some(raw)) if !raw.is_empty() => checked_commands(raw)?,
        _ => {
            return Err(Error::invalid_request(
                "Either 'commands' list or 'code' must be provided",
            ))
        }
    };
    let total = commands.len();

    if args.preview_only {
        let worldedit = commands.iter().filter(|c| c.trim().starts_with("//")).count();
        let mut lines = vec![
            format!("Build Preview: {}", description),
            String::new(),
            format!(
                "Commands: {} total ({} WorldEdit, {} vanilla)",
                total,
                worldedit,
                total - worldedit
            ),
        ];
        if total <= BUILD_PREVIEW_LIMIT {
            lines.push(format!("All Commands ({}):", total));
            code_block(&mut lines, &commands, false);
        } else {
            lines.push(format!(
                "Sample Commands (first {} of {}):",
                BUILD_PREVIEW_LIMIT, total
            ));
            code_block(&mut lines, &commands[..BUILD_PREVIEW_LIMIT], true);
            lines.push(String::new());
            lines.push(format!(
                "Set preview_only=false to execute all {} commands",
                total
            ));
        }
        return Ok(ToolOutput::text(lines.join("\n")).with_data(json!({ "commands": commands })));
    }

    info!(description = %description, commands = total, "Executing build");
    let report = run_batch(ctx, &commands).await;
    let mut lines = vec![
        format!("Building: {}", description),
        String::new(),
        format!("Commands: {}", total),
    ];
    report.summarize(&mut lines);
    lines.push(String::new());
    lines.push(format!("Stats: {}/{} commands executed", report.executed, total));
    Ok(finish(lines, &report, total))
}

// =============================================================================
// build_schematic
// =============================================================================

/// Block position of the player, when the client mod can tell.
async fn player_position(ctx: &SkillContext) -> Option<[i64; 3]> {
    let context = match ctx.bridge.get_player_context(128.0).await {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "Could not get player position");
            return None;
        }
    };
    let position = context.get("position")?;
    let coord = |key: &str| position.get(key).and_then(Value::as_i64);
    Some([coord("block_x")?, coord("block_y")?, coord("block_z")?])
}

pub async fn build_schematic(ctx: &SkillContext, args: BuildSchematicArgs) -> Result<ToolOutput> {
    let description = args
        .description
        .unwrap_or_else(|| "Building from schematic".to_string());

    let schematic = match args.schematic {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| Error::invalid_request(format!("Invalid JSON schematic: {}", e)))?,
        other => other,
    };
    if !schematic.is_object() {
        return Err(Error::invalid_request("Schematic must be a JSON object"));
    }

    let wants_player = ["anchor", "a"]
        .iter()
        .any(|key| schematic.get(*key).and_then(Value::as_str) == Some("player"));
    let player = if wants_player {
        player_position(ctx).await
    } else {
        None
    };

    let mut compiled = ctx.compiler.compile_value(&schematic, player)?;
    if compiled.commands.is_empty() {
        return Err(Error::SchematicCompile(vec![
            "Schematic produced no commands".to_string(),
        ]));
    }
    if args.optimize {
        compiled.optimize();
    }
    let total = compiled.commands.len();

    if args.preview_only {
        let mut lines = vec![
            format!("Schematic Preview: {}", description),
            String::new(),
            format!("Blocks: {}", compiled.blocks_placed),
            format!("Layers: {}", compiled.layers),
            format!("Commands: {}", total),
        ];
        if let Some(before) = compiled.optimized_from {
            lines.push(format!("Optimized: {} -> {} commands", before, total));
        }
        if !compiled.warnings.is_empty() {
            lines.push(String::new());
            lines.push("Warnings:".into());
            lines.extend(compiled.warnings.iter().take(5).map(|w| format!("  - {}", w)));
        }
        lines.push(String::new());
        if total <= SCHEMATIC_PREVIEW_LIMIT {
            lines.push("Commands:".into());
            code_block(&mut lines, &compiled.commands, false);
        } else {
            lines.push(format!(
                "Sample Commands (first {} of {}):",
                SCHEMATIC_SAMPLE, total
            ));
            code_block(&mut lines, &compiled.commands[..SCHEMATIC_SAMPLE], true);
        }
        let warnings = compiled.warnings.clone();
        return Ok(ToolOutput::text(lines.join("\n"))
            .with_data(serde_json::to_value(&compiled)?)
            .with_warnings(warnings));
    }

    info!(description = %description, commands = total, "Executing schematic");
    let report = run_batch(ctx, &compiled.commands).await;
    let mut lines = vec![
        format!("Built: {}", description),
        String::new(),
        format!("Blocks: {}", compiled.blocks_placed),
        format!("Commands: {}/{} executed", report.executed, total),
    ];
    if !compiled.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".into());
        lines.extend(compiled.warnings.iter().take(3).map(|w| format!("  - {}", w)));
    }
    report.summarize(&mut lines);
    Ok(finish(lines, &report, total).with_warnings(compiled.warnings))
}
