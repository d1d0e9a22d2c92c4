//! Guardrails for generated game commands.
//!
//! Every command the build tools send to the game passes through a
//! [`CommandGuard`] first:
//! - Length limit
//! - Dangerous WorldEdit operations (chunk deletion, regeneration)
//! - Build-area bounds for `/setblock` and `/fill`

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use vibecraft_core::config::{BuildArea, SafetyConfig};
use vibecraft_core::{Error, Result};

/// Result of a guardrail check.
#[derive(Debug, Clone, Serialize)]
pub struct GuardrailResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Reason for failure (if any).
    pub reason: Option<String>,
    /// Type of violation detected.
    pub violation_type: Option<ViolationType>,
}

impl GuardrailResult {
    /// Create a passing result.
    pub fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
            violation_type: None,
        }
    }

    /// Create a failing result.
    pub fn fail(reason: impl Into<String>, violation_type: ViolationType) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            violation_type: Some(violation_type),
        }
    }
}

/// Type of violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationType {
    CommandTooLong,
    DangerousCommand,
    OutOfBounds,
}

/// A single check applied to a command before it is sent.
#[async_trait]
pub trait CommandGuardrail: Send + Sync {
    async fn check(&self, command: &str) -> Result<GuardrailResult>;
}

// =============================================================================
// Length
// =============================================================================

pub struct LengthLimit {
    max_chars: usize,
}

impl LengthLimit {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait]
impl CommandGuardrail for LengthLimit {
    async fn check(&self, command: &str) -> Result<GuardrailResult> {
        if command.chars().count() > self.max_chars {
            return Ok(GuardrailResult::fail(
                format!(
                    "Command exceeds maximum length of {} characters",
                    self.max_chars
                ),
                ViolationType::CommandTooLong,
            ));
        }
        Ok(GuardrailResult::pass())
    }
}

// =============================================================================
// Dangerous commands
// =============================================================================

/// Blocks WorldEdit operations that destroy or regenerate whole chunks.
pub struct DangerousCommandFilter {
    verbs: Vec<&'static str>,
}

impl DangerousCommandFilter {
    pub fn new() -> Self {
        Self {
            verbs: vec!["delchunks", "regen"],
        }
    }
}

impl Default for DangerousCommandFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandGuardrail for DangerousCommandFilter {
    async fn check(&self, command: &str) -> Result<GuardrailResult> {
        let verb = command
            .trim()
            .trim_start_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if self.verbs.contains(&verb.as_str()) {
            return Ok(GuardrailResult::fail(
                format!("Dangerous command blocked: //{}", verb),
                ViolationType::DangerousCommand,
            ));
        }
        Ok(GuardrailResult::pass())
    }
}

// =============================================================================
// Build area
// =============================================================================

/// Rejects `/setblock` and `/fill` placements with absolute coordinates outside the area.
///
/// Relative (`~`) and local (`^`) coordinates cannot be resolved here and pass.
pub struct BuildAreaBounds {
    area: BuildArea,
    placement: Regex,
}

impl BuildAreaBounds {
    pub fn new(area: BuildArea) -> Result<Self> {
        let placement = Regex::new(r"^/(setblock|fill)\s+(.*)$")
            .map_err(|e| Error::governance(format!("Invalid placement pattern: {}", e)))?;
        Ok(Self { area, placement })
    }

    fn corners(&self, command: &str) -> Vec<[Option<i64>; 3]> {
        let Some(caps) = self.placement.captures(command.trim()) else {
            return Vec::new();
        };
        let count = if &caps[1] == "fill" { 6 } else { 3 };
        let coords: Vec<Option<i64>> = caps[2]
            .split_whitespace()
            .take(count)
            .map(|token| token.parse::<i64>().ok())
            .collect();
        coords
            .chunks(3)
            .filter(|c| c.len() == 3)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    fn inside(&self, [x, y, z]: [Option<i64>; 3]) -> bool {
        fn within(value: Option<i64>, min: Option<i64>, max: Option<i64>) -> bool {
            let Some(value) = value else { return true };
            min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
        }
        within(x, self.area.min_x, self.area.max_x)
            && within(y, self.area.min_y, self.area.max_y)
            && within(z, self.area.min_z, self.area.max_z)
    }
}

#[async_trait]
impl CommandGuardrail for BuildAreaBounds {
    async fn check(&self, command: &str) -> Result<GuardrailResult> {
        for corner in self.corners(command) {
            if !self.inside(corner) {
                let show = |v: Option<i64>| v.map_or_else(|| "~".to_string(), |v| v.to_string());
                return Ok(GuardrailResult::fail(
                    format!(
                        "Coordinates ({}, {}, {}) are outside the allowed build area",
                        show(corner[0]),
                        show(corner[1]),
                        show(corner[2])
                    ),
                    ViolationType::OutOfBounds,
                ));
            }
        }
        Ok(GuardrailResult::pass())
    }
}

// =============================================================================
// Composite
// =============================================================================

/// Runs every configured guardrail; the first failure wins.
pub struct CommandGuard {
    guardrails: Vec<Box<dyn CommandGuardrail>>,
}

impl CommandGuard {
    pub fn new() -> Self {
        Self {
            guardrails: Vec::new(),
        }
    }

    /// Add a guardrail to the chain.
    pub fn add(mut self, guardrail: Box<dyn CommandGuardrail>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    pub fn from_config(config: &SafetyConfig) -> Result<Self> {
        let mut guard = Self::new().add(Box::new(LengthLimit::new(config.max_command_length)));
        if !config.allow_dangerous_commands {
            guard = guard.add(Box::new(DangerousCommandFilter::new()));
        }
        if let Some(area) = config.build_area {
            guard = guard.add(Box::new(BuildAreaBounds::new(area)?));
        }
        Ok(guard)
    }

    pub async fn check(&self, command: &str) -> Result<GuardrailResult> {
        for guardrail in &self.guardrails {
            let result = guardrail.check(command).await?;
            if !result.passed {
                return Ok(result);
            }
        }
        Ok(GuardrailResult::pass())
    }

    /// Like [`check`](Self::check) but turns a failure into `Error::Governance`.
    pub async fn enforce(&self, command: &str) -> Result<()> {
        let result = self.check(command).await?;
        if result.passed {
            return Ok(());
        }
        let reason = result.reason.unwrap_or_else(|| "Command rejected".to_string());
        tracing::warn!(command = %command, reason = %reason, "Command blocked by guardrail");
        Err(Error::governance(reason))
    }
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> BuildArea {
        BuildArea {
            min_x: Some(-100),
            max_x: Some(100),
            min_y: Some(-64),
            max_y: Some(320),
            min_z: None,
            max_z: None,
        }
    }

    #[tokio::test]
    async fn test_length_limit() {
        let guard = LengthLimit::new(10);
        assert!(guard.check("/say hi").await.unwrap().passed);
        let result = guard.check("/say hello world").await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.violation_type, Some(ViolationType::CommandTooLong));
    }

    #[tokio::test]
    async fn test_dangerous_filter() {
        let filter = DangerousCommandFilter::new();
        assert!(!filter.check("//regen").await.unwrap().passed);
        assert!(!filter.check("//DELCHUNKS").await.unwrap().passed);
        assert!(filter.check("//set stone").await.unwrap().passed);
        assert!(filter.check("/setblock 0 0 0 stone").await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_build_area_checks_both_fill_corners() {
        let bounds = BuildAreaBounds::new(area()).unwrap();
        assert!(bounds.check("/fill 0 64 0 10 70 10 stone").await.unwrap().passed);
        let result = bounds.check("/fill 0 64 0 101 70 10 stone").await.unwrap();
        assert!(!result.passed);
        assert_eq!(
            result.reason.as_deref(),
            Some("Coordinates (101, 70, 10) are outside the allowed build area")
        );
        // z is unbounded, relative coordinates are not resolved
        assert!(bounds.check("/setblock 5 70 99999 stone").await.unwrap().passed);
        assert!(bounds.check("/setblock ~500 ~ ~ stone").await.unwrap().passed);
        assert!(bounds.check("/say 1000 1000 1000").await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_guard_from_config() {
        let config = SafetyConfig {
            max_command_length: 1000,
            allow_dangerous_commands: false,
            build_area: Some(area()),
        };
        let guard = CommandGuard::from_config(&config).unwrap();
        assert!(guard.enforce("/setblock 0 64 0 stone").await.is_ok());

        let err = guard.enforce("//regen").await.unwrap_err();
        assert_eq!(err.to_string(), "Governance error: Dangerous command blocked: //regen");
        assert!(guard.enforce("/setblock 0 400 0 stone").await.is_err());

        // defaults allow dangerous commands and have no area
        let permissive = CommandGuard::from_config(&SafetyConfig::default()).unwrap();
        assert!(permissive.enforce("//regen").await.is_ok());
    }
}
