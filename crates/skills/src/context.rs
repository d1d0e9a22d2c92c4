//! Shared state handed to every tool.

use std::sync::Arc;

use vibecraft_bridge::ClientBridge;
use vibecraft_core::config::AppConfig;
use vibecraft_core::Result;
use vibecraft_governance::CommandGuard;
use vibecraft_sandbox::CodeSandbox;
use vibecraft_schematic::{BlockCatalog, ExpansionLimits, SchematicCompiler};

pub struct SkillContext {
    pub bridge: Arc<ClientBridge>,
    pub sandbox: CodeSandbox,
    pub compiler: SchematicCompiler,
    pub guard: CommandGuard,
}

impl SkillContext {
    pub fn new(
        bridge: Arc<ClientBridge>,
        sandbox: CodeSandbox,
        compiler: SchematicCompiler,
        guard: CommandGuard,
    ) -> Self {
        Self {
            bridge,
            sandbox,
            compiler,
            guard,
        }
    }

    /// Fails only when the configured build area is inconsistent.
    pub fn from_config(bridge: Arc<ClientBridge>, config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            bridge,
            CodeSandbox::new(config.sandbox.clone()),
            SchematicCompiler::new(BlockCatalog::from_config(&config.schematic))
                .with_limits(ExpansionLimits::from(&config.schematic)),
            CommandGuard::from_config(&config.safety)?,
        ))
    }
}
