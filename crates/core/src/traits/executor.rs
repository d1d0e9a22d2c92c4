//! Command dispatch contract.

use async_trait::async_trait;
use crate::error::Result;

/// Something that can run one textual game command and return its textual result.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Dispatch a single command.
    async fn execute_command(&self, command: &str) -> Result<String>;
}
