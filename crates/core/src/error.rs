//! Error types for VibeCraft.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using VibeCraft's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for VibeCraft.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Bridge Errors
    // =========================================================================
    #[error("Connection error: {0}")]
    Connection(String),

    #[error(
        "Connection in backoff period ({remaining_secs:.1}s remaining after {failures} consecutive failures)"
    )]
    BackoffActive { remaining_secs: f64, failures: u32 },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Sandbox Errors
    // =========================================================================
    #[error("Sandbox validation failed: {0}")]
    SandboxValidation(String),

    #[error("Sandbox execution failed: {0}")]
    SandboxExecution(String),

    // =========================================================================
    // Schematic Errors
    // =========================================================================
    #[error("Schematic compile failed: {}", .0.join("; "))]
    SchematicCompile(Vec<String>),

    // =========================================================================
    // Skills / Gateway Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Governance error: {0}")]
    Governance(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification telling a caller what to do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient: the same call may succeed later.
    RetryLater,
    /// The input must be changed before retrying.
    FixInput,
    /// The operation was refused by policy or by the peer.
    Refused,
    /// A bug or an unexpected condition.
    Internal,
}

impl Error {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a sandbox validation error.
    pub fn sandbox_validation(msg: impl Into<String>) -> Self {
        Self::SandboxValidation(msg.into())
    }

    /// Create a sandbox execution error.
    pub fn sandbox_execution(msg: impl Into<String>) -> Self {
        Self::SandboxExecution(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a gateway error.
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create a governance error.
    pub fn governance(msg: impl Into<String>) -> Self {
        Self::Governance(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify the error for callers deciding whether to retry.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Connection(_) | Self::BackoffActive { .. } | Self::Timeout(_) => {
                ErrorClass::RetryLater
            }
            Self::SandboxValidation(_)
            | Self::SandboxExecution(_)
            | Self::SchematicCompile(_)
            | Self::InvalidRequest(_)
            | Self::ToolNotFound(_)
            | Self::Serialization(_) => ErrorClass::FixInput,
            Self::Protocol(_) | Self::Governance(_) => ErrorClass::Refused,
            Self::ToolExecution(_)
            | Self::Gateway(_)
            | Self::Config(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorClass::Internal,
        }
    }

    /// Whether the error originates from the transport and poisons the connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::BackoffActive { .. } | Self::Timeout(_)
        )
    }
}
