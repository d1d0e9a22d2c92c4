//! Sandbox execution engine.
//!
//! `execute_command_generator` is the whole pipeline: validate, interpret,
//! then check the `commands` list the script produced. Nothing survives
//! between calls. Evaluation happens on a dedicated thread with a large
//! stack so deeply nested expressions cannot overflow the caller's stack.

use std::thread;

use tracing::{debug, info, warn};

use vibecraft_core::config::SandboxLimits;
use vibecraft_core::{Error, Result};

use crate::format::with_commas;
use crate::interp::Interpreter;
use crate::validate::validate_code;
use crate::value::{Fault, Value};

/// Stack size of the evaluation thread.
const EVAL_STACK_BYTES: usize = 256 * 1024 * 1024;

/// Longest exception message passed back to the caller.
const MAX_ERROR_MESSAGE: usize = 200;

/// Longest single generated command.
pub const MAX_COMMAND_LENGTH: usize = 1000;

/// Substrings that make a generated command unacceptable (case-insensitive).
/// Matching is plain substring search, so e.g. `banner` trips `ban`.
pub const BLOCKED_COMMAND_PATTERNS: &[&str] = &[
    "stop",
    "ban",
    "kick",
    "op ",
    "deop",
    "whitelist",
    "save-all",
    "save-off",
    "save-on",
    "reload",
];

// =============================================================================
// Pipeline
// =============================================================================

/// Validate and run `source`, returning the trimmed commands it generated.
pub fn execute_command_generator(source: &str, limits: &SandboxLimits) -> Result<Vec<String>> {
    let outcome = thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("sandbox-eval".into())
            .stack_size(EVAL_STACK_BYTES)
            .spawn_scoped(scope, || run_pipeline(source, limits))
            .map_err(|e| Error::internal(format!("Failed to start sandbox thread: {}", e)))?;
        handle
            .join()
            .map_err(|_| Error::internal("Sandbox evaluation panicked"))?
    });
    match &outcome {
        Ok(commands) => info!(count = commands.len(), "Sandbox generated commands"),
        Err(e) => warn!(error = %e, "Sandbox rejected script"),
    }
    outcome
}

fn run_pipeline(source: &str, limits: &SandboxLimits) -> Result<Vec<String>> {
    let module = validate_code(source, limits)?;
    debug!(statements = module.body.len(), "Script passed validation");

    let mut interpreter = Interpreter::new(limits);
    interpreter.run(&module).map_err(fault_to_error)?;
    debug!(iterations = interpreter.iterations(), "Script finished");

    let commands = interpreter.global("commands").cloned().unwrap_or(Value::None);
    check_output(&commands, limits.max_commands)
}

fn fault_to_error(fault: Fault) -> Error {
    match fault {
        Fault::Limit(message) => Error::sandbox_execution(message),
        Fault::Raise { kind, message } => {
            let message = if message.chars().count() > MAX_ERROR_MESSAGE {
                let head: String = message.chars().take(MAX_ERROR_MESSAGE).collect();
                format!("{}...", head)
            } else {
                message
            };
            Error::sandbox_execution(format!("Code execution failed: {}: {}", kind, message))
        }
    }
}

fn preview(command: &str) -> String {
    command.chars().take(50).collect()
}

/// Check the `commands` binding and return its trimmed entries.
fn check_output(commands: &Value, max_commands: usize) -> Result<Vec<String>> {
    let Value::List(list) = commands else {
        return Err(Error::sandbox_execution(format!(
            "Code must create a 'commands' list. Got {} instead.",
            commands.type_name()
        )));
    };
    let items = list.borrow();
    if items.len() > max_commands {
        return Err(Error::sandbox_execution(format!(
            "Too many commands generated: {} > {}. Please reduce the scope.",
            with_commas(items.len()),
            with_commas(max_commands)
        )));
    }

    let mut validated = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Value::Str(text) = item else {
            return Err(Error::sandbox_execution(format!(
                "Command {} is not a string: {}. All commands must be strings.",
                i,
                item.type_name()
            )));
        };
        let command = text.trim();
        let length = command.chars().count();
        if length > MAX_COMMAND_LENGTH {
            return Err(Error::sandbox_execution(format!(
                "Command {} too long: {} chars > {} max",
                i, length, MAX_COMMAND_LENGTH
            )));
        }
        if !command.starts_with('/') {
            return Err(Error::sandbox_execution(format!(
                "Command {} doesn't start with '/': {}...",
                i,
                preview(command)
            )));
        }
        let lowered = command.to_lowercase();
        if let Some(pattern) = BLOCKED_COMMAND_PATTERNS
            .iter()
            .find(|p| lowered.contains(**p))
        {
            return Err(Error::sandbox_execution(format!(
                "Command {} contains blocked pattern '{}': {}...",
                i,
                pattern,
                preview(command)
            )));
        }
        validated.push(command.to_string());
    }
    Ok(validated)
}

// =============================================================================
// CodeSandbox
// =============================================================================

/// Configured entry point used by the tool layer.
#[derive(Debug, Clone, Default)]
pub struct CodeSandbox {
    limits: SandboxLimits,
}

impl CodeSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Static checks only; nothing is executed.
    pub fn validate(&self, source: &str) -> Result<()> {
        validate_code(source, &self.limits).map(|_| ())
    }

    pub fn run_blocking(&self, source: &str) -> Result<Vec<String>> {
        execute_command_generator(source, &self.limits)
    }

    /// Run on the blocking pool so async callers are not stalled.
    pub async fn run(&self, source: String) -> Result<Vec<String>> {
        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || execute_command_generator(&source, &limits))
            .await
            .map_err(|e| Error::internal(format!("Sandbox task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages() {
        let err = fault_to_error(Fault::type_error("x".repeat(250)));
        let text = err.to_string();
        assert!(text.starts_with("Sandbox execution failed: Code execution failed: TypeError: xxx"));
        assert!(text.ends_with(&format!("{}...", "x".repeat(10))));
        assert_eq!(
            text.len(),
            "Sandbox execution failed: Code execution failed: TypeError: ".len() + 203
        );

        let err = fault_to_error(Fault::limit("range step cannot be zero"));
        assert_eq!(
            err.to_string(),
            "Sandbox execution failed: range step cannot be zero"
        );
    }

    #[test]
    fn test_output_must_be_list() {
        let err = check_output(&Value::Int(3), 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sandbox execution failed: Code must create a 'commands' list. Got int instead."
        );
    }

    #[test]
    fn test_output_trims_and_filters() {
        let commands = Value::list(vec![Value::str("  /setblock 0 0 0 stone  ")]);
        assert_eq!(
            check_output(&commands, 10).unwrap(),
            vec!["/setblock 0 0 0 stone".to_string()]
        );

        let commands = Value::list(vec![Value::str("/say banner")]);
        let err = check_output(&commands, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sandbox execution failed: Command 0 contains blocked pattern 'ban': /say banner..."
        );
    }

    #[test]
    fn test_pipeline_runs_on_large_stack() {
        let nested = format!("x = {}1{}\ncommands = []", "(".repeat(90), ")".repeat(90));
        assert!(execute_command_generator(&nested, &SandboxLimits::default())
            .unwrap()
            .is_empty());
    }
}
