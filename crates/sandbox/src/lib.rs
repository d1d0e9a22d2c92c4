#![deny(unused)]
//! Restricted script sandbox for command generation.
//!
//! Generator scripts are written in a small Python-like language. A script
//! fills the pre-bound `commands` list with slash commands; everything else
//! it computes is discarded.
//!
//! # Pipeline
//!
//! ```text
//! source ─▶ validate ─▶ interpret ─▶ check output ─▶ Vec<String>
//!           │            │             │
//!           │            │             └─ list of strings, prefix "/",
//!           │            │                length, blocked patterns
//!           │            └─ curated builtins, iteration budget,
//!           │               wall-clock deadline
//!           └─ length, raw denylist, parse, node whitelist,
//!              blocked names, nesting depth, loop estimate
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use vibecraft_sandbox::CodeSandbox;
//!
//! let sandbox = CodeSandbox::new(config.sandbox.clone());
//! let commands = sandbox
//!     .run("for x in range(3):\n    commands.append(f'/setblock {x} 64 0 stone')".into())
//!     .await?;
//! ```

pub mod ast;
pub mod builtins;
pub mod engine;
pub mod format;
pub mod interp;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod validate;
pub mod value;

pub use engine::{execute_command_generator, CodeSandbox};
pub use validate::validate_code;
