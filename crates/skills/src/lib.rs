#![deny(unused)]
//! Agent-facing tools for VibeCraft.
//!
//! This crate provides:
//! - The closed set of tools ([`ToolKind`]) and their argument schemas
//! - Build handlers over the script sandbox and the schematic compiler
//! - World queries forwarded to the client bridge
//! - Lookup helpers for block names, player position, ground level and masks
//! - A static registry implementing [`vibecraft_core::ToolRegistry`]

pub mod args;
pub mod build;
pub mod context;
pub mod kind;
pub mod lookup;
pub mod registry;
pub mod world;

pub use context::SkillContext;
pub use kind::ToolKind;
pub use registry::{build_registry, SkillRegistry, SkillTool};
