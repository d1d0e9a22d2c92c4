//! Core traits for VibeCraft.
//!
//! - `skills`: tool contracts (Tool, ToolRegistry)
//! - `executor`: the single-command collaborator implemented by the bridge

pub mod executor;
pub mod skills;

pub use executor::*;
pub use skills::*;
