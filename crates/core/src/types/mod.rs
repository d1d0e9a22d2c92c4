//! Core type definitions for VibeCraft.
//!
//! Shared data structures passed between the tool layer and the HTTP surface.

pub mod tool;

pub use tool::*;
