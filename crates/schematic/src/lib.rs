#![deny(unused)]
//! Declarative schematic compiler for VibeCraft.
//!
//! ```text
//! JSON ──normalize──▶ Schematic ──compile──▶ /setblock ... ──pack──▶ /fill ...
//!                      (layers)   (palette,              (greedy boxes)
//!                                  rotation)
//! ```

pub mod catalog;
pub mod compile;
pub mod layout;
pub mod pack;
pub mod rotate;

pub use catalog::BlockCatalog;
pub use compile::{Compiled, PlaceMode, SchematicCompiler};
pub use layout::{ExpansionLimits, Layer, Schematic};
pub use pack::optimize_commands;
pub use rotate::Facing;
