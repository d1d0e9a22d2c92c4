#![deny(unused)]
//! Core types, traits, and error definitions for VibeCraft.
//!
//! This crate provides the foundational building blocks shared by the
//! bridge, the script sandbox, the schematic compiler and the tool layer.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorClass, Result};
pub use traits::*;
pub use types::*;
