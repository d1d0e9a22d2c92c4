#![deny(unused)]
//! HTTP gateway for VibeCraft.
//!
//! This crate exposes the tool registry to an agent over HTTP, together
//! with bridge housekeeping endpoints and the Prometheus scrape target.

pub mod error;
pub mod server;

pub use error::{status_for, ApiError, ErrorResponse};
pub use server::{GatewayConfig, GatewayServer};
