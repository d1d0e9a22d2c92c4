#![deny(unused)]
//! Governance for VibeCraft.
//!
//! This crate provides:
//! - Command guardrails (length, dangerous commands, build area)
//! - Distributed tracing
//! - Prometheus metrics

pub mod guard;
pub mod metrics;
pub mod tracing_layer;

pub use guard::{
    BuildAreaBounds, CommandGuard, CommandGuardrail, DangerousCommandFilter, GuardrailResult,
    LengthLimit, ViolationType,
};
pub use metrics::{
    setup_metrics_recorder, track_bridge_connect_failure, track_bridge_request,
    track_inbox_eviction, track_tool_call,
};
pub use tracing_layer::configure_tracing;
