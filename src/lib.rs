//! Adapter that serves text and text+image generation over HTTP and forwards
//! each call to a generative-language backend.
//!
//! Requests are normalized into provider-neutral turns, sent through a
//! pluggable [`ai::GenerationProvider`], and the raw reply is reconciled into a
//! text result with an optional schema-constrained JSON payload.

pub mod ai;
pub mod assembler;
pub mod config;
pub mod contract;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod telemetry;

pub use error::{Error, ErrorCategory, Result};
