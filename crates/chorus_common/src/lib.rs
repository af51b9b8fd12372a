//! Shared types and configuration for the chorus orchestration core.
//!
//! Leaf data model only: conversation messages, intents, candidates,
//! rolling statistics, config and the error taxonomy. No I/O here.

pub mod analysis;
pub mod answer;
pub mod config;
pub mod context;
pub mod error;
pub mod intent;
pub mod message;
pub mod stats;
