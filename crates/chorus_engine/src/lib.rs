//! chorus_engine: message orchestration over multiple model backends.
//!
//! One user utterance becomes either a dispatched local command or an
//! answer synthesized from several backends. `facade::Orchestrator` is the
//! entry point; everything else is the machinery behind it.

pub mod analyzer;
pub mod backend;
pub mod backends;
pub mod capability;
pub mod classifier;
pub mod desktop;
pub mod executor;
pub mod facade;
pub mod parsers;
pub mod pool;
pub mod prompt;
pub mod scorer;
pub mod store;
pub mod synthesizer;
pub mod telemetry;
pub mod weather;
