//! Application wiring: configuration and the per-frame engine.

pub mod config;
pub mod engine;

pub use config::Config;
pub use engine::{Engine, EngineCommand, EnginePhase};
