pub mod backend;
pub mod config;
pub mod formatter;
pub mod jobs;
pub mod orchestrator;
pub mod resolution;
pub mod session;
pub mod strategy;

pub use jobpilot_common::error;
pub use jobpilot_common::protocol;
