// src/lib.rs
//! SimLab Engine Library
//!
//! Coordinates reinforcement-learning training and evaluation runs against
//! simulated environments, exposing each run as a long-lived agent reachable
//! over HTTP.
//!
//! # Architecture
//!
//! - **simulation**: simulator entities, registry and the built-in lander physics
//! - **env**: the `{reset, step, close}` control-loop bridge to a simulator
//! - **learning**: the training/evaluation routine, policies and model storage
//! - **runtime**: agent lifecycle, worker pool and background task runner
//! - **server**: HTTP facades for the agent and simulator services
//! - **observability**: tracing and metrics
//! - **utils**: configuration and errors

pub mod env;
pub mod learning;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod simulation;
pub mod utils;

// Re-export commonly used types
pub use runtime::{AgentRegistry, TaskRunner, WorkerPool};
pub use simulation::SimulatorRegistry;
pub use utils::config::LabConfig;
pub use utils::errors::{LabError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
