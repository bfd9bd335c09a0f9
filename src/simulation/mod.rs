// src/simulation/mod.rs
//! Simulator registry and entities
//!
//! - **Environment**: supported environment names and their fixed shapes
//! - **Simulator**: one stateful simulation instance
//! - **Registry**: concurrency-safe id → simulator mapping
//! - **Lunar Lander**: built-in physics backend for `LunarLander-v3`

pub mod environment;
pub mod lunar_lander;
pub mod registry;
pub mod simulator;

pub use environment::{EnvironmentKind, Info};
pub use lunar_lander::LunarLander;
pub use registry::SimulatorRegistry;
pub use simulator::{
    BackendStep, ResetResult, SimulationBackend, Simulator, SimulatorConfig, SimulatorId,
    SimulatorSnapshot, StepResult,
};
