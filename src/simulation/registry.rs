// src/simulation/registry.rs
//! Process-wide simulator registry
//!
//! Maps simulator ids to entities. Each entity sits behind its own mutex so a
//! step on one simulator never waits for a step on another.

use crate::observability::{SIMULATORS_GAUGE, SIMULATOR_STEPS};
use crate::simulation::environment::EnvironmentKind;
use crate::simulation::simulator::{
    ResetResult, Simulator, SimulatorConfig, SimulatorId, SimulatorSnapshot, StepResult,
};
use crate::utils::errors::{LabError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry owning every live simulator
pub struct SimulatorRegistry {
    simulators: DashMap<SimulatorId, Arc<Mutex<Simulator>>>,
}

impl SimulatorRegistry {
    pub fn new() -> Self {
        Self {
            simulators: DashMap::new(),
        }
    }

    /// Create a simulator for `environment`, reset to its first observation
    pub fn create(&self, environment: &str, config: Option<SimulatorConfig>) -> Result<SimulatorId> {
        let kind = EnvironmentKind::from_name(environment)?;
        let simulator = Simulator::new(kind, config.unwrap_or_default())?;
        let id = simulator.id();

        self.simulators.insert(id, Arc::new(Mutex::new(simulator)));
        metrics::gauge!(SIMULATORS_GAUGE).set(self.simulators.len() as f64);

        info!("Created {} simulator {}", kind, id);
        Ok(id)
    }

    pub fn list(&self) -> Vec<SimulatorId> {
        let mut ids: Vec<SimulatorId> = self.simulators.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self, id: SimulatorId) -> Result<SimulatorSnapshot> {
        let simulator = self.entry(id)?;
        let snapshot = simulator.lock().snapshot();
        Ok(snapshot)
    }

    pub fn step(&self, id: SimulatorId, action: i64) -> Result<StepResult> {
        let simulator = self.entry(id)?;
        let result = simulator.lock().step(action)?;
        metrics::counter!(SIMULATOR_STEPS).increment(1);
        Ok(result)
    }

    pub fn reset(&self, id: SimulatorId) -> Result<ResetResult> {
        let simulator = self.entry(id)?;
        let result = simulator.lock().reset();
        debug!("Reset simulator {}", id);
        Ok(result)
    }

    /// Remove a simulator and release its backend
    pub fn delete(&self, id: SimulatorId) -> Result<()> {
        let (_, simulator) = self
            .simulators
            .remove(&id)
            .ok_or_else(|| LabError::simulator_not_found(id))?;

        simulator.lock().close();
        metrics::gauge!(SIMULATORS_GAUGE).set(self.simulators.len() as f64);

        info!("Deleted simulator {}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.simulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.simulators.is_empty()
    }

    fn entry(&self, id: SimulatorId) -> Result<Arc<Mutex<Simulator>>> {
        self.simulators
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LabError::simulator_not_found(id))
    }
}

impl Default for SimulatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
