// src/env/local.rs
//! In-process environment backed by a private simulator, used by tests

use crate::env::{Environment, EnvironmentConnector, SimulatorTarget, Transition};
use crate::runtime::worker_pool::WorkerContext;
use crate::simulation::{EnvironmentKind, Info, Simulator, SimulatorConfig};
use crate::utils::errors::{LabError, Result};

pub struct LocalEnvironment {
    simulator: Simulator,
    closed: bool,
}

impl LocalEnvironment {
    pub fn new(kind: EnvironmentKind, config: SimulatorConfig) -> Result<Self> {
        Ok(Self {
            simulator: Simulator::new(kind, config)?,
            closed: false,
        })
    }
}

impl Environment for LocalEnvironment {
    fn kind(&self) -> EnvironmentKind {
        self.simulator.kind()
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        if self.closed {
            return Err(LabError::ProtocolError("environment is closed".into()));
        }
        let reset = self.simulator.reset();
        Ok((reset.state, reset.info))
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        if self.closed {
            return Err(LabError::ProtocolError("environment is closed".into()));
        }
        let step = self.simulator.step(action as i64)?;
        Ok(Transition {
            observation: step.state,
            reward: step.reward,
            terminated: step.terminated,
            truncated: step.truncated,
            info: step.info,
        })
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.simulator.close();
            self.closed = true;
        }
        Ok(())
    }
}

/// Connects every operation to a fresh in-process simulator
///
/// The target's simulator id and address are ignored; only its environment
/// name is honoured.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    config: SimulatorConfig,
}

impl LocalConnector {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

impl EnvironmentConnector for LocalConnector {
    fn connect(&self, _ctx: &WorkerContext, target: &SimulatorTarget) -> Result<Box<dyn Environment>> {
        let kind = EnvironmentKind::from_name(&target.environment)?;
        Ok(Box::new(LocalEnvironment::new(kind, self.config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_control_loop() {
        let mut env = LocalEnvironment::new(
            EnvironmentKind::LunarLander,
            SimulatorConfig {
                seed: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs.len(), 8);

        let step = env.step(2).unwrap();
        assert_eq!(step.observation.len(), 8);

        env.close().unwrap();
        env.close().unwrap();
        assert!(env.step(0).is_err());
    }
}
