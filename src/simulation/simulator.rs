// src/simulation/simulator.rs
//! Simulator entity
//!
//! Owns one simulation instance and its latest observable state. State is
//! only ever written by [`Simulator::step`] and [`Simulator::reset`].

use crate::simulation::environment::{EnvironmentKind, Info};
use crate::simulation::lunar_lander::LunarLander;
use crate::utils::errors::{LabError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

pub type SimulatorId = Ulid;

/// Physics backend driven by a [`Simulator`]
pub trait SimulationBackend: Send {
    /// Start a new episode and return its initial observation
    fn reset(&mut self) -> Vec<f32>;

    /// Advance one tick with a validated action
    fn step(&mut self, action: usize) -> BackendStep;

    /// Release backend resources
    fn close(&mut self) {}
}

/// Raw outcome of one backend tick
#[derive(Debug, Clone)]
pub struct BackendStep {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
}

/// Creation-time configuration; every field defaults individually
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Continuous control (only the discrete protocol is served)
    pub continuous: bool,

    /// Gravitational acceleration, must lie in (-12, 0)
    pub gravity: f64,

    /// Apply lateral wind while airborne
    pub enable_wind: bool,

    /// Wind strength, within [0, 20]
    pub wind_power: f64,

    /// Rotational turbulence strength, within [0, 2]
    pub turbulence_power: f64,

    /// Seed for deterministic episodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

const MAX_WIND_POWER: f64 = 20.0;
const MAX_TURBULENCE_POWER: f64 = 2.0;

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            gravity: -10.0,
            enable_wind: false,
            wind_power: 15.0,
            turbulence_power: 1.5,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.continuous {
            return Err(LabError::InvalidConfig(
                "continuous control is not supported, actions are discrete".into(),
            ));
        }
        if !(self.gravity > -12.0 && self.gravity < 0.0) {
            return Err(LabError::InvalidConfig(format!(
                "gravity must be in (-12, 0), got {}",
                self.gravity
            )));
        }
        if !(0.0..=MAX_WIND_POWER).contains(&self.wind_power) {
            return Err(LabError::InvalidConfig(format!(
                "wind_power must be in [0, {}], got {}",
                MAX_WIND_POWER, self.wind_power
            )));
        }
        if !(0.0..=MAX_TURBULENCE_POWER).contains(&self.turbulence_power) {
            return Err(LabError::InvalidConfig(format!(
                "turbulence_power must be in [0, {}], got {}",
                MAX_TURBULENCE_POWER, self.turbulence_power
            )));
        }
        Ok(())
    }
}

/// Response to a reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResult {
    pub state: Vec<f32>,
    #[serde(default)]
    pub info: Info,
}

/// Response to a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub state: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    #[serde(default)]
    pub info: Info,
}

/// Full observable state plus the creation config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSnapshot {
    pub id: String,
    pub environment: EnvironmentKind,
    pub state: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub step_count: u64,
    pub info: Info,
    pub config: SimulatorConfig,
}

pub struct Simulator {
    id: SimulatorId,
    kind: EnvironmentKind,
    config: SimulatorConfig,
    observation: Vec<f32>,
    reward: f64,
    terminated: bool,
    truncated: bool,
    step_count: u64,
    info: Info,
    backend: Box<dyn SimulationBackend>,
}

impl Simulator {
    /// Build a simulator and reset it to its initial observation
    pub fn new(kind: EnvironmentKind, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;

        let backend: Box<dyn SimulationBackend> = match kind {
            EnvironmentKind::LunarLander => Box::new(LunarLander::new(config.clone())),
        };

        Ok(Self::with_backend(kind, config, backend))
    }

    pub(crate) fn with_backend(
        kind: EnvironmentKind,
        config: SimulatorConfig,
        backend: Box<dyn SimulationBackend>,
    ) -> Self {
        let mut simulator = Self {
            id: Ulid::new(),
            kind,
            config,
            observation: Vec::new(),
            reward: 0.0,
            terminated: false,
            truncated: false,
            step_count: 0,
            info: Info::new(),
            backend,
        };
        simulator.reset();
        simulator
    }

    pub fn id(&self) -> SimulatorId {
        self.id
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Start a new episode
    pub fn reset(&mut self) -> ResetResult {
        self.observation = self.backend.reset();
        self.reward = 0.0;
        self.terminated = false;
        self.truncated = false;
        self.step_count = 0;
        self.info = self.episode_info();

        ResetResult {
            state: self.observation.clone(),
            info: self.info.clone(),
        }
    }

    /// Advance one tick
    ///
    /// Stepping a finished episode repeats the terminal observation with zero
    /// reward until the next reset.
    pub fn step(&mut self, action: i64) -> Result<StepResult> {
        let action = self.kind.validate_action(action)?;
        self.step_count += 1;

        if self.terminated {
            self.reward = 0.0;
        } else {
            let outcome = self.backend.step(action);
            self.observation = outcome.observation;
            self.reward = outcome.reward;
            self.terminated = outcome.terminated;
        }
        self.truncated = self.step_count >= self.kind.max_episode_steps();
        self.info = self.episode_info();

        Ok(StepResult {
            state: self.observation.clone(),
            reward: self.reward,
            terminated: self.terminated,
            truncated: self.truncated,
            info: self.info.clone(),
        })
    }

    pub fn snapshot(&self) -> SimulatorSnapshot {
        SimulatorSnapshot {
            id: self.id.to_string(),
            environment: self.kind,
            state: self.observation.clone(),
            reward: self.reward,
            terminated: self.terminated,
            truncated: self.truncated,
            step_count: self.step_count,
            info: self.info.clone(),
            config: self.config.clone(),
        }
    }

    /// Release the backend
    pub fn close(&mut self) {
        debug!("Closing simulator {}", self.id);
        self.backend.close();
    }

    fn episode_info(&self) -> Info {
        let mut info = Info::new();
        info.insert("step_count".into(), self.step_count.into());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend that never terminates, for exercising truncation
    struct Drift {
        position: f32,
    }

    impl SimulationBackend for Drift {
        fn reset(&mut self) -> Vec<f32> {
            self.position = 0.0;
            vec![self.position; 8]
        }

        fn step(&mut self, action: usize) -> BackendStep {
            self.position += action as f32;
            BackendStep {
                observation: vec![self.position; 8],
                reward: 1.0,
                terminated: false,
            }
        }
    }

    fn lander() -> Simulator {
        Simulator::new(
            EnvironmentKind::LunarLander,
            SimulatorConfig {
                seed: Some(5),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_created_simulator_is_reset() {
        let sim = lander();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.step_count, 0);
        assert!(!snapshot.terminated);
        assert!(!snapshot.truncated);
        assert_eq!(snapshot.state.len(), 8);
        assert_eq!(snapshot.config.gravity, -10.0);
    }

    #[test]
    fn test_step_and_reset_counting() {
        let mut sim = lander();

        let step = sim.step(2).unwrap();
        assert_eq!(sim.step_count(), 1);
        assert_eq!(step.state.len(), 8);

        sim.step(0).unwrap();
        assert_eq!(sim.step_count(), 2);

        let reset = sim.reset();
        assert_eq!(sim.step_count(), 0);
        assert_eq!(reset.state.len(), 8);
        assert!(!sim.snapshot().terminated);
    }

    #[test]
    fn test_invalid_action_leaves_state_untouched() {
        let mut sim = lander();
        let err = sim.step(9).unwrap_err();
        assert!(matches!(err, LabError::InvalidAction { action: 9, .. }));
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn test_truncation_after_episode_limit() {
        let mut sim = Simulator::with_backend(
            EnvironmentKind::LunarLander,
            SimulatorConfig::default(),
            Box::new(Drift { position: 0.0 }),
        );

        for _ in 0..999 {
            assert!(!sim.step(0).unwrap().truncated);
        }
        let last = sim.step(0).unwrap();
        assert!(last.truncated);
        assert!(!last.terminated);
    }

    #[test]
    fn test_stepping_finished_episode_repeats_terminal_state() {
        let mut sim = lander();
        let mut terminal = None;
        for _ in 0..500 {
            let step = sim.step(0).unwrap();
            if step.terminated {
                terminal = Some(step);
                break;
            }
        }
        let terminal = terminal.unwrap();

        let after = sim.step(1).unwrap();
        assert!(after.terminated);
        assert_eq!(after.reward, 0.0);
        assert_eq!(after.state, terminal.state);
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulatorConfig::default().validate().is_ok());

        let bad = [
            SimulatorConfig {
                continuous: true,
                ..Default::default()
            },
            SimulatorConfig {
                gravity: -15.0,
                ..Default::default()
            },
            SimulatorConfig {
                gravity: 0.0,
                ..Default::default()
            },
            SimulatorConfig {
                wind_power: -1.0,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(LabError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_wind_and_turbulence_are_bounded() {
        let edge = SimulatorConfig {
            enable_wind: true,
            wind_power: 20.0,
            turbulence_power: 2.0,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());

        let bad = [
            SimulatorConfig {
                wind_power: 1e9,
                ..Default::default()
            },
            SimulatorConfig {
                wind_power: f64::NAN,
                ..Default::default()
            },
            SimulatorConfig {
                wind_power: f64::INFINITY,
                ..Default::default()
            },
            SimulatorConfig {
                turbulence_power: 3.0,
                ..Default::default()
            },
            SimulatorConfig {
                turbulence_power: -0.5,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(LabError::InvalidConfig(_))));
            assert!(matches!(
                Simulator::new(EnvironmentKind::LunarLander, config),
                Err(LabError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SimulatorConfig =
            serde_json::from_value(serde_json::json!({"gravity": -5.0})).unwrap();
        assert_eq!(config.gravity, -5.0);
        assert_eq!(config.wind_power, 15.0);
        assert!(!config.enable_wind);
    }
}
