// src/simulation/environment.rs
//! Supported simulated environments and their fixed shapes

use crate::utils::errors::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Auxiliary per-step information returned alongside observations
pub type Info = serde_json::Map<String, serde_json::Value>;

/// Simulated environments the engine can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentKind {
    #[serde(rename = "LunarLander-v3")]
    LunarLander,
}

impl EnvironmentKind {
    pub const ALL: &'static [EnvironmentKind] = &[EnvironmentKind::LunarLander];

    /// Resolve an environment by its public name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| LabError::UnsupportedEnvironment(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnvironmentKind::LunarLander => "LunarLander-v3",
        }
    }

    /// Length of every observation vector
    pub fn observation_dim(&self) -> usize {
        match self {
            EnvironmentKind::LunarLander => 8,
        }
    }

    /// Number of discrete actions; valid actions are `0..action_count`
    pub fn action_count(&self) -> usize {
        match self {
            EnvironmentKind::LunarLander => 4,
        }
    }

    /// Episode length after which `truncated` is raised
    pub fn max_episode_steps(&self) -> u64 {
        match self {
            EnvironmentKind::LunarLander => 1000,
        }
    }

    /// Check a raw action against the discrete action set
    pub fn validate_action(&self, action: i64) -> Result<usize> {
        let action_count = self.action_count();
        usize::try_from(action)
            .ok()
            .filter(|a| *a < action_count)
            .ok_or(LabError::InvalidAction {
                action,
                action_count,
            })
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(
            EnvironmentKind::from_name("LunarLander-v3").unwrap(),
            EnvironmentKind::LunarLander
        );

        let err = EnvironmentKind::from_name("CartPole-v1").unwrap_err();
        assert!(matches!(err, LabError::UnsupportedEnvironment(ref n) if n == "CartPole-v1"));
    }

    #[test]
    fn test_validate_action() {
        let kind = EnvironmentKind::LunarLander;
        assert_eq!(kind.validate_action(0).unwrap(), 0);
        assert_eq!(kind.validate_action(3).unwrap(), 3);
        assert!(kind.validate_action(4).is_err());
        assert!(kind.validate_action(-1).is_err());
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&EnvironmentKind::LunarLander).unwrap();
        assert_eq!(json, "\"LunarLander-v3\"");
    }
}
