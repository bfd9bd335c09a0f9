// src/learning/policy.rs
//! Trained policy
//!
//! A linear action-value function: one weight row per action over the
//! observation plus a bias term. Acting picks the highest-valued action.

use crate::simulation::EnvironmentKind;
use crate::utils::errors::{LabError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Algorithm that produced the policy
    pub algorithm: String,

    /// Environment the policy was trained on
    pub environment: EnvironmentKind,

    pub observation_dim: usize,
    pub action_count: usize,

    /// Row-major `action_count × (observation_dim + 1)` weights, bias last
    weights: Vec<f32>,
}

impl Policy {
    /// Policy with all action values at zero
    pub fn zeros(algorithm: &str, environment: EnvironmentKind) -> Self {
        let observation_dim = environment.observation_dim();
        let action_count = environment.action_count();
        Self {
            algorithm: algorithm.to_string(),
            environment,
            observation_dim,
            action_count,
            weights: vec![0.0; action_count * (observation_dim + 1)],
        }
    }

    fn row_len(&self) -> usize {
        self.observation_dim + 1
    }

    fn row(&self, action: usize) -> &[f32] {
        let len = self.row_len();
        &self.weights[action * len..(action + 1) * len]
    }

    /// Estimated value of taking `action` after observing `obs`
    pub fn q_value(&self, obs: &[f32], action: usize) -> f32 {
        let row = self.row(action);
        let bias = row[self.observation_dim];
        row[..self.observation_dim]
            .iter()
            .zip(obs)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + bias
    }

    pub fn q_values(&self, obs: &[f32]) -> Vec<f32> {
        (0..self.action_count).map(|a| self.q_value(obs, a)).collect()
    }

    /// Greedy action
    pub fn act(&self, obs: &[f32]) -> usize {
        self.q_values(obs)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (action, q)| {
                if *q > best.1 {
                    (action, *q)
                } else {
                    best
                }
            })
            .0
    }

    /// Move `action`'s value estimate for `obs` by `step`
    pub(crate) fn nudge(&mut self, obs: &[f32], action: usize, step: f32) {
        let len = self.row_len();
        let row = &mut self.weights[action * len..(action + 1) * len];
        for (w, x) in row.iter_mut().zip(obs) {
            *w += step * x;
        }
        row[len - 1] += step;
    }

    pub fn is_finite(&self) -> bool {
        self.weights.iter().all(|w| w.is_finite())
    }

    /// Check the policy can drive `environment`
    pub fn check_compatible(&self, environment: EnvironmentKind) -> Result<()> {
        if self.environment != environment
            || self.observation_dim != environment.observation_dim()
            || self.action_count != environment.action_count()
            || self.weights.len() != self.action_count * self.row_len()
        {
            return Err(LabError::InternalFailure(format!(
                "Model trained on {} cannot drive {}",
                self.environment, environment
            )));
        }
        Ok(())
    }
}
