// src/learning/mod.rs
//! Training and evaluation routines
//!
//! The task runner treats a [`Learner`] as an opaque, synchronous routine that
//! drives an [`Environment`] until its budget is spent. The engine ships one
//! built-in learner, [`LinearDqn`].

pub mod dqn;
pub mod policy;
pub mod store;

pub use dqn::{DqnConfig, LinearDqn};
pub use policy::Policy;
pub use store::ModelStore;

use crate::env::Environment;
use crate::utils::errors::{LabError, Result};
use serde::Serialize;
use tracing::debug;

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub policy: Policy,
    pub episodes: usize,
    /// Mean return over the most recent completed episodes
    pub mean_episode_reward: Option<f64>,
}

/// Result of evaluating a policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub mean_reward: f64,
    pub std_reward: f64,
    pub episodes: u32,
}

/// Training/evaluation routine
pub trait Learner: Send + Sync {
    /// Short algorithm name used in model file names
    fn algorithm(&self) -> &'static str;

    /// Train a fresh policy for `total_timesteps` environment steps
    fn train(&self, env: &mut dyn Environment, total_timesteps: u64) -> Result<TrainingReport>;

    /// Run `episodes` greedy episodes and summarise their returns
    fn evaluate(&self, policy: &Policy, env: &mut dyn Environment, episodes: u32) -> Result<Evaluation> {
        evaluate_policy(policy, env, episodes)
    }
}

/// Greedy evaluation of `policy`
///
/// The standard deviation is the population deviation of episode returns.
pub fn evaluate_policy(policy: &Policy, env: &mut dyn Environment, episodes: u32) -> Result<Evaluation> {
    if episodes == 0 {
        return Err(LabError::InternalFailure(
            "evaluation needs at least one episode".into(),
        ));
    }
    policy.check_compatible(env.kind())?;

    let mut returns = Vec::with_capacity(episodes as usize);
    for episode in 0..episodes {
        let (mut obs, _) = env.reset()?;
        let mut total = 0.0;
        loop {
            let transition = env.step(policy.act(&obs))?;
            total += transition.reward;
            if transition.done() {
                break;
            }
            obs = transition.observation;
        }
        debug!("Evaluation episode {} returned {:.2}", episode, total);
        returns.push(total);
    }

    let (mean_reward, std_reward) = mean_and_std(&returns);
    Ok(Evaluation {
        mean_reward,
        std_reward,
        episodes,
    })
}

pub(crate) fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
