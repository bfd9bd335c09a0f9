// src/learning/dqn.rs
//! Deep-Q-style learner over a linear value function
//!
//! Same training loop shape as DQN: ε-greedy exploration with a linear
//! schedule, a replay buffer, minibatch TD updates every `train_freq` steps
//! and a periodically synchronised target network.

use crate::env::Environment;
use crate::learning::{Learner, Policy, TrainingReport};
use crate::utils::errors::{LabError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Number of recent episodes the reported mean reward covers
const REPORT_WINDOW: usize = 100;

/// DQN hyperparameters
#[derive(Debug, Clone)]
pub struct DqnConfig {
    pub learning_rate: f32,
    pub gamma: f32,
    pub buffer_size: usize,
    pub learning_starts: u64,
    pub batch_size: usize,
    pub train_freq: u64,
    pub target_update_interval: u64,
    /// Fraction of the budget over which ε decays
    pub exploration_fraction: f64,
    pub exploration_initial_eps: f64,
    pub exploration_final_eps: f64,
    /// Absolute bound on a single TD error
    pub td_clip: f32,
    pub seed: Option<u64>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.99,
            buffer_size: 50_000,
            learning_starts: 1_000,
            batch_size: 32,
            train_freq: 4,
            target_update_interval: 1_000,
            exploration_fraction: 0.1,
            exploration_initial_eps: 1.0,
            exploration_final_eps: 0.05,
            td_clip: 10.0,
            seed: None,
        }
    }
}

struct Experience {
    obs: Vec<f32>,
    action: usize,
    reward: f32,
    next_obs: Vec<f32>,
    terminal: bool,
}

struct ReplayBuffer {
    capacity: usize,
    items: VecDeque<Experience>,
}

impl ReplayBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    fn push(&mut self, experience: Experience) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(experience);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

pub struct LinearDqn {
    config: DqnConfig,
}

impl LinearDqn {
    pub fn new(config: DqnConfig) -> Self {
        Self { config }
    }

    fn epsilon(&self, step: u64, total_timesteps: u64) -> f64 {
        let horizon = (self.config.exploration_fraction * total_timesteps as f64).max(1.0);
        let progress = (step as f64 / horizon).min(1.0);
        self.config.exploration_initial_eps
            + progress * (self.config.exploration_final_eps - self.config.exploration_initial_eps)
    }

    fn update(&self, online: &mut Policy, target: &Policy, buffer: &ReplayBuffer, rng: &mut StdRng) {
        let batch = self.config.batch_size.min(buffer.len());
        let scale = self.config.learning_rate / batch as f32;
        let clip = self.config.td_clip;

        for _ in 0..batch {
            let sample = &buffer.items[rng.gen_range(0..buffer.len())];
            let bootstrap = if sample.terminal {
                0.0
            } else {
                target
                    .q_values(&sample.next_obs)
                    .into_iter()
                    .fold(f32::NEG_INFINITY, f32::max)
            };
            let td_target = sample.reward + self.config.gamma * bootstrap;
            let td_error = (td_target - online.q_value(&sample.obs, sample.action)).clamp(-clip, clip);
            online.nudge(&sample.obs, sample.action, scale * td_error);
        }
    }
}

impl Default for LinearDqn {
    fn default() -> Self {
        Self::new(DqnConfig::default())
    }
}

impl Learner for LinearDqn {
    fn algorithm(&self) -> &'static str {
        "DQN"
    }

    fn train(&self, env: &mut dyn Environment, total_timesteps: u64) -> Result<TrainingReport> {
        let kind = env.kind();
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut online = Policy::zeros(self.algorithm(), kind);
        let mut target = online.clone();
        let mut buffer = ReplayBuffer::new(self.config.buffer_size);

        let mut episode_returns: VecDeque<f64> = VecDeque::with_capacity(REPORT_WINDOW);
        let mut episodes = 0usize;
        let mut episode_return = 0.0;

        info!("Training {} on {} for {} timesteps", self.algorithm(), kind, total_timesteps);

        let (mut obs, _) = env.reset()?;
        for step in 0..total_timesteps {
            let action = if rng.gen::<f64>() < self.epsilon(step, total_timesteps) {
                rng.gen_range(0..kind.action_count())
            } else {
                online.act(&obs)
            };

            let transition = env.step(action)?;
            episode_return += transition.reward;
            let done = transition.done();

            buffer.push(Experience {
                obs: std::mem::take(&mut obs),
                action,
                reward: transition.reward as f32,
                next_obs: transition.observation.clone(),
                terminal: transition.terminated,
            });

            if done {
                episodes += 1;
                if episode_returns.len() == REPORT_WINDOW {
                    episode_returns.pop_front();
                }
                episode_returns.push_back(episode_return);
                debug!("Episode {} finished with return {:.2}", episodes, episode_return);
                episode_return = 0.0;
                obs = env.reset()?.0;
            } else {
                obs = transition.observation;
            }

            if step >= self.config.learning_starts && step % self.config.train_freq.max(1) == 0 {
                self.update(&mut online, &target, &buffer, &mut rng);
            }

            if step % self.config.target_update_interval.max(1) == 0 {
                target = online.clone();
            }
        }

        if !online.is_finite() {
            return Err(LabError::InternalFailure(
                "training diverged: model parameters are not finite".into(),
            ));
        }

        let mean_episode_reward = if episode_returns.is_empty() {
            None
        } else {
            Some(episode_returns.iter().sum::<f64>() / episode_returns.len() as f64)
        };

        info!(
            "Training finished after {} episodes, recent mean return {:?}",
            episodes, mean_episode_reward
        );

        Ok(TrainingReport {
            policy: online,
            episodes,
            mean_episode_reward,
        })
    }
}
