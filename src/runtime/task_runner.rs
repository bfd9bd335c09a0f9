// src/runtime/task_runner.rs
//! Background execution of train/predict operations
//!
//! The request path calls [`AgentRegistry::begin_operation`] and hands the
//! resulting grant to [`TaskRunner::submit`], which only enqueues. On the
//! worker the operation connects its environment, runs the learner and always
//! finishes with exactly one `end_operation`, whether the work returned,
//! failed or panicked.
//!
//! ```text
//! submit(grant) ──► WorkerPool ──► connect ──► learner ──► end_operation
//!                                    │                        ▲
//!                                    └── EnvironmentGuard ────┘ (close on drop)
//! ```

use crate::env::{EnvironmentConnector, EnvironmentGuard, SimulatorTarget};
use crate::learning::{Learner, ModelStore, Policy};
use crate::observability::OPERATION_DURATION;
use crate::runtime::agent_registry::{
    AgentRegistry, OperationGrant, OperationKind, OperationOutcome,
};
use crate::runtime::worker_pool::{PoolStats, WorkerContext, WorkerPool};
use crate::utils::errors::{LabError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub const NO_MODEL_MESSAGE: &str = "Agent has no trained model. Either train or load a model.";

/// Parameters of one scheduled operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSpec {
    Train {
        total_timesteps: u64,
        /// Model file name; timestamped when absent
        filename: Option<String>,
    },
    Predict {
        eval_episodes: u32,
        /// Stored model to evaluate instead of the agent's own
        load_filename: Option<String>,
    },
}

impl OperationSpec {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationSpec::Train { .. } => OperationKind::Train,
            OperationSpec::Predict { .. } => OperationKind::Predict,
        }
    }
}

/// Collaborators shared by every job
struct Shared {
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn EnvironmentConnector>,
    learner: Arc<dyn Learner>,
    store: ModelStore,
}

/// Runs operations on a dedicated worker pool
pub struct TaskRunner {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl TaskRunner {
    pub fn new(
        registry: Arc<AgentRegistry>,
        pool: WorkerPool,
        connector: Arc<dyn EnvironmentConnector>,
        learner: Arc<dyn Learner>,
        store: ModelStore,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                connector,
                learner,
                store,
            }),
            pool,
        }
    }

    /// Enqueue the operation `grant` admitted; never waits for it
    ///
    /// If the pool refuses the job the agent is returned to Idle with the
    /// error recorded before the error is handed back.
    pub fn submit(&self, grant: OperationGrant, target: SimulatorTarget, spec: OperationSpec) -> Result<()> {
        if grant.kind != spec.kind() {
            let err = LabError::InternalFailure(format!(
                "{} grant cannot run a {} operation",
                grant.kind.as_str(),
                spec.kind().as_str()
            ));
            self.shared.registry.end_operation(
                &grant,
                OperationOutcome::Failed {
                    error: err.to_string(),
                },
            )?;
            return Err(err);
        }

        let shared = Arc::clone(&self.shared);
        let job_grant = grant.clone();

        let submitted = self.pool.submit(Box::new(move |ctx: &WorkerContext| {
            shared.run(ctx, &job_grant, &target, spec);
        }));

        if let Err(e) = submitted {
            error!("Could not schedule {} for agent {}: {}", grant.kind.as_str(), grant.agent_id, e);
            self.shared.registry.end_operation(
                &grant,
                OperationOutcome::Failed {
                    error: e.to_string(),
                },
            )?;
            return Err(e);
        }

        info!("Scheduled {} for agent {}", grant.kind.as_str(), grant.agent_id);
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Shared {
    fn run(&self, ctx: &WorkerContext, grant: &OperationGrant, target: &SimulatorTarget, spec: OperationSpec) {
        let started = Instant::now();
        info!(
            "Worker {} running {} for agent {} on simulator {}",
            ctx.worker_id(),
            grant.kind.as_str(),
            grant.agent_id,
            target.simulator_id
        );

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.execute(ctx, grant, target, spec))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => OperationOutcome::Failed { error: e.to_string() },
            Err(payload) => OperationOutcome::Failed {
                error: LabError::InternalFailure(format!(
                    "Operation panicked: {}",
                    panic_message(payload.as_ref())
                ))
                .to_string(),
            },
        };

        metrics::histogram!(OPERATION_DURATION, "kind" => grant.kind.as_str())
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = self.registry.end_operation(grant, outcome) {
            error!("Agent {} vanished while {}: {}", grant.agent_id, grant.kind.as_str(), e);
        }
    }

    fn execute(
        &self,
        ctx: &WorkerContext,
        grant: &OperationGrant,
        target: &SimulatorTarget,
        spec: OperationSpec,
    ) -> Result<OperationOutcome> {
        match spec {
            OperationSpec::Train {
                total_timesteps,
                filename,
            } => {
                let mut env = EnvironmentGuard::new(self.connector.connect(ctx, target)?);
                let report = self.learner.train(&mut *env, total_timesteps)?;
                let path = self.store.save(&report.policy, filename.as_deref())?;

                let mean = report
                    .mean_episode_reward
                    .map(|r| format!("{:.2}", r))
                    .unwrap_or_else(|| "n/a".to_string());

                Ok(OperationOutcome::Succeeded {
                    summary: format!(
                        "Model saved to {} ({} episodes, mean episode reward {})",
                        path.display(),
                        report.episodes,
                        mean
                    ),
                    model: Some(report.policy),
                })
            }
            OperationSpec::Predict {
                eval_episodes,
                load_filename,
            } => {
                let policy: Arc<Policy> = match load_filename {
                    Some(name) => Arc::new(self.store.load(&name)?),
                    None => grant
                        .model
                        .clone()
                        .ok_or_else(|| LabError::InternalFailure(NO_MODEL_MESSAGE.into()))?,
                };

                let mut env = EnvironmentGuard::new(self.connector.connect(ctx, target)?);
                let evaluation = self.learner.evaluate(&policy, &mut *env, eval_episodes)?;

                Ok(OperationOutcome::Succeeded {
                    summary: format!(
                        "Mean reward: {:.2} +/- {:.2} over {} episodes",
                        evaluation.mean_reward, evaluation.std_reward, evaluation.episodes
                    ),
                    model: None,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
