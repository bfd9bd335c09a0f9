// src/runtime/agent_registry.rs
//! Agent registry and lifecycle state machine
//!
//! ```text
//!        begin_operation(Train)          begin_operation(Predict)
//!   Idle ───────────────────► Training   Idle ───────────────────► Predicting
//!    ▲                          │         ▲                           │
//!    └──── end_operation ───────┘         └────── end_operation ──────┘
//! ```
//!
//! The Idle check and the Busy transition happen under the map entry's write
//! guard, so two concurrent `begin_operation` calls on one agent can never
//! both succeed. `delete` uses the same guard via `remove_if`.

use crate::learning::Policy;
use crate::observability::{AGENTS_GAUGE, OPERATIONS_COMPLETED, OPERATIONS_STARTED};
use crate::utils::errors::{LabError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use ulid::Ulid;

pub type AgentId = Ulid;

/// Agent lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Training,
    Predicting,
}

impl AgentStatus {
    pub fn is_busy(&self) -> bool {
        !matches!(self, AgentStatus::Idle)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Training => "training",
            AgentStatus::Predicting => "predicting",
        })
    }
}

/// Kind of operation an agent can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Train,
    Predict,
}

impl OperationKind {
    pub fn status(&self) -> AgentStatus {
        match self {
            OperationKind::Train => AgentStatus::Training,
            OperationKind::Predict => AgentStatus::Predicting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Train => "train",
            OperationKind::Predict => "predict",
        }
    }
}

/// How an operation ended
#[derive(Debug)]
pub enum OperationOutcome {
    /// Completed; a trained policy replaces the agent's model wholesale
    Succeeded {
        summary: String,
        model: Option<Policy>,
    },
    Failed {
        error: String,
    },
}

/// Proof that `begin_operation` moved an agent to Busy
///
/// Carries a read-only handle to the agent's model as of the transition.
#[derive(Debug, Clone)]
pub struct OperationGrant {
    pub agent_id: AgentId,
    pub kind: OperationKind,
    pub model: Option<Arc<Policy>>,
}

/// Agent entity
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    status: AgentStatus,
    status_timestamp: Instant,
    result_message: Option<String>,
    error_message: Option<String>,
    model: Option<Arc<Policy>>,
}

impl Agent {
    fn new() -> Self {
        Self {
            id: Ulid::new(),
            status: AgentStatus::Idle,
            status_timestamp: Instant::now(),
            result_message: None,
            error_message: None,
            model: None,
        }
    }

    fn view(&self) -> AgentView {
        AgentView {
            agent_id: self.id.to_string(),
            status: self.status,
            elapsed_time: self.status_timestamp.elapsed().as_secs_f64(),
            result_message: self.result_message.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Externally visible agent state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentView {
    pub agent_id: String,
    pub status: AgentStatus,
    /// Seconds since the last status transition
    pub elapsed_time: f64,
    pub result_message: Option<String>,
    pub error_message: Option<String>,
}

/// Registry owning every agent
pub struct AgentRegistry {
    agents: DashMap<AgentId, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
        }
    }

    /// Allocate a new Idle agent without a model
    pub fn create(&self) -> AgentId {
        let agent = Agent::new();
        let id = agent.id;
        self.agents.insert(id, agent);
        metrics::gauge!(AGENTS_GAUGE).set(self.agents.len() as f64);

        info!("Created agent {}", id);
        id
    }

    pub fn get(&self, id: AgentId) -> Result<AgentView> {
        self.agents
            .get(&id)
            .map(|agent| agent.view())
            .ok_or_else(|| LabError::agent_not_found(id))
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn list(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Remove an Idle agent
    pub fn delete(&self, id: AgentId) -> Result<()> {
        if self
            .agents
            .remove_if(&id, |_, agent| !agent.status.is_busy())
            .is_some()
        {
            metrics::gauge!(AGENTS_GAUGE).set(self.agents.len() as f64);
            info!("Deleted agent {}", id);
            return Ok(());
        }

        match self.agents.get(&id) {
            Some(agent) => Err(LabError::Conflict(format!(
                "Cannot delete agent {} while it is {}. Please wait until it is idle.",
                id, agent.status
            ))),
            None => Err(LabError::agent_not_found(id)),
        }
    }

    /// Atomically move an Idle agent into `kind`'s Busy status
    pub fn begin_operation(&self, id: AgentId, kind: OperationKind) -> Result<OperationGrant> {
        let mut agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| LabError::agent_not_found(id))?;

        if agent.status.is_busy() {
            return Err(LabError::Conflict(format!(
                "Agent {} is currently {}. Please wait until it is idle.",
                id, agent.status
            )));
        }

        agent.status = kind.status();
        agent.status_timestamp = Instant::now();
        agent.result_message = None;
        agent.error_message = None;

        metrics::counter!(OPERATIONS_STARTED, "kind" => kind.as_str()).increment(1);
        info!("Agent {} is now {}", id, agent.status);

        Ok(OperationGrant {
            agent_id: id,
            kind,
            model: agent.model.clone(),
        })
    }

    /// Record an operation's outcome and return the agent to Idle
    pub fn end_operation(&self, grant: &OperationGrant, outcome: OperationOutcome) -> Result<()> {
        let mut agent = self
            .agents
            .get_mut(&grant.agent_id)
            .ok_or_else(|| LabError::agent_not_found(grant.agent_id))?;

        if agent.status != grant.kind.status() {
            warn!(
                "Agent {} ended {} while {}",
                grant.agent_id,
                grant.kind.as_str(),
                agent.status
            );
        }

        let label = match outcome {
            OperationOutcome::Succeeded { summary, model } => {
                if let Some(model) = model {
                    agent.model = Some(Arc::new(model));
                }
                info!("Agent {} finished {}: {}", grant.agent_id, grant.kind.as_str(), summary);
                agent.result_message = Some(summary);
                agent.error_message = None;
                "success"
            }
            OperationOutcome::Failed { error } => {
                warn!("Agent {} failed {}: {}", grant.agent_id, grant.kind.as_str(), error);
                agent.error_message = Some(error);
                agent.result_message = None;
                "failure"
            }
        };

        agent.status = AgentStatus::Idle;
        agent.status_timestamp = Instant::now();

        metrics::counter!(
            OPERATIONS_COMPLETED,
            "kind" => grant.kind.as_str(),
            "outcome" => label
        )
        .increment(1);
        Ok(())
    }

    /// Current model handle, if the agent has one
    #[cfg(test)]
    pub(crate) fn model(&self, id: AgentId) -> Result<Option<Arc<Policy>>> {
        self.agents
            .get(&id)
            .map(|agent| agent.model.clone())
            .ok_or_else(|| LabError::agent_not_found(id))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::EnvironmentKind;
    use std::sync::Barrier;
    use std::thread;

    fn policy() -> Policy {
        Policy::zeros("DQN", EnvironmentKind::LunarLander)
    }

    #[test]
    fn test_new_agent_is_idle_and_empty() {
        let registry = AgentRegistry::new();
        let id = registry.create();

        let view = registry.get(id).unwrap();
        assert_eq!(view.status, AgentStatus::Idle);
        assert!(view.result_message.is_none());
        assert!(view.error_message.is_none());
        assert!(registry.model(id).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_begin_operation_admits_one() {
        for _ in 0..50 {
            let registry = Arc::new(AgentRegistry::new());
            let id = registry.create();
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [OperationKind::Train, OperationKind::Predict]
                .into_iter()
                .map(|kind| {
                    let registry = Arc::clone(&registry);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        registry.begin_operation(id, kind)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let admitted = results.iter().filter(|r| r.is_ok()).count();
            let conflicts = results
                .iter()
                .filter(|r| matches!(r, Err(LabError::Conflict(_))))
                .count();

            assert_eq!(admitted, 1);
            assert_eq!(conflicts, 1);
        }
    }

    #[test]
    fn test_end_operation_sets_exactly_one_message() {
        let registry = AgentRegistry::new();
        let id = registry.create();

        let grant = registry.begin_operation(id, OperationKind::Train).unwrap();
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Training);
        registry
            .end_operation(
                &grant,
                OperationOutcome::Succeeded {
                    summary: "saved".into(),
                    model: Some(policy()),
                },
            )
            .unwrap();

        let view = registry.get(id).unwrap();
        assert_eq!(view.status, AgentStatus::Idle);
        assert_eq!(view.result_message.as_deref(), Some("saved"));
        assert!(view.error_message.is_none());
        assert!(registry.model(id).unwrap().is_some());

        let grant = registry.begin_operation(id, OperationKind::Predict).unwrap();
        // Messages are cleared as the new operation starts
        let view = registry.get(id).unwrap();
        assert!(view.result_message.is_none());
        assert_eq!(view.status, AgentStatus::Predicting);
        assert!(grant.model.is_some());

        registry
            .end_operation(&grant, OperationOutcome::Failed { error: "boom".into() })
            .unwrap();
        let view = registry.get(id).unwrap();
        assert_eq!(view.status, AgentStatus::Idle);
        assert!(view.result_message.is_none());
        assert_eq!(view.error_message.as_deref(), Some("boom"));
        // A failed operation keeps the previous model
        assert!(registry.model(id).unwrap().is_some());
    }

    #[test]
    fn test_busy_agent_rejects_new_operation() {
        let registry = AgentRegistry::new();
        let id = registry.create();

        registry.begin_operation(id, OperationKind::Train).unwrap();
        let err = registry.begin_operation(id, OperationKind::Predict).unwrap_err();
        assert!(matches!(err, LabError::Conflict(_)));
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Training);
    }

    #[test]
    fn test_delete_busy_then_idle() {
        let registry = AgentRegistry::new();
        let id = registry.create();

        let grant = registry.begin_operation(id, OperationKind::Train).unwrap();
        assert!(matches!(registry.delete(id), Err(LabError::Conflict(_))));
        assert_eq!(registry.list(), vec![id]);

        registry
            .end_operation(&grant, OperationOutcome::Failed { error: "stopped".into() })
            .unwrap();
        registry.delete(id).unwrap();

        assert!(matches!(registry.get(id), Err(LabError::NotFound { .. })));
        assert!(matches!(registry.delete(id), Err(LabError::NotFound { .. })));
    }

    #[test]
    fn test_unknown_agent() {
        let registry = AgentRegistry::new();
        let missing = Ulid::new();
        assert!(matches!(
            registry.begin_operation(missing, OperationKind::Train),
            Err(LabError::NotFound { .. })
        ));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Predicting).unwrap(),
            "\"predicting\""
        );
    }
}
