// src/server/agent_service.rs
//! Agent service facade
//!
//! Train and predict requests are validated synchronously in a fixed order:
//! the agent must exist (404), the body must be well formed (400), then the
//! busy gate admits or rejects the operation (400). Only an admitted
//! operation is handed to the [`TaskRunner`]; the response is 202 and never
//! waits for the work.

use crate::env::SimulatorTarget;
use crate::learning::ModelStore;
use crate::runtime::{AgentId, AgentRegistry, OperationKind, OperationSpec, TaskRunner};
use crate::server::http::{
    json_response, method_not_allowed, not_found, parse_id, read_json, segments, HttpResponse,
    HttpService,
};
use crate::utils::config::LabConfig;
use crate::utils::errors::{LabError, Result};
use hyper::body::Incoming;
use hyper::{Method, Request, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Values used when a request omits an optional parameter
#[derive(Debug, Clone)]
pub struct AgentDefaults {
    pub api_url: String,
    pub total_timesteps: u64,
    pub eval_episodes: u32,
}

impl AgentDefaults {
    pub fn from_config(config: &LabConfig) -> Self {
        Self {
            api_url: config.services.simulator_api_url.clone(),
            total_timesteps: config.runtime.default_total_timesteps,
            eval_episodes: config.runtime.default_eval_episodes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrainRequest {
    simulator_id: String,
    simulator_environment: String,
    api_url: Option<String>,
    total_timesteps: Option<u64>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    simulator_id: String,
    simulator_environment: String,
    api_url: Option<String>,
    eval_episodes: Option<u32>,
    #[serde(alias = "load_path")]
    save_filename: Option<String>,
}

pub struct AgentService {
    registry: Arc<AgentRegistry>,
    runner: Arc<TaskRunner>,
    defaults: AgentDefaults,
}

impl AgentService {
    pub fn new(registry: Arc<AgentRegistry>, runner: Arc<TaskRunner>, defaults: AgentDefaults) -> Self {
        Self {
            registry,
            runner,
            defaults,
        }
    }

    fn create(&self) -> HttpResponse {
        let id = self.registry.create();
        json_response(
            StatusCode::OK,
            &json!({ "message": "Created agent", "agent_id": id.to_string() }),
        )
    }

    fn list(&self) -> HttpResponse {
        let ids: Vec<String> = self.registry.list().iter().map(|id| id.to_string()).collect();
        json_response(StatusCode::OK, &json!({ "agents": ids }))
    }

    fn get(&self, id: &str) -> Result<HttpResponse> {
        let id = parse_id(id, "Agent")?;
        Ok(json_response(StatusCode::OK, &self.registry.get(id)?))
    }

    fn delete(&self, id: &str) -> Result<HttpResponse> {
        let id = parse_id(id, "Agent")?;
        self.registry.delete(id)?;
        Ok(json_response(
            StatusCode::OK,
            &json!({ "message": format!("Deleted agent {}", id) }),
        ))
    }

    fn existing(&self, id: &str) -> Result<AgentId> {
        let id = parse_id(id, "Agent")?;
        if !self.registry.contains(id) {
            return Err(LabError::agent_not_found(id));
        }
        Ok(id)
    }

    fn target(&self, simulator_id: String, environment: String, api_url: Option<String>) -> SimulatorTarget {
        SimulatorTarget {
            simulator_id,
            environment,
            api_url: api_url.unwrap_or_else(|| self.defaults.api_url.clone()),
        }
    }

    async fn train(&self, id: &str, req: Request<Incoming>) -> Result<HttpResponse> {
        let id = self.existing(id)?;
        let body: TrainRequest = read_json(req).await?;

        let total_timesteps = body.total_timesteps.unwrap_or(self.defaults.total_timesteps);
        if total_timesteps == 0 {
            return Err(LabError::BadRequest("total_timesteps must be positive".into()));
        }
        if let Some(name) = body.filename.as_deref() {
            ModelStore::sanitize(name)?;
        }

        let spec = OperationSpec::Train {
            total_timesteps,
            filename: body.filename,
        };
        let target = self.target(body.simulator_id, body.simulator_environment, body.api_url);
        self.admit(id, target, spec)
    }

    async fn predict(&self, id: &str, req: Request<Incoming>) -> Result<HttpResponse> {
        let id = self.existing(id)?;
        let body: PredictRequest = read_json(req).await?;

        let eval_episodes = body.eval_episodes.unwrap_or(self.defaults.eval_episodes);
        if eval_episodes == 0 {
            return Err(LabError::BadRequest("eval_episodes must be positive".into()));
        }
        if let Some(name) = body.save_filename.as_deref() {
            ModelStore::sanitize(name)?;
        }

        let spec = OperationSpec::Predict {
            eval_episodes,
            load_filename: body.save_filename,
        };
        let target = self.target(body.simulator_id, body.simulator_environment, body.api_url);
        self.admit(id, target, spec)
    }

    /// Busy gate, then hand-off to the runner
    fn admit(&self, id: AgentId, target: SimulatorTarget, spec: OperationSpec) -> Result<HttpResponse> {
        let kind = spec.kind();
        let grant = self.registry.begin_operation(id, kind)?;
        self.runner.submit(grant, target, spec)?;

        let verb = match kind {
            OperationKind::Train => "training",
            OperationKind::Predict => "prediction",
        };
        Ok(json_response(
            StatusCode::ACCEPTED,
            &json!({ "message": format!("Agent {} {} started.", id, verb) }),
        ))
    }

    fn health(&self) -> HttpResponse {
        json_response(
            StatusCode::OK,
            &json!({
                "status": "healthy",
                "agents": self.registry.len(),
                "workers": self.runner.stats(),
            }),
        )
    }
}

impl HttpService for AgentService {
    fn name(&self) -> &'static str {
        "agent"
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<HttpResponse> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match segments(&path).as_slice() {
            ["health"] => match method {
                Method::GET => Ok(self.health()),
                _ => Ok(method_not_allowed()),
            },
            ["agents"] => match method {
                Method::POST => Ok(self.create()),
                Method::GET => Ok(self.list()),
                _ => Ok(method_not_allowed()),
            },
            ["agents", id] => match method {
                Method::GET => self.get(id),
                Method::DELETE => self.delete(id),
                _ => Ok(method_not_allowed()),
            },
            ["agents", id, "train"] => match method {
                Method::POST => self.train(id, req).await,
                _ => Ok(method_not_allowed()),
            },
            ["agents", id, "predict"] => match method {
                Method::POST => self.predict(id, req).await,
                _ => Ok(method_not_allowed()),
            },
            _ => Ok(not_found()),
        }
    }
}
