// src/server/simulator_service.rs
//! Simulator service facade
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /simulators` | create |
//! | `GET /simulators` | list |
//! | `GET/DELETE /simulators/{id}` | snapshot / delete |
//! | `POST /simulators/{id}/reset` | reset |
//! | `POST /simulators/{id}/step` | step |
//! | `GET /health` | liveness |

use crate::server::http::{
    json_response, method_not_allowed, not_found, parse_id, read_json, segments, HttpResponse,
    HttpService,
};
use crate::simulation::{SimulatorConfig, SimulatorRegistry};
use crate::utils::errors::Result;
use hyper::body::Incoming;
use hyper::{Method, Request, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateSimulatorRequest {
    environment: String,
    #[serde(default)]
    config: Option<SimulatorConfig>,
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    action: i64,
}

pub struct SimulatorService {
    registry: Arc<SimulatorRegistry>,
}

impl SimulatorService {
    pub fn new(registry: Arc<SimulatorRegistry>) -> Self {
        Self { registry }
    }

    async fn create(&self, req: Request<Incoming>) -> Result<HttpResponse> {
        let body: CreateSimulatorRequest = read_json(req).await?;
        let id = self.registry.create(&body.environment, body.config)?;
        Ok(json_response(
            StatusCode::OK,
            &json!({ "message": "Created simulator", "simulator_id": id.to_string() }),
        ))
    }

    fn list(&self) -> HttpResponse {
        let ids: Vec<String> = self.registry.list().iter().map(|id| id.to_string()).collect();
        json_response(StatusCode::OK, &json!({ "simulators": ids }))
    }

    fn snapshot(&self, id: &str) -> Result<HttpResponse> {
        let id = parse_id(id, "Simulator")?;
        Ok(json_response(StatusCode::OK, &self.registry.snapshot(id)?))
    }

    fn delete(&self, id: &str) -> Result<HttpResponse> {
        let id = parse_id(id, "Simulator")?;
        self.registry.delete(id)?;
        Ok(json_response(
            StatusCode::OK,
            &json!({ "message": format!("Deleted simulator {}", id) }),
        ))
    }

    fn reset(&self, id: &str) -> Result<HttpResponse> {
        let id = parse_id(id, "Simulator")?;
        Ok(json_response(StatusCode::OK, &self.registry.reset(id)?))
    }

    async fn step(&self, id: &str, req: Request<Incoming>) -> Result<HttpResponse> {
        let id = parse_id(id, "Simulator")?;
        // Existence is checked before the body is read
        self.registry.snapshot(id)?;
        let body: StepRequest = read_json(req).await?;
        Ok(json_response(StatusCode::OK, &self.registry.step(id, body.action)?))
    }

    fn health(&self) -> HttpResponse {
        json_response(
            StatusCode::OK,
            &json!({ "status": "ok", "simulators": self.registry.len() }),
        )
    }
}

impl HttpService for SimulatorService {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<HttpResponse> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match segments(&path).as_slice() {
            ["health"] => match method {
                Method::GET => Ok(self.health()),
                _ => Ok(method_not_allowed()),
            },
            ["simulators"] => match method {
                Method::POST => self.create(req).await,
                Method::GET => Ok(self.list()),
                _ => Ok(method_not_allowed()),
            },
            ["simulators", id] => match method {
                Method::GET => self.snapshot(id),
                Method::DELETE => self.delete(id),
                _ => Ok(method_not_allowed()),
            },
            ["simulators", id, "reset"] => match method {
                Method::POST => self.reset(id),
                _ => Ok(method_not_allowed()),
            },
            ["simulators", id, "step"] => match method {
                Method::POST => self.step(id, req).await,
                _ => Ok(method_not_allowed()),
            },
            _ => Ok(not_found()),
        }
    }
}
