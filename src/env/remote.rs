// src/env/remote.rs
//! Bridge from the control loop to a remote simulator service
//!
//! Every `reset`/`step` is one HTTP request against
//! `{api_url}/simulators/{id}/reset|step`. No retries: a failed or malformed
//! response surfaces immediately as [`LabError::ProtocolError`].

use crate::env::{Environment, EnvironmentConnector, SimulatorTarget, Transition};
use crate::runtime::worker_pool::WorkerContext;
use crate::simulation::{EnvironmentKind, Info, ResetResult, StepResult};
use crate::utils::errors::{LabError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

/// Async client for the simulator service
#[derive(Clone)]
pub struct SimulatorClient {
    http_client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
}

impl SimulatorClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let base_url = api_url.trim_end_matches('/').to_string();
        let uri: Uri = base_url
            .parse()
            .map_err(|e| LabError::ProtocolError(format!("Invalid api_url {}: {}", api_url, e)))?;

        if uri.scheme_str() != Some("http") || uri.host().is_none() {
            return Err(LabError::ProtocolError(format!(
                "Invalid api_url {}: expected http://host[:port]",
                api_url
            )));
        }

        let http_client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn reset(&self, simulator_id: &str) -> Result<ResetResult> {
        self.post(&format!("/simulators/{}/reset", simulator_id), None)
            .await
    }

    pub async fn step(&self, simulator_id: &str, action: usize) -> Result<StepResult> {
        self.post(
            &format!("/simulators/{}/step", simulator_id),
            Some(json!({ "action": action })),
        )
        .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<serde_json::Value>) -> Result<T> {
        let target_uri = format!("{}{}", self.base_url, path);
        let body = match body {
            Some(value) => Bytes::from(value.to_string()),
            None => Bytes::new(),
        };

        let request = Request::builder()
            .method(Method::POST)
            .uri(&target_uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| LabError::ProtocolError(format!("Request build error: {}", e)))?;

        trace!("POST {}", target_uri);

        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| LabError::ProtocolError(format!("POST {} failed: {}", target_uri, e)))?;

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| LabError::ProtocolError(format!("Response body error: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(LabError::ProtocolError(format!(
                "POST {} returned {}: {}",
                target_uri,
                status,
                String::from_utf8_lossy(&body_bytes)
            )));
        }

        serde_json::from_slice(&body_bytes).map_err(|e| {
            LabError::ProtocolError(format!("Malformed response from {}: {}", target_uri, e))
        })
    }
}

/// Time given to the pooled connection task to observe a dropped client
const CLOSE_DRAIN: Duration = Duration::from_millis(20);

/// Remote simulator presented as a local [`Environment`]
///
/// Each call blocks the calling worker thread on the worker's private
/// runtime until the simulator answers.
pub struct RemoteEnvironment {
    runtime: Arc<Runtime>,
    client: Option<SimulatorClient>,
    simulator_id: String,
    kind: EnvironmentKind,
}

impl RemoteEnvironment {
    pub fn connect(runtime: Arc<Runtime>, target: &SimulatorTarget) -> Result<Self> {
        let kind = EnvironmentKind::from_name(&target.environment)?;
        let client = SimulatorClient::new(&target.api_url)?;

        debug!(
            "Bridging simulator {} ({}) at {}",
            target.simulator_id,
            kind,
            client.base_url()
        );

        Ok(Self {
            runtime,
            client: Some(client),
            simulator_id: target.simulator_id.clone(),
            kind,
        })
    }

    fn client(&self) -> Result<&SimulatorClient> {
        self.client
            .as_ref()
            .ok_or_else(|| LabError::ProtocolError("connection to simulator is closed".into()))
    }

    fn check_observation(&self, state: &[f32]) -> Result<()> {
        let expected = self.kind.observation_dim();
        if state.len() != expected {
            return Err(LabError::ProtocolError(format!(
                "Malformed observation from simulator {}: expected {} values, got {}",
                self.simulator_id,
                expected,
                state.len()
            )));
        }
        Ok(())
    }
}

impl Environment for RemoteEnvironment {
    fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
        let client = self.client()?;
        let reset = self.runtime.block_on(client.reset(&self.simulator_id))?;
        self.check_observation(&reset.state)?;
        Ok((reset.state, reset.info))
    }

    fn step(&mut self, action: usize) -> Result<Transition> {
        self.kind.validate_action(action as i64)?;

        let client = self.client()?;
        let step = self.runtime.block_on(client.step(&self.simulator_id, action))?;
        self.check_observation(&step.state)?;

        Ok(Transition {
            observation: step.state,
            reward: step.reward,
            terminated: step.terminated,
            truncated: step.truncated,
            info: step.info,
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            drop(client);
            // The connection task only runs inside block_on; drive it so the
            // socket is shut down now rather than on the worker's next job.
            self.runtime.block_on(async {
                tokio::task::yield_now().await;
                tokio::time::sleep(CLOSE_DRAIN).await;
            });
            debug!("Closed bridge to simulator {}", self.simulator_id);
        }
        Ok(())
    }
}

/// Connects operations to the simulator service named in their target
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteConnector;

impl EnvironmentConnector for RemoteConnector {
    fn connect(&self, ctx: &WorkerContext, target: &SimulatorTarget) -> Result<Box<dyn Environment>> {
        Ok(Box::new(RemoteEnvironment::connect(ctx.runtime(), target)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{serve, SimulatorService};
    use crate::simulation::{SimulatorConfig, SimulatorRegistry};
    use tokio::net::TcpListener;
    use tokio::sync::watch;

    fn target(simulator_id: &str, api_url: &str) -> SimulatorTarget {
        SimulatorTarget {
            simulator_id: simulator_id.to_string(),
            environment: "LunarLander-v3".to_string(),
            api_url: api_url.to_string(),
        }
    }

    fn bridge_runtime() -> Arc<Runtime> {
        Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap(),
        )
    }

    /// Boot a simulator service on an ephemeral port
    fn start_simulator_service(
        registry: Arc<SimulatorRegistry>,
    ) -> (Runtime, String, watch::Sender<bool>) {
        let server_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let listener = server_runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let service = Arc::new(SimulatorService::new(registry));
        server_runtime.spawn(serve(listener, service, async move {
            let _ = shutdown_rx.changed().await;
        }));

        (server_runtime, format!("http://{}", addr), shutdown_tx)
    }

    #[test]
    fn test_reset_then_step_over_http() {
        let registry = Arc::new(SimulatorRegistry::new());
        let id = registry
            .create(
                "LunarLander-v3",
                Some(SimulatorConfig {
                    seed: Some(9),
                    ..Default::default()
                }),
            )
            .unwrap();
        let (_server, url, _shutdown) = start_simulator_service(Arc::clone(&registry));

        let mut env = RemoteEnvironment::connect(bridge_runtime(), &target(&id.to_string(), &url))
            .unwrap();

        let (obs, _info) = env.reset().unwrap();
        assert_eq!(obs.len(), 8);

        for action in 0..4 {
            let step = env.step(action).unwrap();
            assert_eq!(step.observation.len(), 8);
        }
        assert_eq!(registry.snapshot(id).unwrap().step_count, 4);

        env.close().unwrap();
        env.close().unwrap();
        assert!(matches!(env.reset(), Err(LabError::ProtocolError(_))));
    }

    #[test]
    fn test_close_releases_connection() {
        use std::io::{Read, Write};
        use std::sync::mpsc;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0);
                request.extend_from_slice(&buf[..n]);
            }

            let body = r#"{"state":[0,0,0,0,0,0,0,0],"info":{}}"#;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            stream.flush().unwrap();

            // Wait for the client side to go away on the kept-alive connection
            rx.recv().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            stream.read(&mut buf).map_err(|e| e.kind())
        });

        let runtime = bridge_runtime();
        let mut env = RemoteEnvironment::connect(Arc::clone(&runtime), &target("sim", &url)).unwrap();
        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs.len(), 8);

        env.close().unwrap();
        tx.send(()).unwrap();

        assert_eq!(server.join().unwrap(), Ok(0));
    }

    #[test]
    fn test_unknown_simulator_is_protocol_error() {
        let registry = Arc::new(SimulatorRegistry::new());
        let (_server, url, _shutdown) = start_simulator_service(registry);

        let mut env = RemoteEnvironment::connect(
            bridge_runtime(),
            &target("01ARZ3NDEKTSV4RRFFQ69G5FAV", &url),
        )
        .unwrap();

        let err = env.reset().unwrap_err();
        assert!(matches!(err, LabError::ProtocolError(ref msg) if msg.contains("404")));
    }

    #[test]
    fn test_unreachable_simulator_is_protocol_error() {
        let mut env = RemoteEnvironment::connect(
            bridge_runtime(),
            &target("anything", "http://127.0.0.1:1"),
        )
        .unwrap();

        assert!(matches!(env.step(0), Err(LabError::ProtocolError(_))));
    }

    #[test]
    fn test_connect_validates_target() {
        let err = RemoteEnvironment::connect(
            bridge_runtime(),
            &SimulatorTarget {
                simulator_id: "x".into(),
                environment: "Pong-v5".into(),
                api_url: "http://127.0.0.1:8080".into(),
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, LabError::UnsupportedEnvironment(_)));

        let err = RemoteEnvironment::connect(bridge_runtime(), &target("x", "ftp://nowhere"))
            .err()
            .unwrap();
        assert!(matches!(err, LabError::ProtocolError(_)));
    }
}
