// src/main.rs
//! SimLab Engine
//!
//! Runs the simulator service and the agent service in one process.

use anyhow::{Context, Result};
use simlab_engine::env::RemoteConnector;
use simlab_engine::learning::{LinearDqn, ModelStore};
use simlab_engine::observability::{init_metrics, init_tracing};
use simlab_engine::server::{serve, AgentDefaults, AgentService, SimulatorService};
use simlab_engine::utils::config::{LabConfig, ServerConfig};
use simlab_engine::{AgentRegistry, SimulatorRegistry, TaskRunner, WorkerPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = LabConfig::load()?;

    init_tracing(&config.observability)?;
    init_metrics(&config.observability)?;

    info!("Starting SimLab Engine v{}", simlab_engine::VERSION);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = JoinSet::new();

    if config.simulator_server.enabled {
        let registry = Arc::new(SimulatorRegistry::new());
        let service = Arc::new(SimulatorService::new(registry));
        let listener = bind(&config.simulator_server).await?;
        servers.spawn(serve(listener, service, wait_for(shutdown_rx.clone())));
    }

    if config.agent_server.enabled {
        let registry = Arc::new(AgentRegistry::new());
        let pool = WorkerPool::new(config.runtime.worker_threads)?;
        let runner = Arc::new(TaskRunner::new(
            Arc::clone(&registry),
            pool,
            Arc::new(RemoteConnector),
            Arc::new(LinearDqn::default()),
            ModelStore::new(config.runtime.models_dir.clone()),
        ));
        let service = Arc::new(AgentService::new(
            registry,
            runner,
            AgentDefaults::from_config(&config),
        ));
        let listener = bind(&config.agent_server).await?;
        servers.spawn(serve(listener, service, wait_for(shutdown_rx.clone())));
    }

    if servers.is_empty() {
        anyhow::bail!("both services are disabled; nothing to run");
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to install CTRL+C signal handler")?;
            info!("Received shutdown signal, cleaning up...");
        }
        Some(joined) = servers.join_next() => {
            match joined {
                Ok(Ok(())) => info!("Server stopped"),
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    while let Some(joined) = servers.join_next().await {
        if let Ok(Err(e)) = joined {
            error!("Server error during shutdown: {}", e);
        }
    }

    info!("Stopped gracefully");
    Ok(())
}

async fn bind(server: &ServerConfig) -> Result<TcpListener> {
    let addr = server.bind_addr();
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
