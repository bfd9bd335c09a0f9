// src/env/mod.rs
//! Environment bridge
//!
//! Training and evaluation routines drive a synchronous control loop:
//!
//! ```text
//! reset() → obs ─┐
//!                ▼
//!        policy(obs) → action → step(action) → (obs, reward, terminated, truncated)
//!                ▲                                           │
//!                └───────────────────────────────────────────┘
//! ```
//!
//! [`Environment`] is that loop's capability interface. [`RemoteEnvironment`]
//! satisfies it by translating each call into a request against a simulator
//! service. Tests swap in an in-process simulator through `local`.

#[cfg(test)]
pub(crate) mod local;
pub mod remote;

#[cfg(test)]
pub(crate) use local::{LocalConnector, LocalEnvironment};
pub use remote::{RemoteConnector, RemoteEnvironment, SimulatorClient};

use crate::runtime::worker_pool::WorkerContext;
use crate::simulation::{EnvironmentKind, Info};
use crate::utils::errors::Result;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Outcome of one control-loop step
#[derive(Debug, Clone)]
pub struct Transition {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl Transition {
    /// Whether the episode ended, by termination or truncation
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Control-loop view of a simulated environment
pub trait Environment: Send {
    /// Environment this instance simulates
    fn kind(&self) -> EnvironmentKind;

    /// Start a new episode
    fn reset(&mut self) -> Result<(Vec<f32>, Info)>;

    /// Apply one discrete action
    fn step(&mut self, action: usize) -> Result<Transition>;

    /// Release the underlying connection; calling it twice is a no-op
    fn close(&mut self) -> Result<()>;
}

/// Where a background operation finds its simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorTarget {
    pub simulator_id: String,
    pub environment: String,
    pub api_url: String,
}

/// Builds environments for background operations
pub trait EnvironmentConnector: Send + Sync {
    fn connect(&self, ctx: &WorkerContext, target: &SimulatorTarget) -> Result<Box<dyn Environment>>;
}

/// Scoped environment handle that closes on drop
pub struct EnvironmentGuard {
    env: Box<dyn Environment>,
}

impl EnvironmentGuard {
    pub fn new(env: Box<dyn Environment>) -> Self {
        Self { env }
    }
}

impl Deref for EnvironmentGuard {
    type Target = dyn Environment;

    fn deref(&self) -> &Self::Target {
        self.env.as_ref()
    }
}

impl DerefMut for EnvironmentGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env.as_mut()
    }
}

impl Drop for EnvironmentGuard {
    fn drop(&mut self) {
        if let Err(e) = self.env.close() {
            warn!("Failed to close environment: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        closes: Arc<AtomicUsize>,
    }

    impl Environment for Counting {
        fn kind(&self) -> EnvironmentKind {
            EnvironmentKind::LunarLander
        }

        fn reset(&mut self) -> Result<(Vec<f32>, Info)> {
            Ok((vec![0.0; 8], Info::new()))
        }

        fn step(&mut self, _action: usize) -> Result<Transition> {
            Err(crate::utils::errors::LabError::ProtocolError("offline".into()))
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_guard_closes_on_error_path() {
        let closes = Arc::new(AtomicUsize::new(0));

        let run = || -> Result<()> {
            let mut env = EnvironmentGuard::new(Box::new(Counting {
                closes: Arc::clone(&closes),
            }));
            env.reset()?;
            env.step(0)?;
            Ok(())
        };

        assert!(run().is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
