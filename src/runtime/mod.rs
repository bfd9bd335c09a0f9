// src/runtime/mod.rs
//! Agent execution runtime
//!
//! - **Agent Registry**: agent entities and the Idle/Busy state machine
//! - **Task Runner**: runs admitted train/predict operations and reconciles
//!   agent state afterwards
//! - **Worker Pool**: dedicated threads that keep long operations off the
//!   request-handling runtime
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Request handler (current_thread runtime)                 │
//! │   begin_operation ──► TaskRunner::submit ──► 202         │
//! └──────────────────────────────┬───────────────────────────┘
//!                                │ crossbeam channel
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//!     ┌──────────┐          ┌──────────┐          ┌──────────┐
//!     │ Worker 0 │          │ Worker 1 │   ...    │ Worker N │
//!     │ bridge + │          │ bridge + │          │ bridge + │
//!     │ learner  │          │ learner  │          │ learner  │
//!     └────┬─────┘          └────┬─────┘          └────┬─────┘
//!          └──────── end_operation (AgentRegistry) ────┘
//! ```

pub mod agent_registry;
pub mod task_runner;
pub mod worker_pool;

pub use agent_registry::{
    AgentId, AgentRegistry, AgentStatus, AgentView, OperationGrant, OperationKind,
    OperationOutcome,
};
pub use task_runner::{OperationSpec, TaskRunner};
pub use worker_pool::{PoolStats, WorkerContext, WorkerPool};
