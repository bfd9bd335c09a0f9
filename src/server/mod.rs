// src/server/mod.rs
//! HTTP service facades
//!
//! Both services are plain hyper HTTP/1 servers sharing one accept loop
//! ([`serve`]). Handlers validate synchronously and never block on
//! training work.

pub mod agent_service;
pub mod http;
pub mod simulator_service;

pub use agent_service::{AgentDefaults, AgentService};
pub use http::{serve, HttpResponse, HttpService};
pub use simulator_service::SimulatorService;
