//! Backend for the agentlens demo: demo sessions, synthesized agent runs,
//! one-shot replays and dashboard metrics, served over HTTP.

pub mod config;
pub mod executor;
pub mod metrics;
pub mod model;
pub mod reasoning;
pub mod replay;
pub mod serve;
pub mod store;
