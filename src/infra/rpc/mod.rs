//! JSON-RPC plumbing: HTTP client, endpoint health probe, and failover.

pub mod client;
pub mod failover;
pub mod health_check;

pub use client::JsonRpcHttpClient;
pub use failover::{FailoverConfig, FailoverOutcome, RpcFailover, is_endpoint_failure};
pub use health_check::{HealthCheckConfig, HttpRpcHealthChecker};
