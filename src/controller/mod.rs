//! # Controller
//!
//! Core controller modules for the Deployment Manager Controller.
//!
//! - `backoff`: Exponential backoff with jitter
//! - `convergence`: Per-resource convergence state machine
//! - `dependency`: Dependency table and eligibility resolution
//! - `reconciler`: Reconciliation engine and per-kind reconcilers
//! - `retry`: Error classification and requeue decisions
//! - `server`: HTTP server for metrics and health checks
//! - `status`: Status publication

pub mod backoff;
pub mod convergence;
pub mod dependency;
pub mod reconciler;
pub mod retry;
pub mod server;
pub mod status;
