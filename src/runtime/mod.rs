//! # Runtime
//!
//! Process wiring: initialization, the per-kind controllers and their error
//! policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
