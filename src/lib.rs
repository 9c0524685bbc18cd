//! Deployment Manager Controller Library
//!
//! Reconciles declarative deployment resources (systems, hosts, networks,
//! interfaces, storage backends and PTP configuration) against the platform
//! inventory API, in dependency order.
//!
//! ## Quick Start
//!
//! ```rust
//! use deployment_manager_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod platform;
pub mod prelude;
pub mod runtime;
pub mod store;
