//! # Configuration
//!
//! Environment-driven configuration for the controller, the probe server and
//! the platform API client.

pub mod controller;
pub mod platform;
pub mod server;

pub use controller::ControllerConfig;
pub use platform::PlatformConfig;
pub use server::ServerConfig;
