//! QGate common library
//!
//! This crate contains shared code used across QGate components.

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use metrics::{MetricsRegistry, METRICS};
