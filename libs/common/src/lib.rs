//! Shared service plumbing for the city sensor services
//!
//! Provides basic functions shared by all services, including:
//! - logging bootstrap with runtime level control
//! - layered configuration loading
//! - command-line arguments and shutdown signal handling
//! - API response envelopes

pub mod api_types;
pub mod bootstrap_args;
pub mod config_loader;
pub mod logging;
pub mod shutdown;

// Re-export commonly used API types
pub use api_types::{ErrorResponse, HealthStatus, ServiceStatus, SuccessResponse};
pub use errors::ErrorInfo;

// Re-export AppError when axum feature is enabled
#[cfg(feature = "axum")]
pub use api_types::AppError;

pub use bootstrap_args::ServiceArgs;

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use serde_json;
pub use tokio;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;

// Re-export clap derive macros separately for proper macro resolution
#[cfg(feature = "cli")]
pub use clap::{Args, Parser};
