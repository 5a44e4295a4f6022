//! Common command-line arguments for the city sensor services
//!
//! Provides a unified argument structure that can be extended by individual services

#[cfg(feature = "cli")]
use clap::Parser;
use std::path::PathBuf;

/// Common service startup arguments
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", clap(author, version, about))]
pub struct ServiceArgs {
    /// Configuration file (YAML, JSON or TOML); missing file means defaults
    #[cfg_attr(feature = "cli", clap(short = 'c', long, env = "CONFIG_FILE"))]
    pub config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or a full RUST_LOG directive)
    #[cfg_attr(feature = "cli", clap(short = 'l', long, env = "RUST_LOG"))]
    pub log_level: Option<String>,

    /// Optional bind address override (e.g., 127.0.0.1:8787)
    #[cfg_attr(feature = "cli", clap(short = 'b', long = "bind", env = "BIND_ADDRESS"))]
    pub bind_address: Option<String>,

    /// Enable debug mode with verbose output
    #[cfg_attr(feature = "cli", clap(long, env = "DEBUG"))]
    pub debug: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", clap(long))]
    pub validate: bool,
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> tracing::Level {
        if self.debug {
            return tracing::Level::DEBUG;
        }
        match self
            .log_level
            .as_deref()
            .unwrap_or("info")
            .to_lowercase()
            .as_str()
        {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    /// Split a `host:port` bind override into its parts
    pub fn bind_override(&self) -> Option<(String, u16)> {
        let addr = self.bind_address.as_deref()?;
        let (host, port) = addr.rsplit_once(':')?;
        let port = port.parse().ok()?;
        Some((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
    }
}
