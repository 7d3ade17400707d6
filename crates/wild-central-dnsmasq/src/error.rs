//! Error types for dnsmasq configuration management

use std::path::PathBuf;
use thiserror::Error;

/// Error type for dnsmasq operations
#[derive(Debug, Error)]
pub enum DnsmasqError {
    /// Template rendering failed
    #[error("rendering dnsmasq config: {0}")]
    Template(#[from] minijinja::Error),

    /// Writing the rendered config failed
    #[error("writing dnsmasq config to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The restart command could not be spawned
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The restart command ran but reported failure
    #[error("failed to restart dnsmasq: {command} exited with {status}")]
    Restart { command: String, status: String },
}

impl DnsmasqError {
    /// True for failures of the external restart facility
    pub fn is_restart_failure(&self) -> bool {
        matches!(self, DnsmasqError::Spawn { .. } | DnsmasqError::Restart { .. })
    }
}

/// Result type for dnsmasq operations
pub type Result<T> = std::result::Result<T, DnsmasqError>;
