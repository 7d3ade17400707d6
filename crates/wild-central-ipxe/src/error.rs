//! Error types for iPXE script generation

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpxeError {
    /// Nodes fetch kernel and initramfs from the DNS host; without one
    /// there is nowhere to point them
    #[error("no boot asset host: the central server's DNS address is not set")]
    MissingHttpHost,

    #[error("no architecture given for host {host}")]
    MissingArch { host: String },
}

/// Result type for iPXE operations
pub type Result<T> = std::result::Result<T, IpxeError>;
