//! Shared configuration types for wild-central
//!
//! The daemon is driven by a single YAML document describing the cluster's
//! network identity and target Talos version. This crate owns that document:
//! its shape ([`Config`]), the "usable" predicate that gates rendering and
//! provisioning, and the load/save functions that keep it on disk.

pub mod config;
pub mod error;
pub mod store;

pub use config::*;
pub use error::ConfigError;
pub use store::{load, save, save_raw};

pub type Result<T> = std::result::Result<T, ConfigError>;
