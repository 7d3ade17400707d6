//! dnsmasq configuration for wild-central
//!
//! The central server runs dnsmasq as the cluster's DHCP, DNS and TFTP
//! service. This crate turns the cluster configuration into a complete
//! `dnsmasq.conf` and restarts the service so it picks the file up.
//!
//! # Sections
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ listener     interface / listen-address      │
//! │ DNS          local domains → cluster endpoint│
//! │ DHCP         range, gateway, DNS option      │
//! │ PXE          arch → iPXE loader, boot.ipxe   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Rendering is pure. Writing the file and restarting the service are
//! separate steps so callers can preview the output first.
//!
//! # Example
//!
//! ```
//! use wild_central_common::Config;
//! use wild_central_dnsmasq::DnsmasqGenerator;
//!
//! let mut config = Config::default();
//! config.cloud.dnsmasq.interface = "eth0".to_string();
//!
//! let rendered = DnsmasqGenerator::new().generate(&config).unwrap();
//! assert!(rendered.contains("interface=eth0"));
//! ```

pub mod config;
pub mod error;
pub mod service;

pub use config::*;
pub use error::*;
pub use service::*;
