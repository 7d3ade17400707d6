//! iPXE boot script generation for Talos nodes
//!
//! Nodes that chainload into iPXE fetch `boot.ipxe` over HTTP from the
//! central server. The script pulls the kernel and initramfs from the same
//! host and boots them with the fixed Talos metal kernel arguments.
//!
//! # Example
//!
//! ```
//! use wild_central_ipxe::{IpxeConfig, IpxeScriptGenerator};
//!
//! let generator = IpxeScriptGenerator::new(IpxeConfig::new("10.0.0.5"));
//! let script = generator.generate().unwrap();
//!
//! assert!(script.starts_with("#!ipxe"));
//! assert!(script.contains("kernel http://10.0.0.5/amd64/vmlinuz"));
//! ```

pub mod error;
pub mod script;

pub use error::*;
pub use script::*;
