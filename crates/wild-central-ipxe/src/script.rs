//! iPXE script generation
//!
//! Produces the `boot.ipxe` served to nodes once they have chainloaded iPXE.

use crate::error::{IpxeError, Result};

/// Kernel arguments for Talos on bare metal. These never come from the
/// cluster configuration.
pub const TALOS_KERNEL_ARGS: &[&str] = &[
    "talos.platform=metal",
    "console=tty0",
    "init_on_alloc=1",
    "slab_nomerge",
    "pti=on",
    "consoleblank=0",
    "nvme_core.io_timeout=4294967295",
    "printk.devkmsg=on",
    "ima_template=ima-ng",
    "ima_appraise=fix",
    "ima_hash=sha512",
    "selinux=1",
    "net.ifnames=0",
];

/// Default architecture directory the kernel and initramfs are served from
pub const DEFAULT_ARCH: &str = "amd64";

/// Configuration for iPXE script generation
#[derive(Debug, Clone)]
pub struct IpxeConfig {
    /// Host (address, optionally with port) serving the boot assets over HTTP
    pub http_host: String,

    /// Architecture subdirectory holding `vmlinuz` and `initramfs.xz`
    pub arch: String,

    /// Kernel command line, in order
    pub kernel_params: Vec<String>,
}

impl IpxeConfig {
    /// Create a config serving assets from `http_host` with the Talos defaults
    pub fn new(http_host: impl Into<String>) -> Self {
        Self {
            http_host: http_host.into(),
            arch: DEFAULT_ARCH.to_string(),
            kernel_params: TALOS_KERNEL_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Serve assets for a different architecture
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Append a kernel parameter
    pub fn with_kernel_param(mut self, param: impl Into<String>) -> Self {
        self.kernel_params.push(param.into());
        self
    }

    fn asset_url(&self, file: &str) -> String {
        format!("http://{}/{}/{}", self.http_host, self.arch, file)
    }

    /// URL the script loads the kernel from
    pub fn kernel_url(&self) -> String {
        self.asset_url("vmlinuz")
    }

    /// URL the script loads the initramfs from
    pub fn initramfs_url(&self) -> String {
        self.asset_url("initramfs.xz")
    }
}

/// iPXE script generator
#[derive(Debug, Clone)]
pub struct IpxeScriptGenerator {
    config: IpxeConfig,
}

impl IpxeScriptGenerator {
    /// Create a new script generator
    pub fn new(config: IpxeConfig) -> Self {
        Self { config }
    }

    /// Generate the Talos boot script
    pub fn generate(&self) -> Result<String> {
        if self.config.http_host.is_empty() {
            return Err(IpxeError::MissingHttpHost);
        }
        if self.config.arch.is_empty() {
            return Err(IpxeError::MissingArch {
                host: self.config.http_host.clone(),
            });
        }

        let mut script = String::from("#!ipxe\n");
        script.push_str("imgfree\n");
        script.push_str(&format!(
            "kernel {} {}\n",
            self.config.kernel_url(),
            self.config.kernel_params.join(" ")
        ));
        script.push_str(&format!("initrd {}\n", self.config.initramfs_url()));
        script.push_str("boot\n");

        Ok(script)
    }
}
