//! PXE Boot Asset Provisioning
//!
//! Builds everything a node needs to network-boot Talos:
//!
//! 1. **Schematic** - ask the Talos image factory for a schematic ID matching
//!    our customization (kernel args, system extensions)
//! 2. **Download** - fetch the kernel and initramfs for that schematic and the
//!    configured Talos version into `talos/amd64/`
//! 3. **BootScript** - write `talos/boot.ipxe` pointing nodes at those files
//! 4. **Loaders** - fetch the iPXE loaders dnsmasq hands out over TFTP
//!
//! Stages run in order and the first failure stops the run. Nothing is
//! rolled back: files from earlier stages stay where they are and the next
//! run overwrites them.

mod download;
mod factory;

pub use factory::{SchematicResponse, SCHEMATIC};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};
use wild_central_common::Config;
use wild_central_ipxe::{IpxeConfig, IpxeError, IpxeScriptGenerator};

/// Talos image factory (schematic API)
pub const DEFAULT_FACTORY_URL: &str = "https://factory.talos.dev";

/// Talos image factory PXE endpoint
pub const DEFAULT_PXE_URL: &str = "https://pxe.factory.talos.dev";

/// Architecture the kernel and initramfs are fetched for
pub const ARCH: &str = "amd64";

/// A network-boot loader and the name dnsmasq serves it under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSource {
    pub url: String,
    pub file_name: String,
}

impl LoaderSource {
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
        }
    }
}

/// Remote locations the pipeline pulls from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSources {
    pub factory_url: String,
    pub pxe_url: String,
    pub loaders: Vec<LoaderSource>,
}

impl Default for AssetSources {
    fn default() -> Self {
        Self {
            factory_url: DEFAULT_FACTORY_URL.to_string(),
            pxe_url: DEFAULT_PXE_URL.to_string(),
            loaders: vec![
                LoaderSource::new("http://boot.ipxe.org/ipxe.efi", "ipxe.efi"),
                LoaderSource::new("http://boot.ipxe.org/undionly.kpxe", "undionly.kpxe"),
                LoaderSource::new("http://boot.ipxe.org/arm64-efi/ipxe.efi", "ipxe-arm64.efi"),
            ],
        }
    }
}

impl AssetSources {
    fn image_url(&self, schematic_id: &str, version: &str, file: &str) -> String {
        format!("{}/image/{}/{}/{}", self.pxe_url, schematic_id, version, file)
    }

    pub fn kernel_url(&self, schematic_id: &str, version: &str) -> String {
        self.image_url(schematic_id, version, &format!("kernel-{}", ARCH))
    }

    pub fn initramfs_url(&self, schematic_id: &str, version: &str) -> String {
        self.image_url(schematic_id, version, &format!("initramfs-{}.xz", ARCH))
    }
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schematic,
    Download,
    BootScript,
    Loaders,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Schematic => "schematic",
            Stage::Download => "download",
            Stage::BootScript => "boot_script",
            Stage::Loaders => "loaders",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid schematic response: {0}")]
    InvalidResponse(String),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Script(#[from] IpxeError),
}

impl StageError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Attribute this failure to `stage`
    pub fn at(self, stage: Stage) -> AssetError {
        AssetError {
            stage,
            source: self,
        }
    }
}

/// A failed provisioning run and the stage it stopped at
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct AssetError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl AssetError {
    /// True when a remote service (rather than local disk) caused the failure
    pub fn is_external(&self) -> bool {
        !matches!(self.source, StageError::Io { .. } | StageError::Script(_))
    }
}

/// Files produced by a successful run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootAssets {
    pub schematic_id: String,
    pub kernel: PathBuf,
    pub initramfs: PathBuf,
    pub boot_script: PathBuf,
    pub loaders: Vec<PathBuf>,
}

/// Runs the four-stage boot asset pipeline
pub struct AssetProvisioner {
    assets_dir: PathBuf,
    sources: AssetSources,
    client: reqwest::Client,
}

impl AssetProvisioner {
    pub fn new(assets_dir: impl Into<PathBuf>, sources: AssetSources) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            sources,
            client: reqwest::Client::new(),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn sources(&self) -> &AssetSources {
        &self.sources
    }

    /// Directory holding the Talos kernel, initramfs and boot script
    pub fn talos_dir(&self) -> PathBuf {
        self.assets_dir.join("talos")
    }

    /// Directory dnsmasq serves loaders from
    pub fn tftp_dir(&self) -> PathBuf {
        self.assets_dir.join("tftp")
    }

    /// Run every stage for `config`, stopping at the first failure
    pub async fn provision(&self, config: &Config) -> Result<BootAssets, AssetError> {
        info!(
            assets_dir = %self.talos_dir().display(),
            version = %config.talos_version(),
            "Downloading Talos assets"
        );

        let result = self.run_stages(config).await;
        match &result {
            Ok(assets) => info!(schematic_id = %assets.schematic_id, "Successfully downloaded PXE assets"),
            Err(e) => error!(stage = %e.stage, error = %e.source, "PXE asset provisioning failed"),
        }
        result
    }

    async fn run_stages(&self, config: &Config) -> Result<BootAssets, AssetError> {
        let schematic_id = factory::create_schematic(&self.client, &self.sources.factory_url)
            .await
            .map_err(|e| e.at(Stage::Schematic))?;
        info!(schematic_id = %schematic_id, "Created Talos schematic");

        let (kernel, initramfs) = self
            .download_boot_images(&schematic_id, config.talos_version())
            .await
            .map_err(|e| e.at(Stage::Download))?;

        let boot_script = self
            .write_boot_script(config.dns_ip())
            .await
            .map_err(|e| e.at(Stage::BootScript))?;

        let loaders = self
            .download_loaders()
            .await
            .map_err(|e| e.at(Stage::Loaders))?;

        Ok(BootAssets {
            schematic_id,
            kernel,
            initramfs,
            boot_script,
            loaders,
        })
    }

    async fn download_boot_images(
        &self,
        schematic_id: &str,
        version: &str,
    ) -> Result<(PathBuf, PathBuf), StageError> {
        let arch_dir = self.talos_dir().join(ARCH);
        fs::create_dir_all(&arch_dir)
            .await
            .map_err(|e| StageError::io("creating assets directory", &arch_dir, e))?;

        let kernel = arch_dir.join("vmlinuz");
        download::download_file(&self.client, &self.sources.kernel_url(schematic_id, version), &kernel)
            .await?;

        let initramfs = arch_dir.join("initramfs.xz");
        download::download_file(
            &self.client,
            &self.sources.initramfs_url(schematic_id, version),
            &initramfs,
        )
        .await?;

        Ok((kernel, initramfs))
    }

    async fn write_boot_script(&self, http_host: &str) -> Result<PathBuf, StageError> {
        let script = IpxeScriptGenerator::new(IpxeConfig::new(http_host).with_arch(ARCH)).generate()?;

        let path = self.talos_dir().join("boot.ipxe");
        fs::write(&path, script)
            .await
            .map_err(|e| StageError::io("writing boot script", &path, e))?;
        Ok(path)
    }

    async fn download_loaders(&self) -> Result<Vec<PathBuf>, StageError> {
        let tftp_dir = self.tftp_dir();
        fs::create_dir_all(&tftp_dir)
            .await
            .map_err(|e| StageError::io("creating tftp directory", &tftp_dir, e))?;

        let mut written = Vec::with_capacity(self.sources.loaders.len());
        for loader in &self.sources.loaders {
            let path = tftp_dir.join(&loader.file_name);
            download::download_file(&self.client, &loader.url, &path).await?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{spawn_mock_factory, MockFactory};

    fn usable_config() -> Config {
        let mut cfg = Config::default();
        cfg.cloud.domain = "example.test".to_string();
        cfg.cloud.dns.ip = "10.0.0.5".to_string();
        cfg.cluster.nodes.talos.version = "v1.2.3".to_string();
        cfg
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_default_kernel_url() {
        let sources = AssetSources::default();
        assert_eq!(
            sources.kernel_url("abc123", "v1.2.3"),
            "https://pxe.factory.talos.dev/image/abc123/v1.2.3/kernel-amd64"
        );
        assert_eq!(
            sources.initramfs_url("abc123", "v1.2.3"),
            "https://pxe.factory.talos.dev/image/abc123/v1.2.3/initramfs-amd64.xz"
        );
    }

    #[test]
    fn test_default_loaders() {
        let names: Vec<_> = AssetSources::default()
            .loaders
            .into_iter()
            .map(|l| l.file_name)
            .collect();
        assert_eq!(names, vec!["ipxe.efi", "undionly.kpxe", "ipxe-arm64.efi"]);
    }

    #[tokio::test]
    async fn test_provision_writes_all_assets() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory::default()).await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let assets = provisioner.provision(&usable_config()).await.unwrap();

        assert_eq!(assets.schematic_id, "abc123");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("talos/amd64/vmlinuz")).unwrap(),
            "kernel abc123 v1.2.3"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("talos/amd64/initramfs.xz")).unwrap(),
            "initramfs abc123 v1.2.3"
        );
        let script = std::fs::read_to_string(tmp.path().join("talos/boot.ipxe")).unwrap();
        assert!(script.contains("kernel http://10.0.0.5/amd64/vmlinuz talos.platform=metal"));
        assert!(script.contains("initrd http://10.0.0.5/amd64/initramfs.xz"));
        for loader in ["ipxe.efi", "undionly.kpxe", "ipxe-arm64.efi"] {
            assert!(tmp.path().join("tftp").join(loader).is_file(), "missing {}", loader);
        }
        assert_eq!(assets.loaders.len(), 3);
    }

    #[tokio::test]
    async fn test_schematic_is_posted_as_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory::default()).await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        provisioner.provision(&usable_config()).await.unwrap();

        let received = server.schematic_body().await.expect("schematic was not posted");
        assert_eq!(received, SCHEMATIC);
    }

    #[tokio::test]
    async fn test_schematic_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory {
            schematic_status: 500,
            ..Default::default()
        })
        .await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let err = provisioner.provision(&usable_config()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Schematic);
        assert!(err.is_external());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_malformed_schematic_response_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory {
            schematic_body: "not json".to_string(),
            ..Default::default()
        })
        .await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let err = provisioner.provision(&usable_config()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Schematic);
        assert!(matches!(err.source, StageError::InvalidResponse(_)));
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_unreachable_factory_fails_schematic_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = AssetSources {
            factory_url: "http://127.0.0.1:1".to_string(),
            ..AssetSources::default()
        };
        let provisioner = AssetProvisioner::new(tmp.path(), sources);

        let err = provisioner.provision(&usable_config()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Schematic);
        assert!(matches!(err.source, StageError::Http { .. }));
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_download_failure_keeps_partial_files() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory {
            initramfs_missing: true,
            ..Default::default()
        })
        .await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let err = provisioner.provision(&usable_config()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Download);
        assert!(matches!(err.source, StageError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND));
        assert!(tmp.path().join("talos/amd64/vmlinuz").is_file());
        assert!(!tmp.path().join("talos/boot.ipxe").exists());
        assert!(!tmp.path().join("tftp").exists());
    }

    #[tokio::test]
    async fn test_loader_failure_aborts_after_boot_script() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory {
            loaders_missing: true,
            ..Default::default()
        })
        .await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let err = provisioner.provision(&usable_config()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Loaders);
        assert!(tmp.path().join("talos/boot.ipxe").is_file());
    }

    #[tokio::test]
    async fn test_rerun_overwrites_previous_assets() {
        let tmp = tempfile::tempdir().unwrap();
        let server = spawn_mock_factory(MockFactory::default()).await;
        let provisioner = AssetProvisioner::new(tmp.path(), server.sources());

        let kernel = tmp.path().join("talos/amd64/vmlinuz");
        std::fs::create_dir_all(kernel.parent().unwrap()).unwrap();
        std::fs::write(&kernel, "stale kernel from an older run").unwrap();

        let mut cfg = usable_config();
        cfg.cluster.nodes.talos.version = "v1.3.0".to_string();
        provisioner.provision(&cfg).await.unwrap();

        assert_eq!(std::fs::read_to_string(&kernel).unwrap(), "kernel abc123 v1.3.0");
    }
}
