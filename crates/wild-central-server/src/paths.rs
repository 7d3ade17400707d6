//! Data directory layout
//!
//! A development checkout keeps everything under `./.wildcloud`; a packaged
//! install spreads files over the usual FHS locations.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const PRODUCTION_DATA_DIR: &str = "/var/lib/wild-cloud-central";
const PRODUCTION_CONFIG_FILE: &str = "/etc/wild-cloud-central/config.yaml";
const PRODUCTION_LOGS_DIR: &str = "/var/log/wild-cloud-central";
const PRODUCTION_ASSETS_DIR: &str = "/var/www/html/wild-central";
const PRODUCTION_DNSMASQ_CONF: &str = "/etc/dnsmasq.conf";

const DEVELOPMENT_DIR_NAME: &str = ".wildcloud";

/// Environment variable forcing development mode when set to `development`
pub const ENV_MODE_VAR: &str = "WILD_CENTRAL_ENV";

// The different deployment modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "development",
            DeploymentMode::Production => "production",
        }
    }

    /// Work out the mode from the process environment
    pub fn detect() -> Self {
        let env_mode = std::env::var(ENV_MODE_VAR).ok();
        let invocation_id = std::env::var("INVOCATION_ID").ok();
        let exe = std::env::current_exe().ok();
        Self::from_indicators(env_mode.as_deref(), invocation_id.as_deref(), exe.as_deref())
    }

    /// Explicit development flag wins, then systemd, then install location.
    /// Anything undecided runs as development.
    pub fn from_indicators(
        env_mode: Option<&str>,
        invocation_id: Option<&str>,
        exe: Option<&Path>,
    ) -> Self {
        if env_mode == Some("development") {
            return DeploymentMode::Development;
        }

        if invocation_id.is_some_and(|id| !id.is_empty()) {
            return DeploymentMode::Production;
        }

        if let Some(exe) = exe {
            let exe = exe.to_string_lossy();
            if exe.contains("/usr/bin") || exe.contains("/usr/local/bin") {
                return DeploymentMode::Production;
            }
        }

        DeploymentMode::Development
    }
}

/// Filesystem locations the daemon reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub dnsmasq_conf: PathBuf,
}

impl DataPaths {
    /// Everything under a single root directory
    pub fn development(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_file: root.join("config.yaml"),
            logs_dir: root.join("logs"),
            assets_dir: root.join("assets"),
            dnsmasq_conf: root.join("dnsmasq.conf"),
            data_dir: root,
        }
    }

    pub fn production() -> Self {
        Self {
            config_file: PathBuf::from(PRODUCTION_CONFIG_FILE),
            data_dir: PathBuf::from(PRODUCTION_DATA_DIR),
            logs_dir: PathBuf::from(PRODUCTION_LOGS_DIR),
            assets_dir: PathBuf::from(PRODUCTION_ASSETS_DIR),
            dnsmasq_conf: PathBuf::from(PRODUCTION_DNSMASQ_CONF),
        }
    }
}

/// Resolves and prepares the data directory
#[derive(Debug, Clone)]
pub struct DataManager {
    mode: DeploymentMode,
    paths: DataPaths,
}

impl DataManager {
    /// Detect the layout from the environment. An explicit `data_dir`
    /// selects the development layout rooted there.
    pub fn detect(data_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = data_dir {
            debug!(data_dir = %dir.display(), "Using explicit data directory");
            return Ok(Self {
                mode: DeploymentMode::Development,
                paths: DataPaths::development(dir),
            });
        }

        let mode = DeploymentMode::detect();
        let paths = match mode {
            DeploymentMode::Development => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                DataPaths::development(cwd.join(DEVELOPMENT_DIR_NAME))
            }
            DeploymentMode::Production => DataPaths::production(),
        };
        Ok(Self { mode, paths })
    }

    /// Create the data, logs and assets directories
    pub async fn initialize(&self) -> Result<()> {
        info!(
            mode = self.mode.as_str(),
            data_dir = %self.paths.data_dir.display(),
            "Initializing data directory"
        );

        for dir in [&self.paths.data_dir, &self.paths.logs_dir, &self.paths.assets_dir] {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        debug!("Data directory structure initialized");
        Ok(())
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn is_development(&self) -> bool {
        self.mode == DeploymentMode::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_indicators() {
        let usr_bin = Path::new("/usr/bin/wild-central");
        let target = Path::new("/home/dev/wild-central/target/debug/wild-central");

        assert_eq!(
            DeploymentMode::from_indicators(Some("development"), Some("abc"), Some(usr_bin)),
            DeploymentMode::Development
        );
        assert_eq!(
            DeploymentMode::from_indicators(None, Some("abc"), Some(target)),
            DeploymentMode::Production
        );
        assert_eq!(
            DeploymentMode::from_indicators(None, None, Some(usr_bin)),
            DeploymentMode::Production
        );
        assert_eq!(
            DeploymentMode::from_indicators(None, None, Some(Path::new("/usr/local/bin/wild-central"))),
            DeploymentMode::Production
        );
        assert_eq!(
            DeploymentMode::from_indicators(None, None, Some(target)),
            DeploymentMode::Development
        );
        assert_eq!(
            DeploymentMode::from_indicators(Some("production"), Some(""), None),
            DeploymentMode::Development
        );
    }

    #[test]
    fn test_development_layout() {
        let paths = DataPaths::development("/srv/wc");
        assert_eq!(paths.config_file, PathBuf::from("/srv/wc/config.yaml"));
        assert_eq!(paths.data_dir, PathBuf::from("/srv/wc"));
        assert_eq!(paths.logs_dir, PathBuf::from("/srv/wc/logs"));
        assert_eq!(paths.assets_dir, PathBuf::from("/srv/wc/assets"));
        assert_eq!(paths.dnsmasq_conf, PathBuf::from("/srv/wc/dnsmasq.conf"));
    }

    #[test]
    fn test_production_layout() {
        let paths = DataPaths::production();
        assert_eq!(paths.config_file, PathBuf::from("/etc/wild-cloud-central/config.yaml"));
        assert_eq!(paths.assets_dir, PathBuf::from("/var/www/html/wild-central"));
        assert_eq!(paths.dnsmasq_conf, PathBuf::from("/etc/dnsmasq.conf"));
    }

    #[tokio::test]
    async fn test_initialize_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = DataManager::detect(Some(tmp.path().join("data"))).unwrap();
        assert!(manager.is_development());

        manager.initialize().await.unwrap();
        assert!(manager.paths().data_dir.is_dir());
        assert!(manager.paths().logs_dir.is_dir());
        assert!(manager.paths().assets_dir.is_dir());
        assert!(!manager.paths().config_file.exists());
    }
}
