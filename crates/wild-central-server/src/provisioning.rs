//! Provisioning Service
//!
//! Owns the in-memory configuration and coordinates everything derived from
//! it: the config file on disk, the dnsmasq config and the PXE boot assets.
//!
//! Disk is authoritative. Reads reload the file; writes persist first and
//! then regenerate dependent artifacts. The two steps are not transactional:
//! if regeneration fails the new configuration is already saved.

use crate::assets::{AssetError, AssetProvisioner, BootAssets};
use crate::paths::DataPaths;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use wild_central_common::{self as common, Config, ConfigError};
use wild_central_dnsmasq::{DnsmasqError, DnsmasqGenerator};

/// Errors surfaced by provisioning operations
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The request body is not a valid configuration document
    #[error("invalid configuration document: {0}")]
    InvalidDocument(String),

    /// Create was called while a usable configuration exists
    #[error("Configuration already exists. Use PUT to update.")]
    ConfigurationExists,

    /// Replace was called before any usable configuration was created
    #[error("No configuration exists. Use POST to create initial configuration.")]
    ConfigurationMissing,

    /// The operation needs a usable configuration
    #[error("No configuration available. Please configure the system first.")]
    NotConfigured,

    /// The raw configuration file does not exist
    #[error("Configuration file not found")]
    RawDocumentMissing,

    #[error(transparent)]
    Store(#[from] ConfigError),

    #[error(transparent)]
    Dnsmasq(#[from] DnsmasqError),

    #[error(transparent)]
    Assets(#[from] AssetError),
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;

/// Result of reading the configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationView {
    Configured(Config),
    Unconfigured { message: String },
}

/// Outcome of a raw document update that was written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RawUpdateOutcome {
    Updated,
    SavedWithWarnings { warning: String },
}

/// Provisioning service
///
/// One instance per process, shared by all request handlers.
pub struct ProvisioningService {
    paths: DataPaths,
    config: RwLock<Option<Config>>,
    dnsmasq: DnsmasqGenerator,
    assets: AssetProvisioner,
}

impl ProvisioningService {
    pub fn new(paths: DataPaths, dnsmasq: DnsmasqGenerator, assets: AssetProvisioner) -> Self {
        Self {
            paths,
            config: RwLock::new(None),
            dnsmasq,
            assets,
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Load the configuration at startup. A missing or unreadable file
    /// leaves the service unconfigured instead of failing.
    pub async fn load_initial(&self) {
        match common::load(&self.paths.config_file).await {
            Ok(cfg) => {
                info!(path = %self.paths.config_file.display(), "Configuration loaded successfully");
                *self.config.write().await = Some(cfg);
            }
            Err(e) if e.is_not_found() => {
                info!(path = %self.paths.config_file.display(), "No configuration found, starting with empty config");
            }
            Err(e) => {
                warn!(error = %e, "Failed to load configuration, starting with empty config");
            }
        }
    }

    /// The cached configuration, if any
    pub async fn current(&self) -> Option<Config> {
        self.config.read().await.clone()
    }

    async fn is_configured(&self) -> bool {
        common::is_usable(self.config.read().await.as_ref())
    }

    /// Cached configuration, provided it is usable
    async fn usable_config(&self) -> Result<Config> {
        match self.current().await {
            Some(cfg) if cfg.is_usable() => Ok(cfg),
            _ => Err(ProvisioningError::NotConfigured),
        }
    }

    /// Reload the configuration from disk and report whether it is usable
    pub async fn get_configuration(&self) -> ConfigurationView {
        let cfg = match common::load(&self.paths.config_file).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "Failed to load config from file");
                if e.is_not_found() {
                    *self.config.write().await = None;
                }
                return ConfigurationView::Unconfigured {
                    message: "No configuration found. Please POST a configuration to /api/v1/config to get started."
                        .to_string(),
                };
            }
        };

        *self.config.write().await = Some(cfg.clone());

        if !cfg.is_usable() {
            return ConfigurationView::Unconfigured {
                message: "Configuration is incomplete. Please complete the setup.".to_string(),
            };
        }
        ConfigurationView::Configured(cfg)
    }

    /// Store the first configuration. Rejected once a usable one exists.
    pub async fn create_configuration(&self, mut doc: Config) -> Result<()> {
        if self.is_configured().await {
            return Err(ProvisioningError::ConfigurationExists);
        }

        doc.apply_defaults();
        common::save(&doc, &self.paths.config_file).await.map_err(|e| {
            error!(error = %e, "Failed to save config");
            e
        })?;
        *self.config.write().await = Some(doc);

        info!("Configuration created");
        Ok(())
    }

    /// Replace the whole configuration and regenerate the dnsmasq config
    pub async fn replace_configuration(&self, doc: Config) -> Result<()> {
        if !self.is_configured().await {
            return Err(ProvisioningError::ConfigurationMissing);
        }

        common::save(&doc, &self.paths.config_file).await.map_err(|e| {
            error!(error = %e, "Failed to save config");
            e
        })?;
        *self.config.write().await = Some(doc.clone());
        info!("Configuration updated");

        self.dnsmasq
            .write_config(&doc, &self.paths.dnsmasq_conf)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to update dnsmasq config");
                e
            })?;
        Ok(())
    }

    /// The configuration file exactly as stored
    pub async fn get_raw_configuration(&self) -> Result<Vec<u8>> {
        match tokio::fs::read(&self.paths.config_file).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProvisioningError::RawDocumentMissing)
            }
            Err(e) => {
                error!(error = %e, "Failed to read config file");
                Err(ConfigError::Io {
                    action: "reading config file",
                    path: self.paths.config_file.clone(),
                    source: e,
                }
                .into())
            }
        }
    }

    /// Write a hand-edited document verbatim, then try to apply it.
    ///
    /// Unlike [`replace_configuration`](Self::replace_configuration) the
    /// document is saved before it is validated. Decode or dnsmasq failures
    /// afterwards are reported as warnings, not errors.
    pub async fn replace_raw_configuration(&self, content: &[u8]) -> Result<RawUpdateOutcome> {
        common::save_raw(content, &self.paths.config_file).await.map_err(|e| {
            error!(error = %e, "Failed to write config file");
            e
        })?;

        let cfg = match common::load(&self.paths.config_file).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "Saved YAML config but failed to parse it");
                return Ok(RawUpdateOutcome::SavedWithWarnings {
                    warning: format!("Configuration saved but contains validation errors: {}", e),
                });
            }
        };
        *self.config.write().await = Some(cfg.clone());

        if let Err(e) = self.dnsmasq.write_config(&cfg, &self.paths.dnsmasq_conf).await {
            warn!(error = %e, "Failed to update dnsmasq config");
            return Ok(RawUpdateOutcome::SavedWithWarnings {
                warning: format!("Configuration saved but failed to update dnsmasq config: {}", e),
            });
        }

        Ok(RawUpdateOutcome::Updated)
    }

    /// Rendered dnsmasq config for the current configuration
    pub async fn render_service_config(&self) -> Result<String> {
        let cfg = self.usable_config().await?;
        Ok(self.dnsmasq.generate(&cfg)?)
    }

    /// Rewrite the dnsmasq config and restart the service
    pub async fn restart_network_service(&self) -> Result<()> {
        let cfg = self.usable_config().await?;

        self.dnsmasq
            .write_config(&cfg, &self.paths.dnsmasq_conf)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to update dnsmasq config");
                e
            })?;
        self.dnsmasq.restart_service().await?;
        Ok(())
    }

    /// Run the full boot asset pipeline for the current configuration
    pub async fn provision_boot_assets(&self) -> Result<BootAssets> {
        let cfg = self.usable_config().await?;
        Ok(self.assets.provision(&cfg).await?)
    }
}
