//! wild-central daemon
//!
//! Serves the configuration API, renders the dnsmasq config and provisions
//! PXE boot assets for Talos nodes.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use wild_central_common::Config;
use wild_central_dnsmasq::DnsmasqGenerator;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

pub mod api;
pub mod assets;
pub mod paths;
pub mod provisioning;
pub mod status;

#[cfg(test)]
pub(crate) mod test_helpers;

use crate::assets::{AssetProvisioner, AssetSources};
use crate::paths::DataManager;
use crate::provisioning::ProvisioningService;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub provisioning: Arc<ProvisioningService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(provisioning: Arc<ProvisioningService>) -> Self {
        Self {
            provisioning,
            started_at: Instant::now(),
        }
    }
}

/// Process-level settings that are not part of the configuration document
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Development layout rooted here instead of auto-detecting
    pub data_dir: Option<PathBuf>,
    /// Directory the UI is served from
    pub static_dir: PathBuf,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Resolve paths, prepare the data directory and load the configuration
pub async fn build_service(data_dir: Option<PathBuf>) -> Result<ProvisioningService> {
    let manager = DataManager::detect(data_dir)?;
    manager
        .initialize()
        .await
        .context("Failed to initialize data directory")?;

    let paths = manager.paths().clone();
    let assets = AssetProvisioner::new(&paths.assets_dir, AssetSources::default());
    let service = ProvisioningService::new(paths, DnsmasqGenerator::new(), assets);
    service.load_initial().await;
    Ok(service)
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run(options: ServerOptions) -> Result<()> {
    let service = Arc::new(build_service(options.data_dir).await?);

    let addr = service
        .current()
        .await
        .unwrap_or_else(Config::default)
        .listen_addr();
    let app = api::app_router(AppState::new(service), &options.static_dir);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        addr = %listener.local_addr().context("Failed to get local address")?,
        static_dir = %options.static_dir.display(),
        "wild-central listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_service_initializes_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("wild");

        let service = build_service(Some(root.clone())).await.unwrap();

        assert!(root.join("logs").is_dir());
        assert!(root.join("assets").is_dir());
        assert!(service.current().await.is_none());
    }

    #[tokio::test]
    async fn test_build_service_loads_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.yaml"),
            "server:\n  port: 6060\ncloud:\n  domain: example.test\n",
        )
        .unwrap();

        let service = build_service(Some(tmp.path().to_path_buf())).await.unwrap();
        let cfg = service.current().await.unwrap();

        assert_eq!(cfg.domain(), "example.test");
        assert_eq!(cfg.listen_addr(), "0.0.0.0:6060");
    }

    #[tokio::test]
    async fn test_build_service_tolerates_malformed_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.yaml"), "cloud: [").unwrap();

        let service = build_service(Some(tmp.path().to_path_buf())).await.unwrap();
        assert!(service.current().await.is_none());
    }
}
