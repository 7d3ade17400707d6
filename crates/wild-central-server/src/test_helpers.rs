//! Test helpers for wild-central-server
//!
//! Builds service instances rooted in scratch directories and runs a local
//! stand-in for the Talos image factory and the iPXE loader host.

use crate::assets::{AssetProvisioner, AssetSources, LoaderSource, ARCH};
use crate::paths::DataPaths;
use crate::provisioning::ProvisioningService;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use wild_central_common::Config;
use wild_central_dnsmasq::{DnsmasqGenerator, RestartCommand};

/// Smallest configuration that passes the usable check
pub fn usable_config() -> Config {
    let mut cfg = Config::default();
    cfg.cloud.domain = "example.test".to_string();
    cfg.cloud.internal_domain = "internal.example.test".to_string();
    cfg.cloud.dns.ip = "10.0.0.5".to_string();
    cfg.cloud.router.ip = "10.0.0.1".to_string();
    cfg.cloud.dhcp_range = "10.0.0.100,10.0.0.200".to_string();
    cfg.cloud.dnsmasq.interface = "eth0".to_string();
    cfg.cluster.endpoint_ip = "10.0.0.5".to_string();
    cfg.cluster.nodes.talos.version = "v1.2.3".to_string();
    cfg
}

/// Service using the development layout under `root`. The restart command is
/// `true` so nothing on the host is touched, and asset sources point at an
/// unroutable address.
pub fn test_service(root: &Path) -> ProvisioningService {
    let paths = DataPaths::development(root);
    let sources = AssetSources {
        factory_url: "http://127.0.0.1:1".to_string(),
        pxe_url: "http://127.0.0.1:1".to_string(),
        loaders: Vec::new(),
    };
    ProvisioningService::new(
        paths.clone(),
        DnsmasqGenerator::new().with_restart_command(RestartCommand::new("true")),
        AssetProvisioner::new(&paths.assets_dir, sources),
    )
}

/// App state wrapping [`test_service`]
pub fn create_test_app_state(root: &Path) -> AppState {
    AppState::new(Arc::new(test_service(root)))
}

/// API router backed by a scratch directory
pub fn create_test_api_router(root: &Path) -> Router {
    crate::api::api_router().with_state(create_test_app_state(root))
}

/// API router around a service built by the caller
pub fn create_test_api_router_for(service: ProvisioningService) -> Router {
    crate::api::api_router().with_state(AppState::new(Arc::new(service)))
}

/// Behaviour of the mock image factory
#[derive(Debug, Clone)]
pub struct MockFactory {
    pub schematic_status: u16,
    pub schematic_body: String,
    pub initramfs_missing: bool,
    pub loaders_missing: bool,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self {
            schematic_status: 200,
            schematic_body: r#"{"id":"abc123"}"#.to_string(),
            initramfs_missing: false,
            loaders_missing: false,
        }
    }
}

#[derive(Clone)]
struct MockState {
    behaviour: Arc<MockFactory>,
    received_schematic: Arc<Mutex<Option<String>>>,
}

/// A running mock factory
pub struct MockFactoryServer {
    addr: SocketAddr,
    received_schematic: Arc<Mutex<Option<String>>>,
}

impl MockFactoryServer {
    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Sources pointing every stage at this server
    pub fn sources(&self) -> AssetSources {
        let base = self.base_url();
        AssetSources {
            factory_url: base.clone(),
            pxe_url: base.clone(),
            loaders: vec![
                LoaderSource::new(format!("{}/ipxe.efi", base), "ipxe.efi"),
                LoaderSource::new(format!("{}/undionly.kpxe", base), "undionly.kpxe"),
                LoaderSource::new(format!("{}/arm64-efi/ipxe.efi", base), "ipxe-arm64.efi"),
            ],
        }
    }

    /// Body of the last schematic request, if one arrived
    pub async fn schematic_body(&self) -> Option<String> {
        self.received_schematic.lock().await.clone()
    }
}

/// Start a mock factory on an ephemeral port
pub async fn spawn_mock_factory(behaviour: MockFactory) -> MockFactoryServer {
    let received_schematic = Arc::new(Mutex::new(None));
    let state = MockState {
        behaviour: Arc::new(behaviour),
        received_schematic: received_schematic.clone(),
    };

    let app = Router::new()
        .route("/schematics", post(mock_schematic))
        .route("/image/{id}/{version}/{file}", get(mock_image))
        .route("/ipxe.efi", get(mock_loader))
        .route("/undionly.kpxe", get(mock_loader))
        .route("/arm64-efi/ipxe.efi", get(mock_loader))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock factory");
    let addr = listener.local_addr().expect("Failed to read mock factory address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    MockFactoryServer {
        addr,
        received_schematic,
    }
}

async fn mock_schematic(State(state): State<MockState>, body: String) -> (StatusCode, String) {
    *state.received_schematic.lock().await = Some(body);
    let status = StatusCode::from_u16(state.behaviour.schematic_status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, state.behaviour.schematic_body.clone())
}

async fn mock_image(
    State(state): State<MockState>,
    UrlPath((id, version, file)): UrlPath<(String, String, String)>,
) -> (StatusCode, String) {
    if file == format!("kernel-{}", ARCH) {
        (StatusCode::OK, format!("kernel {} {}", id, version))
    } else if file == format!("initramfs-{}.xz", ARCH) && !state.behaviour.initramfs_missing {
        (StatusCode::OK, format!("initramfs {} {}", id, version))
    } else {
        (StatusCode::NOT_FOUND, String::new())
    }
}

async fn mock_loader(State(state): State<MockState>) -> (StatusCode, Bytes) {
    if state.behaviour.loaders_missing {
        return (StatusCode::NOT_FOUND, Bytes::new());
    }
    (StatusCode::OK, Bytes::from_static(b"loader"))
}
