//! HTTP API
//!
//! Thin handlers over [`ProvisioningService`](crate::provisioning::ProvisioningService).
//! Every failure leaves as `{"error": CODE, "message": text}`.

use crate::assets::StageError;
use crate::provisioning::{ConfigurationView, ProvisioningError};
use crate::status::StatusReport;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, MatchedPath, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{error, Level, Span};
use wild_central_common::Config;
use wild_central_dnsmasq::DnsmasqError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Routes under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/status", get(status))
        .route("/v1/config", get(get_config).post(create_config).put(replace_config))
        .route("/v1/config/yaml", get(get_config_yaml).put(replace_config_yaml))
        .route("/v1/dnsmasq/config", get(get_dnsmasq_config))
        .route("/v1/dnsmasq/restart", post(restart_dnsmasq))
        .route("/v1/pxe/assets", post(provision_pxe_assets))
}

/// Full application: API, static UI fallback, CORS and request tracing
pub fn app_router(state: AppState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", api_router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());

                    tracing::debug_span!(
                        "http-request",
                        method = %request.method(),
                        uri = %request.uri(),
                        matched_path = matched_path,
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     latency: std::time::Duration,
                     span: &Span| {
                        tracing::error!(parent: span, latency = ?latency, error = %error, "Request failed");
                    },
                ),
        )
        .with_state(state)
}

impl ProvisioningError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProvisioningError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            ProvisioningError::ConfigurationExists => StatusCode::CONFLICT,
            ProvisioningError::ConfigurationMissing | ProvisioningError::RawDocumentMissing => {
                StatusCode::NOT_FOUND
            }
            ProvisioningError::NotConfigured => StatusCode::PRECONDITION_FAILED,
            ProvisioningError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProvisioningError::Dnsmasq(e) if e.is_restart_failure() => StatusCode::BAD_GATEWAY,
            ProvisioningError::Dnsmasq(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProvisioningError::Assets(e) if e.is_external() => StatusCode::BAD_GATEWAY,
            ProvisioningError::Assets(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ProvisioningError::InvalidDocument(_) => "INVALID_DOCUMENT",
            ProvisioningError::ConfigurationExists => "CONFIGURATION_EXISTS",
            ProvisioningError::ConfigurationMissing => "CONFIGURATION_MISSING",
            ProvisioningError::NotConfigured => "NOT_CONFIGURED",
            ProvisioningError::RawDocumentMissing => "CONFIG_FILE_NOT_FOUND",
            ProvisioningError::Store(_) => "STORE_ERROR",
            ProvisioningError::Dnsmasq(DnsmasqError::Template(_)) => "DNSMASQ_TEMPLATE_ERROR",
            ProvisioningError::Dnsmasq(DnsmasqError::Write { .. }) => "DNSMASQ_WRITE_FAILED",
            ProvisioningError::Dnsmasq(_) => "DNSMASQ_RESTART_FAILED",
            ProvisioningError::Assets(e) => match e.source {
                StageError::Http { .. } | StageError::Status { .. } => "UPSTREAM_UNAVAILABLE",
                StageError::InvalidResponse(_) => "UPSTREAM_INVALID_RESPONSE",
                StageError::Io { .. } | StageError::Script(_) => "ASSET_WRITE_FAILED",
            },
        }
    }
}

impl IntoResponse for ProvisioningError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let ProvisioningError::Assets(e) = &self {
            body["stage"] = json!(e.stage);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ProvisioningError>;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "wild-cloud-central",
    }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport::running(state.started_at.elapsed()))
}

async fn get_config(State(state): State<AppState>) -> Json<Value> {
    match state.provisioning.get_configuration().await {
        ConfigurationView::Configured(config) => Json(json!({
            "configured": true,
            "config": config,
        })),
        ConfigurationView::Unconfigured { message } => Json(json!({
            "configured": false,
            "message": message,
        })),
    }
}

fn document(payload: Result<Json<Config>, JsonRejection>) -> ApiResult<Config> {
    payload
        .map(|Json(doc)| doc)
        .map_err(|rejection| ProvisioningError::InvalidDocument(rejection.body_text()))
}

async fn create_config(
    State(state): State<AppState>,
    payload: Result<Json<Config>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let doc = document(payload)?;
    state.provisioning.create_configuration(doc).await?;
    Ok((StatusCode::CREATED, Json(json!({"status": "created"}))))
}

async fn replace_config(
    State(state): State<AppState>,
    payload: Result<Json<Config>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let doc = document(payload)?;
    state.provisioning.replace_configuration(doc).await?;
    Ok(Json(json!({"status": "updated"})))
}

async fn get_config_yaml(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let content = state.provisioning.get_raw_configuration().await?;
    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], content))
}

async fn replace_config_yaml(State(state): State<AppState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let outcome = state.provisioning.replace_raw_configuration(&body).await?;
    Ok(Json(outcome))
}

async fn get_dnsmasq_config(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rendered = state.provisioning.render_service_config().await?;
    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], rendered))
}

async fn restart_dnsmasq(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.provisioning.restart_network_service().await?;
    Ok(Json(json!({"status": "restarted"})))
}

async fn provision_pxe_assets(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let assets = state.provisioning.provision_boot_assets().await?;
    Ok(Json(json!({
        "status": "downloaded",
        "assets": assets,
    })))
}
