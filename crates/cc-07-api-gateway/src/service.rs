//! Gateway module: serves JSON-RPC over HTTP while the node runs.

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use shared_types::{Application, DependencyGate, Lifecycle, Module, ModuleError, ModuleStatus};

use crate::domain::config::GatewayConfig;
use crate::domain::error::{ApiError, GatewayError};
use crate::router::{route_method, AppState};

pub const MODULE_NAME: &str = "gateway";

/// State shared by the HTTP handlers.
#[derive(Clone)]
struct HttpState {
    app: AppState,
    max_batch_size: usize,
}

pub struct GatewayModule {
    lifecycle: Lifecycle,
    config: GatewayConfig,
    state: AppState,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: CancellationToken,
    server_done: DependencyGate,
}

impl GatewayModule {
    pub fn new(config: GatewayConfig, state: AppState) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            lifecycle: Lifecycle::new(MODULE_NAME),
            config,
            state,
            local_addr: Mutex::new(None),
            shutdown: CancellationToken::new(),
            server_done: DependencyGate::new("gateway.server_done"),
        })
    }

    /// Bound address, once the server is listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn build_http_router(&self) -> Router {
        let state = HttpState {
            app: self.state.clone(),
            max_batch_size: self.config.max_batch_size,
        };
        Router::new()
            .route("/", post(handle_json_rpc))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics))
            .layer(DefaultBodyLimit::max(self.config.max_request_size))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    async fn serve(&self, cancel: CancellationToken) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        let bound = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        *self.local_addr.lock() = Some(bound);

        self.lifecycle.mark_ready();
        info!(addr = %bound, "JSON-RPC server listening");

        let shutdown = self.shutdown.clone();
        let result = axum::serve(listener, self.build_http_router())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = shutdown.cancelled() => {}
                }
            })
            .await;
        self.server_done.open();
        info!("JSON-RPC server stopped");
        result.map_err(|e| GatewayError::Serve(e.to_string()))
    }
}

#[async_trait]
impl Application for GatewayModule {}

#[async_trait]
impl Module for GatewayModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Waits for startup dependencies, then serves until `cancel` fires or
    /// `stop` is called.
    async fn start(&self, cancel: CancellationToken) -> Result<(), ModuleError> {
        self.lifecycle.begin_start(&cancel).await?;
        if let Err(e) = self.serve(cancel).await {
            self.lifecycle.set_status(ModuleStatus::Failed);
            error!(error = %e, "gateway failed");
            return Err(e.into());
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.lifecycle.begin_stop().await;
        self.shutdown.cancel();
        if self.local_addr().is_some() {
            let drained =
                tokio::time::timeout(self.config.shutdown_timeout, self.server_done.wait()).await;
            if drained.is_err() {
                warn!(
                    timeout_secs = self.config.shutdown_timeout.as_secs(),
                    "gateway shutdown timed out"
                );
            }
        }
        self.lifecycle.mark_stopped();
        Ok(())
    }
}

/// Handle a JSON-RPC request or batch.
async fn handle_json_rpc(State(state): State<HttpState>, body: String) -> impl IntoResponse {
    let request: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_response(Value::Null, ApiError::parse_error(e.to_string()))),
            );
        }
    };

    let response = match request {
        Value::Array(requests) => {
            if requests.is_empty() || requests.len() > state.max_batch_size {
                let err = ApiError::invalid_request(format!(
                    "batch size must be between 1 and {}",
                    state.max_batch_size
                ));
                return (StatusCode::BAD_REQUEST, Json(error_response(Value::Null, err)));
            }
            let mut responses = Vec::with_capacity(requests.len());
            for req in &requests {
                responses.push(process_single_request(&state.app, req).await);
            }
            Value::Array(responses)
        }
        single => process_single_request(&state.app, &single).await,
    };

    (StatusCode::OK, Json(response))
}

/// Process a single JSON-RPC request
async fn process_single_request(state: &AppState, request: &Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    if !(id.is_string() || id.is_number()) {
        return error_response(
            Value::Null,
            ApiError::invalid_request("id must be string or number"),
        );
    }

    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return error_response(id, ApiError::invalid_request("missing method"));
    };
    let params = request.get("params");

    match route_method(state, method, params).await {
        Ok(result) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        }),
        Err(e) => error_response(id, e),
    }
}

fn error_response(id: Value, error: ApiError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}

/// Liveness plus per-module status.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    let report = state.app.system.health();
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if report.healthy { "healthy" } else { "degraded" },
            "service": "cadence",
            "version": env!("CARGO_PKG_VERSION"),
            "modules": report.modules,
        })),
    )
}

/// Prometheus scrape endpoint.
async fn metrics() -> impl IntoResponse {
    match cadence_telemetry::encode_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
