// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP surface for the FormGate relay.
//!
//! The public intake routes manage their CORS headers by hand because the
//! reflected origin depends on the form being posted to; the management
//! API sits behind a conventional CORS layer restricted to the dashboard.

use crate::{
    config::Config,
    db::Database,
    intake::SubmissionPipeline,
    manage,
    metrics::Metrics,
    origin::OriginPolicy,
};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub pipeline: SubmissionPipeline,
    pub origins: OriginPolicy,
    pub metrics: Metrics,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let dashboard_origins: Vec<HeaderValue> = state
        .config
        .dashboard_origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(dashboard_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let management = Router::new()
        .route("/forms", post(manage::create_form).get(manage::list_forms))
        .route(
            "/forms/:form_id",
            get(manage::get_form)
                .patch(manage::update_form)
                .delete(manage::delete_form),
        )
        .route("/forms/:form_id/transfer", post(manage::transfer_form))
        .route("/forms/:form_id/submissions", get(manage::list_submissions))
        .route(
            "/forms/:form_id/submissions/export",
            get(manage::export_submissions),
        )
        .layer(cors);

    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/submit/:form_id", post(submit).options(submit_preflight))
        .merge(management)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "formgate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

/// Accept one submission on a form's public endpoint.
///
/// Every response, success or failure, carries an
/// `Access-Control-Allow-Origin` header: the resolved origin on success,
/// the wildcard on any failure so browsers can surface the error body.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let source_key = client_ip(&headers, addr);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request_origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());

    debug!(
        form_id = %form_id,
        ip = %source_key,
        origin = ?request_origin,
        content_type = ?content_type,
        "processing submission"
    );

    match state
        .pipeline
        .submit(&form_id, content_type, request_origin, &source_key, body)
        .await
    {
        Ok(ack) => {
            let origin_header = ack
                .origin
                .header_value()
                .and_then(|v| HeaderValue::from_str(v).ok())
                .unwrap_or(HeaderValue::from_static("*"));
            (
                StatusCode::OK,
                [(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_header)],
                Json(json!({ "message": "Submission received successfully" })),
            )
                .into_response()
        }
        Err(err) => {
            let mut response = err.into_response();
            response.headers_mut().insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
            response
        }
    }
}

/// CORS preflight for a form's public endpoint. Reflects the form's
/// allow-list when one is configured; always responds 204.
pub async fn submit_preflight(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());

    let allow_list = match state.db.get_form(&form_id).await {
        Ok(Some(form)) => form.allowed_origins,
        _ => Vec::new(),
    };
    let decision = state.origins.resolve(request_origin, &allow_list);
    let origin_header = decision
        .header_value()
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or(HeaderValue::from_static("*"));

    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_header),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ),
        ],
    )
        .into_response()
}

/// Resolve the source key for rate limiting: the first hop of
/// `X-Forwarded-For`, then `X-Real-IP`, then the socket address.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    addr.ip().to_string()
}
