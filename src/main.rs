// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! FormGate service
//!
//! A form-submission relay for static sites.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file is
//! honored):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `DB_PATH`: "memory" or a RocksDB directory (default: memory)
//! - `DASHBOARD_URL`: Base URL for email deep links
//! - `DASHBOARD_ORIGINS`: Comma-separated management CORS origins
//! - `TRUSTED_ORIGIN_SUFFIXES`: Comma-separated host suffixes accepted
//!   regardless of a form's allow-list; empty disables the exception
//! - `RATE_LIMIT_MAX_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`: Intake quota
//! - `MAIL_API_URL` / `MAIL_API_KEY` / `MAIL_SENDER`: Outbound mail;
//!   notifications are disabled until key and sender are set

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use formgate::{
    config::Config,
    db::Database,
    handlers::{router, AppState},
    intake::SubmissionPipeline,
    limiter::{MemoryStore, RateLimiter},
    metrics::Metrics,
    notify::Mailer,
    origin::OriginPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        db_path = %config.db_path,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Starting FormGate"
    );

    // Connect storage
    let db = Database::connect(&config.db_path).await?;
    info!("Connected to storage");

    // Create application state
    let store = Arc::new(MemoryStore::new());
    let limiter = RateLimiter::new(store, config.rate_limit.clone());
    let origins = OriginPolicy::new(config.origins.trusted_suffixes.clone());
    let metrics = Metrics::new();
    let mailer = Mailer::from_config(&config.mail, &config.dashboard_url).map(Arc::new);
    if mailer.is_none() {
        warn!("Mail transport not configured, notifications disabled");
    }

    let pipeline = SubmissionPipeline::new(
        db.clone(),
        limiter.clone(),
        origins.clone(),
        mailer,
        metrics.clone(),
    );

    let state = Arc::new(AppState {
        db,
        pipeline,
        origins,
        metrics,
        config: config.clone(),
    });

    // Spawn the rate-limit sweep task
    let sweep_interval = config.rate_limit.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            limiter.sweep().await;
        }
    });

    // Build router and start server
    let app = router(state);
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
