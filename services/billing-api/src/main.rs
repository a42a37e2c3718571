//! Lensa Billing API
//!
//! Subscription billing microservice for Lensa premium accounts, backed by
//! the Duitku payment gateway.
//!
//! ## REST Endpoints
//!
//! - `POST /api/v1/subscription` - Start a premium payment
//! - `GET /api/v1/subscription/status/{order_id}` - Poll payment status
//! - `GET /api/v1/subscription/current` - Current subscription
//! - `GET /api/v1/subscription/history` - Subscription history
//! - `POST /api/v1/subscription/cancel` - Cancel (optionally with refund)
//! - `POST /api/v1/subscription/auto-renewal` - Toggle auto-renewal
//! - `GET /api/v1/subscription/refund-eligibility` - Refund window state
//! - `GET /api/v1/subscription/payment-methods` - Available payment methods
//! - `GET /api/v1/subscription/{order_id}` - Record detail
//! - `POST /subscription/callback` - Duitku payment callback (form-encoded)
//! - `POST /subscription/simulate` - Simulated callback (non-production)
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! A daily maintenance sweep handles renewal reminders, renewal payment
//! creation, grace periods, stale-record expiry, and role downgrades.

mod config;
mod error;
mod extractors;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lensa_billing_core::{
    DuitkuProvider, LogNotifier, MaintenanceSweep, SubscriptionService, SystemClock,
};
use lensa_db::Repositories;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("billing_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lensa Billing API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        production = config.production,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = lensa_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Create repositories
    let repos = Repositories::new(pool.clone());
    let users = Arc::new(repos.users.clone());
    let subscriptions = Arc::new(repos.subscriptions.clone());

    // Create the lifecycle service; the provider and the engine share a clock
    let clock = Arc::new(SystemClock);
    let provider = Arc::new(DuitkuProvider::new(config.billing.clone(), clock.clone()));
    let service = Arc::new(SubscriptionService::new(
        subscriptions,
        users.clone(),
        provider,
        Arc::new(LogNotifier),
        clock,
        config.billing.clone(),
    ));

    // Start the maintenance sweep
    if config.scheduler_enabled {
        let sweep = MaintenanceSweep::new(service.clone());
        sweep.spawn(config.sweep_interval);
        tracing::info!(
            interval_secs = config.sweep_interval.as_secs(),
            "Maintenance sweep started"
        );
    }

    // Create application state
    let state = AppState::new(service, users, pool, config.clone());

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    // Start server
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 subscription routes (bearer-token auth via extractor)
    let api_v1 = Router::new()
        .route("/subscription", post(handlers::create_subscription))
        .route("/subscription/current", get(handlers::current_subscription))
        .route("/subscription/history", get(handlers::subscription_history))
        .route("/subscription/cancel", post(handlers::cancel_subscription))
        .route("/subscription/auto-renewal", post(handlers::set_auto_renewal))
        .route(
            "/subscription/refund-eligibility",
            get(handlers::refund_eligibility),
        )
        .route(
            "/subscription/payment-methods",
            get(handlers::payment_methods),
        )
        .route("/subscription/status/{order_id}", get(handlers::check_status))
        .route("/subscription/{order_id}", get(handlers::subscription_details));

    // Gateway-facing routes (form-encoded callback, no auth)
    let gateway_routes = Router::new()
        .route("/subscription/callback", post(handlers::payment_callback))
        .route("/subscription/simulate", post(handlers::simulate_callback));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .nest("/api/v1", api_v1)
        .merge(gateway_routes)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Most operations complete well under 100ms; gateway calls can take longer
    let latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("lensa_operation_duration_seconds".to_string()),
            latency_buckets,
        )?;

    let handle = builder.install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "lensa_payments_created_total",
        "Total payment transactions created"
    );
    metrics::describe_counter!(
        "lensa_subscriptions_cancelled_total",
        "Total subscriptions cancelled, by refund flag"
    );
    metrics::describe_counter!(
        "lensa_callbacks_processed_total",
        "Total gateway callbacks processed by status"
    );
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    metrics::describe_histogram!(
        "lensa_operation_duration_seconds",
        "Billing operation latency in seconds by operation type"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
