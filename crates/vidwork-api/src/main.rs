//! Axum API server binary.

use std::net::SocketAddr;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidwork_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vidwork=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vidwork-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let state = match AppState::new(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create application state: {}", e);
            std::process::exit(1);
        }
    };

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    let app = create_router(state.clone(), metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let shutdown = state.shutdown.clone();

    // `axum::serve(...).with_graceful_shutdown(...)` doesn't return until
    // every in-flight response body finishes draining, and `/process`'s
    // body isn't done until the job itself completes and clears
    // `state.in_flight` back to `None` (see `handlers::process::run_job`).
    // Reading `state.in_flight` *after* `serve()` resolves would therefore
    // always observe `None`, making the in-flight flush below unreachable.
    // Snapshot it from inside the shutdown-signal future instead, the
    // instant the signal arrives and before graceful shutdown starts
    // waiting on that same in-flight request to drain.
    let in_flight_source = state.in_flight.clone();
    let in_flight_snapshot: std::sync::Arc<tokio::sync::Mutex<Option<vidwork_worker::InFlightJob>>> =
        std::sync::Arc::new(tokio::sync::Mutex::new(None));
    let snapshot_sink = in_flight_snapshot.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.wait_for_signal().await;
            let snapshot = in_flight_source.lock().await.clone();
            *snapshot_sink.lock().await = snapshot;
        })
        .await
        .unwrap();

    let in_flight = in_flight_snapshot.lock().await.clone();
    state.shutdown.flush_and_exit(in_flight, "server_shutdown").await;
}
