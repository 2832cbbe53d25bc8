//! Casting Gate
//!
//! Standalone authorization service for the Casting Agency API. Reverse
//! proxies delegate their permission checks to `/v1/authorize/{permission}`.

use casting_gate::auth::AuthGate;
use casting_gate::config::Config;
use casting_gate::routes::{build_routes, init_metrics_recorder, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "casting_gate=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Casting Gate starting");

    let config = Config::from_env().inspect_err(|e| error!("Invalid configuration: {}", e))?;

    info!(
        issuer = %config.issuer,
        audience = %config.audience,
        jwks_url = %config.jwks_url,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl_seconds,
        jwks_fetch_timeout_seconds = config.jwks_fetch_timeout_seconds,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded"
    );

    let metrics_handle =
        init_metrics_recorder().inspect_err(|e| error!("Metrics recorder unavailable: {}", e))?;

    let addr: SocketAddr = config
        .bind_address
        .parse::<SocketAddr>()
        .inspect_err(|e| error!(bind_address = %config.bind_address, "Unparsable bind address: {}", e))?;

    // One gate, and so one key cache, for every request.
    let gate = Arc::new(AuthGate::from_config(&config));
    let app = build_routes(Arc::new(AppState { gate }), metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Casting Gate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(config.drain_seconds))
        .await?;

    info!("Casting Gate stopped");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves once SIGINT or SIGTERM arrives and the drain period has elapsed.
async fn wait_for_shutdown(drain_seconds: u64) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("SIGINT handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    info!(signal = signal_name, "Shutdown requested");

    if drain_seconds == 0 {
        return;
    }

    warn!(drain_seconds, "Draining in-flight requests");
    tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
}
