//! feed-relay server entry point.
//!
//! Starts the relay coordinator, the upstream subscription and the Axum
//! HTTP server, and tears them down in that order's reverse on shutdown.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use feed_relay::api;
use feed_relay::app_state::AppState;
use feed_relay::config::{LogFormat, RelayConfig};
use feed_relay::relay::Relay;
use feed_relay::upstream::{NatsFeed, UpstreamAdapter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = RelayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting feed-relay");

    // Relay core
    let relay = Relay::spawn(config.mailbox_capacity);

    // Upstream subscription
    let publisher = if config.upstream_enabled {
        let feed = NatsFeed::connect(&config.nats_url).await?;
        let events = feed
            .subscribe(&config.upstream_subject, config.backlog_window)
            .await?;
        let adapter = UpstreamAdapter::new(relay.handle());
        tokio::spawn(async move {
            if let Err(e) = adapter.run(events).await {
                tracing::warn!(error = %e, "upstream adapter stopped");
            }
        });
        Some(feed)
    } else {
        tracing::warn!("upstream disabled, nothing will be relayed");
        None
    };

    // Build application state and router
    let listen_addr = config.listen_addr;
    let app_state = AppState {
        relay: relay.handle(),
        publisher,
        config: Arc::new(config),
    };
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    relay.stop().await?;
    tracing::info!("feed-relay stopped");

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
