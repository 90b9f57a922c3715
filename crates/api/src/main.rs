use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use scriptrun_api::background;
use scriptrun_api::config::ServerConfig;
use scriptrun_api::router::build_app_router;
use scriptrun_api::state::AppState;
use scriptrun_store::ScriptStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scriptrun_api=debug,scriptrun_core=debug,scriptrun_store=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        scripts_dir = %config.scripts_dir.display(),
        container = config.container,
        "Loaded server configuration"
    );

    // --- Script store ---
    let scripts = ScriptStore::open(&config.scripts_dir)
        .await
        .expect("Failed to open script store");
    tracing::info!(root = %scripts.root().display(), "Script store ready");

    // --- App state ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let run_retention = config.run_retention;
    let state = AppState::new(config, scripts);
    let runs = Arc::clone(&state.runs);

    // --- Background jobs ---
    let shutdown = CancellationToken::new();
    let retention_handle = run_retention.map(|retention| {
        tokio::spawn(background::run_retention::run(
            Arc::clone(&runs),
            retention,
            shutdown.clone(),
        ))
    });
    if retention_handle.is_none() {
        tracing::info!("Run retention disabled, finished runs are kept in memory");
    }

    // Terminate children as soon as shutdown starts so open output streams
    // reach their end marker and the server can finish draining connections.
    let drain_handle = {
        let runs = Arc::clone(&runs);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            runs.shutdown(shutdown_timeout).await
        })
    };

    // --- Start server ---
    let app = build_app_router(state);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    shutdown.cancel();

    if let Some(handle) = retention_handle {
        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(())) => tracing::info!("Run retention job stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Run retention job failed"),
            Err(_) => tracing::warn!("Run retention job did not stop in time"),
        }
    }

    match drain_handle.await {
        Ok(true) => tracing::info!("All runs drained"),
        Ok(false) => tracing::warn!("Some runs were abandoned at shutdown"),
        Err(e) => tracing::error!(error = %e, "Run drain task failed"),
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
