//! gramdeck API server entry point.
//!
//! Initialises tracing, loads configuration from `.env` and `GRAMDECK_*`
//! environment variables, starts the background automation loop unless running in API
//! mode, and serves the agent API until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;

use gramdeck_server::{
    AgentController, AppState, CommandAutomationClient, Config, ControllerSettings,
    IterationLoop, StatusStore, lifecycle::default_catalog, router, telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter and route panics through it.
    telemetry::init_tracing();
    telemetry::install_panic_hook();

    tracing::info!("gramdeck-server starting");

    // 2. Load configuration from .env (if present) and GRAMDECK_* env vars.
    let config = Config::load()?;
    let addr = config.socket_addr()?;

    tracing::info!(
        listen_addr = %addr,
        mode = %config.mode,
        automation_program = %config.automation_program,
        engagement_agent_id = %config.engagement_agent_id,
        tls_enabled = config.tls_paths().is_some(),
        "configuration loaded",
    );

    // 3. Wire the automation client, status store and controller.
    let cancel = CancellationToken::new();
    let client = Arc::new(CommandAutomationClient::new(
        config.automation_program.clone(),
        config.automation_args.clone(),
        config.automation_timeout(),
    ));
    let controller = Arc::new(AgentController::new(
        StatusStore::new(),
        client.clone(),
        ControllerSettings {
            engagement_agent_id: config.engagement_agent_id.clone(),
            deploy_delay: config.deploy_delay(),
            catalog: default_catalog(),
        },
        cancel.child_token(),
    ));

    // 4. Start the background loop unless in API mode.
    let background = if config.mode.runs_background_loop() {
        let looper = IterationLoop::new(client, config.iteration_interval(), cancel.child_token());
        Some(tokio::spawn(looper.run()))
    } else {
        tracing::info!("API mode: background automation loop disabled");
        None
    };

    // 5. Compose the router and translate OS signals into cancellation.
    let app = router(AppState::new(controller.clone()), &config.cors_origin)?;
    tokio::spawn(cancel_on_signal(cancel.clone()));

    // 6. Bind and serve (TLS or plaintext).
    if let Some((cert_path, key_path)) = config.tls_paths() {
        tracing::info!("TLS enabled, loading cert from {}", cert_path);
        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS certificates")?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let shutdown_token = cancel.clone();
        let grace = config.shutdown_grace();
        tokio::spawn(async move {
            shutdown_token.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!("API server ready at https://{addr}/api/health");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .context("HTTPS server error")?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind TCP listener")?;

        tracing::info!("API server ready at http://{addr}/api/health");
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .await
            .context("HTTP server error")?;
    }

    // 7. Drain background work.
    cancel.cancel();
    controller.shutdown(config.shutdown_grace()).await;
    if let Some(handle) = background {
        match tokio::time::timeout(config.shutdown_grace(), handle).await {
            Ok(Ok(iterations)) => tracing::debug!(iterations, "background loop joined"),
            Ok(Err(e)) => tracing::error!(error = %e, "background loop task failed"),
            Err(_) => tracing::warn!("background loop still running after shutdown grace period"),
        }
    }

    tracing::info!("gramdeck-server shut down");
    Ok(())
}

/// Cancel `token` on SIGINT (Ctrl-C) or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
    token.cancel();
}
