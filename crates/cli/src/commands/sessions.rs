//! Session maintenance commands.

use chrono::Utc;

use pennyshop_storefront::background::session_sweep::SessionSweeper;
use pennyshop_storefront::db::PgStore;
use pennyshop_storefront::error::AppError;
use pennyshop_storefront::state::AppState;

use crate::error::CliError;
use crate::output;

/// Delete expired sessions once and print how many were removed.
///
/// # Errors
///
/// Returns `CliError::App` if the delete fails.
pub async fn sweep(state: &AppState<PgStore>) -> Result<(), CliError> {
    let removed = state
        .sessions()
        .sweep_expired(Utc::now())
        .await
        .map_err(AppError::from)?;

    output::emit(&serde_json::json!({ "removed": removed }))?;
    Ok(())
}

/// Run the periodic session sweep until Ctrl+C or SIGTERM, then stop it and
/// wait for it to finish.
///
/// # Errors
///
/// Returns `CliError::Task` if the sweep task panicked.
pub async fn serve(state: &AppState<PgStore>) -> Result<(), CliError> {
    let interval = state.session_config().sweep_interval;
    let sweeper = SessionSweeper::spawn(state.clone(), interval);
    tracing::info!(interval_secs = interval.as_secs(), "Session sweeper running");

    shutdown_signal().await;

    sweeper.shutdown().await?;
    tracing::info!("Session sweeper stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
