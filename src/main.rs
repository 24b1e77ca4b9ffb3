//! Realtime Core - Alert console
//!
//! Connects to the configured push channel, logs incoming alerts and
//! connection changes, and closes the connection cleanly on Ctrl-C.

use std::process::ExitCode;

use realtime_core::config::AppConfig;
use realtime_core::telemetry;
use realtime_core::RealtimeContext;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load_validated() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_tracing(&config.logging) {
        eprintln!("Failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    let context = match RealtimeContext::from_config(&config) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(endpoint = %config.channel.url, "Starting alert console");

    let feed = context.mount_alerts();
    let mut alerts = feed.changes();
    let mut status = context.connection().watch_status();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                tracing::info!(
                    state = ?current.state,
                    health = current.health().describe(),
                    attempt = current.reconnect_attempt,
                    "Connection status changed"
                );
            }
            changed = alerts.changed() => {
                if changed.is_err() {
                    break;
                }
                let newest = alerts.borrow_and_update().newest().cloned();
                if let Some(alert) = newest {
                    tracing::info!(
                        unseen = feed.unseen_count(),
                        received_at = %alert.received_at,
                        payload = %alert.payload,
                        "Alert"
                    );
                }
            }
        }
    }

    tracing::info!("Shutting down");
    feed.unmount();
    ExitCode::SUCCESS
}
