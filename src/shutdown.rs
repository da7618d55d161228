// ABOUTME: Process-wide shutdown signal as an explicit cancellation token.
// ABOUTME: Cancelled on ctrl-c; passed to the server loop and every dispatch branch.

use tokio_util::sync::CancellationToken;

/// Create the process shutdown token and spawn the ctrl-c watcher that
/// cancels it. Outstanding streams and dispatch branches observe the token
/// and abandon their work instead of being awaited indefinitely.
pub fn install() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        trigger.cancel();
    });

    token
}
