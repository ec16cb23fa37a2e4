use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Install a handler that cancels the returned token on SIGTERM or SIGINT.
///
/// Sessions and their pollers derive child tokens from it, so an interrupt
/// stops the foreground loop and the poller together and still lets the
/// session write its logout notice.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, logging out");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, logging out");
            }
        }

        token_clone.cancel();
    });

    Ok(token)
}
