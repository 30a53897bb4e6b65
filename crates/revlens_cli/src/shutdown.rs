use console::Term;
use tokio_util::sync::CancellationToken;

/// Install the Ctrl+C handler and return the root cancellation token.
///
/// The first Ctrl+C cancels the token so running work can wind down; a
/// second one exits immediately with status 130.
pub(crate) fn setup_shutdown_handler() -> CancellationToken {
    let root = CancellationToken::new();
    let token = root.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stderr().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current operations...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current operations");
        }

        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });

    root
}
