//! # Termination signals for the supervisor itself.
//!
//! [`wait_for_shutdown_signal`] completes when the supervisor process receives
//! `SIGINT` (Ctrl-C), `SIGTERM` (service managers) or `SIGQUIT`. The core
//! then drains every managed child before exiting.
//!
//! These handlers only concern the supervisor. Managed children get their own
//! configured stop signal from the core.

/// Waits for a termination signal.
///
/// Each call installs independent listeners. Returns `Err` if a listener
/// cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
