//! OS termination signals.

use crate::{LifecycleCoordinator, LifecycleResult};
use tracing::{error, info};

/// Wait for Ctrl-C, or SIGTERM on unix. Returns the signal name.
pub async fn wait_for_termination() -> LifecycleResult<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r.map(|_| "SIGINT").map_err(Into::into),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

/// Request shutdown when a termination signal arrives.
///
/// The listener exits quietly if shutdown starts some other way.
pub fn install_signal_handler(lifecycle: &LifecycleCoordinator) {
    let coordinator = lifecycle.clone();
    let cancel = lifecycle.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = wait_for_termination() => match result {
                Ok(signal) => {
                    info!(signal, "received termination signal");
                    coordinator.request_shutdown();
                }
                Err(e) => error!(error = %e, "failed to install signal handler"),
            }
        }
    });
}
