use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Conventional status for a run stopped by SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Listens for SIGINT and SIGTERM and cancels the root token when one
/// arrives. Nothing else cancels this token: the load derives its own child
/// token for internal failures.
#[derive(Default)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handlers(&self) {
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(err) = signal::ctrl_c().await {
                    error!(%err, "Failed to install SIGINT handler");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(err) => {
                        error!(%err, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT (Ctrl+C), stopping the load"),
                _ = terminate => info!("Received SIGTERM, stopping the load"),
            }

            cancel_token.cancel();
            warn!("Open transactions will be rolled back");
        });
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_follows_the_root_token() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_requested());

        coordinator.cancel_token().cancel();
        assert!(coordinator.is_shutdown_requested());
    }

    #[test]
    fn child_cancellation_is_not_a_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.cancel_token().child_token().cancel();
        assert!(!coordinator.is_shutdown_requested());
    }
}
