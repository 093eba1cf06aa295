//! Cancellation signal for network-bound calls.

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;

/// Sending half; any `send` cancels every pending and future call.
pub type CancelTx = watch::Sender<()>;

/// Receiving half, threaded through every network-bound call.
pub type CancelRx = watch::Receiver<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Creates a new pair of [`CancelTx`] and [`CancelRx`].
pub fn create_cancel_signal() -> (CancelTx, CancelRx) {
	watch::channel(())
}

/// Drive `fut` to completion unless the cancel signal fires first.
///
/// A dropped sender never cancels.
pub async fn cancellable<F: Future>(cancel: &mut CancelRx, fut: F) -> Result<F::Output, Cancelled> {
	tokio::select! {
		biased;

		_ = wait_cancelled(cancel) => Err(Cancelled),
		output = fut => Ok(output),
	}
}

async fn wait_cancelled(cancel: &mut CancelRx) {
	if cancel.changed().await.is_err() {
		std::future::pending::<()>().await;
	}
}
