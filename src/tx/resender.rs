//! Background rebroadcast of an in-flight transaction

use crate::rpc::{SendOptions, SubmissionRpc};
use crate::tx::SubmittedTransaction;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

/// Resend bookkeeping for one submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub failures: u32,
}

/// Rebroadcasts the same bytes every interval until cancelled.
///
/// Resending is idempotent: the bytes and therefore the signature never change,
/// so a node that already has the transaction just drops the duplicate.
pub struct Resender {
    rpc: Arc<dyn SubmissionRpc>,
    transaction: SubmittedTransaction,
    interval: Duration,
}

impl Resender {
    pub fn new(
        rpc: Arc<dyn SubmissionRpc>,
        transaction: SubmittedTransaction,
        interval: Duration,
    ) -> Self {
        Self {
            rpc,
            transaction,
            interval,
        }
    }

    /// Run on its own task, inheriting the caller's span
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<RetryState> {
        tokio::spawn(self.run(cancel).in_current_span())
    }

    pub async fn run(self, cancel: CancellationToken) -> RetryState {
        let mut state = RetryState::default();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if cancel.is_cancelled() {
                break;
            }

            state.attempts += 1;
            match self
                .rpc
                .send_transaction(self.transaction.serialized(), SendOptions::blind())
                .await
            {
                Ok(_) => {
                    debug!(attempt = state.attempts, "Resent transaction");
                    crate::metrics::record_broadcast("resend", true);
                }
                Err(e) => {
                    state.failures += 1;
                    warn!(
                        attempt = state.attempts,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Failed to resend transaction"
                    );
                    crate::metrics::record_broadcast("resend", false);
                }
            }
        }

        debug!(
            attempts = state.attempts,
            failures = state.failures,
            "Resender stopped"
        );
        state
    }
}
