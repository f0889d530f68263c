//! Submit-and-confirm orchestration
//!
//! `Broadcasting -> Tracking -> {Confirmed, NotConfirmed, Failed}`. The initial
//! broadcast must be accepted before anything else starts; after that the
//! resender and the confirmation watcher share one cancellation token, which
//! is fired on every exit path before the outcome is returned.

use super::expiry::ExpiryGuard;
use super::resender::{Resender, RetryState};
use super::watcher::{ConfirmationWatcher, WatchResult};
use super::SubmittedTransaction;
use crate::config::SubmissionConfig;
use crate::error::SubmitError;
use crate::rpc::{ConfirmationDetails, SendOptions, SubmissionRpc};

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Terminal result of one submission
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Confirmed(ConfirmationDetails),
    /// Deadline reached with no confirmation; safe to treat as dropped
    NotConfirmed,
    Failed(SubmitError),
}

impl ConfirmationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationOutcome::Confirmed(_) => "confirmed",
            ConfirmationOutcome::NotConfirmed => "not_confirmed",
            ConfirmationOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed(_))
    }
}

/// Owns the submit-and-confirm protocol. Holds no per-submission state, so
/// one coordinator can serve concurrent, fully isolated submissions.
pub struct SubmissionCoordinator {
    rpc: Arc<dyn SubmissionRpc>,
    expiry: ExpiryGuard,
    config: SubmissionConfig,
}

impl SubmissionCoordinator {
    pub fn new(rpc: Arc<dyn SubmissionRpc>, config: SubmissionConfig) -> Self {
        Self {
            rpc,
            expiry: ExpiryGuard::new(config.expiry_margin_blocks),
            config,
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Parse signed wire bytes and submit them. Unsigned or malformed input
    /// fails before any network call.
    pub async fn submit_serialized(
        &self,
        serialized: Vec<u8>,
        blockhash: Option<String>,
        last_valid_block_height: u64,
    ) -> ConfirmationOutcome {
        let transaction = match SubmittedTransaction::from_wire(serialized, last_valid_block_height) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "Rejected transaction before submission");
                crate::metrics::record_submission_outcome("failed");
                return ConfirmationOutcome::Failed(e);
            }
        };
        let transaction = match blockhash {
            Some(blockhash) => transaction.with_blockhash(blockhash),
            None => transaction,
        };

        self.submit_and_confirm(transaction).await
    }

    /// Broadcast `transaction` and track it until it confirms, expires or fails
    pub async fn submit_and_confirm(&self, transaction: SubmittedTransaction) -> ConfirmationOutcome {
        let span = info_span!(
            "submission",
            id = %Uuid::new_v4(),
            signature = %transaction.signature()
        );

        async move {
            let started = Instant::now();
            let _inflight = crate::metrics::InflightGuard::new();

            let outcome = self.run(transaction).await;

            let elapsed = started.elapsed();
            crate::metrics::record_submission_outcome(outcome.label());
            crate::metrics::record_submission_latency(outcome.label(), elapsed.as_secs_f64());
            match &outcome {
                ConfirmationOutcome::Confirmed(details) => info!(
                    slot = details.slot,
                    source = details.source.as_str(),
                    execution_error = ?details.err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Transaction confirmed"
                ),
                ConfirmationOutcome::NotConfirmed => warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Transaction not confirmed before expiry"
                ),
                ConfirmationOutcome::Failed(e) => error!(error = %e, "Transaction submission failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, transaction: SubmittedTransaction) -> ConfirmationOutcome {
        // Broadcasting
        match self
            .rpc
            .send_transaction(transaction.serialized(), SendOptions::blind())
            .await
        {
            Ok(signature) => {
                crate::metrics::record_broadcast("initial", true);
                if signature != *transaction.signature() {
                    warn!(returned = %signature, "Node reported a different signature");
                }
            }
            Err(e) => {
                crate::metrics::record_broadcast("initial", false);
                return ConfirmationOutcome::Failed(SubmitError::Broadcast(e));
            }
        }

        // Tracking
        let deadline = self.expiry.adjusted_deadline(transaction.last_valid_block_height());
        debug!(
            last_valid_block_height = transaction.last_valid_block_height(),
            deadline, "Tracking transaction"
        );

        let cancel = CancellationToken::new();
        // Fires the token even if this future is dropped mid-race
        let _cancel_on_drop = cancel.clone().drop_guard();

        let resender = Resender::new(
            self.rpc.clone(),
            transaction.clone(),
            self.config.resend_interval(),
        )
        .spawn(cancel.clone());

        let watcher = ConfirmationWatcher::new(
            self.rpc.clone(),
            self.config.poll_interval(),
            self.config.commitment,
        );
        let result = watcher.watch(&transaction, deadline, &cancel).await;

        // Resolution: stop the loser and the resend loop, then wait for them
        cancel.cancel();
        let retries = match resender.await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Resender task did not shut down cleanly");
                RetryState::default()
            }
        };
        debug!(
            resend_attempts = retries.attempts,
            resend_failures = retries.failures,
            "Background tasks stopped"
        );

        match result {
            Ok(WatchResult::Confirmed(details)) => ConfirmationOutcome::Confirmed(details),
            Ok(WatchResult::Expired) => ConfirmationOutcome::NotConfirmed,
            Err(e) => ConfirmationOutcome::Failed(SubmitError::Confirmation(e)),
        }
    }
}
