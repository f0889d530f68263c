//! Confirmation detection with two racing strategies
//!
//! A push subscription can die without signalling closure and a poll can lag,
//! so both run at once and the first definitive answer wins:
//! - subscription wait: one `confirm_transaction` call bounded by the deadline
//! - status polling: `get_signature_status` every poll interval

use crate::error::{RpcError, RpcResult};
use crate::rpc::{BlockhashWithExpiry, Commitment, ConfirmationDetails, SubmissionRpc};
use crate::tx::{Signature, SubmittedTransaction};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Definitive answer from the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchResult {
    Confirmed(ConfirmationDetails),
    /// The deadline block height passed without confirmation
    Expired,
}

pub struct ConfirmationWatcher {
    rpc: Arc<dyn SubmissionRpc>,
    poll_interval: Duration,
    commitment: Commitment,
}

impl ConfirmationWatcher {
    pub fn new(rpc: Arc<dyn SubmissionRpc>, poll_interval: Duration, commitment: Commitment) -> Self {
        Self {
            rpc,
            poll_interval,
            commitment,
        }
    }

    /// Race both strategies. The caller owns `cancel` and must fire it once this
    /// returns so the losing strategy's network work stops.
    pub async fn watch(
        &self,
        transaction: &SubmittedTransaction,
        deadline: u64,
        cancel: &CancellationToken,
    ) -> RpcResult<WatchResult> {
        let expiry = BlockhashWithExpiry {
            last_valid_block_height: deadline,
            ..transaction.expiry().clone()
        };
        let signature = transaction.signature();

        tokio::select! {
            result = self.wait_for_confirmation(signature, &expiry, cancel) => result,
            Some(result) = self.poll_status(signature, cancel) => result,
            else => Err(RpcError::Cancelled),
        }
    }

    async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        expiry: &BlockhashWithExpiry,
        cancel: &CancellationToken,
    ) -> RpcResult<WatchResult> {
        match self
            .rpc
            .confirm_transaction(signature, expiry, self.commitment, cancel)
            .await
        {
            Ok(details) => Ok(WatchResult::Confirmed(details)),
            // Expiry is an expected terminal state, not a failure
            Err(e) if e.is_expired() => {
                info!(
                    deadline = expiry.last_valid_block_height,
                    "Block height deadline passed before confirmation"
                );
                Ok(WatchResult::Expired)
            }
            Err(e) => Err(e),
        }
    }

    /// Yields `None` only when cancelled
    async fn poll_status(
        &self,
        signature: &Signature,
        cancel: &CancellationToken,
    ) -> Option<RpcResult<WatchResult>> {
        let mut polls = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if cancel.is_cancelled() {
                return None;
            }

            polls += 1;
            // History search is slow and a fresh signature never needs it
            match self.rpc.get_signature_status(signature, false).await {
                Ok(Some(status)) if status.satisfies(self.commitment) => {
                    debug!(polls, slot = status.slot, "Status poll observed confirmation");
                    return Some(Ok(WatchResult::Confirmed(ConfirmationDetails::from_status(
                        &status,
                    ))));
                }
                Ok(status) => {
                    debug!(polls, status = ?status.and_then(|s| s.confirmation_status), "Not yet confirmed");
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::fake::{ConfirmScript, PollScript, ScriptedRpc};
    use crate::rpc::ConfirmationSource;
    use crate::tx::transaction::signed_transaction;

    fn watcher(rpc: Arc<ScriptedRpc>) -> ConfirmationWatcher {
        ConfirmationWatcher::new(rpc, Duration::from_secs(2), Commitment::Confirmed)
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_wins() {
        let rpc = Arc::new(
            ScriptedRpc::new()
                .confirm(ConfirmScript::ConfirmAfter(Duration::from_millis(500)))
                .poll(PollScript::Unseen),
        );
        let cancel = CancellationToken::new();

        let result = watcher(rpc.clone())
            .watch(&signed_transaction(1, 1_000), 850, &cancel)
            .await
            .unwrap();

        match result {
            WatchResult::Confirmed(details) => {
                assert_eq!(details.source, ConfirmationSource::Subscription)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(rpc.poll_count(), 0);
        assert_eq!(rpc.confirm_deadline(), Some(850));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_wins_when_subscription_stalls() {
        let rpc = Arc::new(
            ScriptedRpc::new()
                .confirm(ConfirmScript::Pending)
                .poll(PollScript::ConfirmedOnPoll(3)),
        );
        let cancel = CancellationToken::new();

        let result = watcher(rpc.clone())
            .watch(&signed_transaction(1, 1_000), 850, &cancel)
            .await
            .unwrap();

        match result {
            WatchResult::Confirmed(details) => {
                assert_eq!(details.source, ConfirmationSource::Polling)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(rpc.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_not_an_error() {
        let rpc = Arc::new(
            ScriptedRpc::new()
                .confirm(ConfirmScript::ExpireAfter(Duration::from_secs(5)))
                .poll(PollScript::Unseen),
        );
        let cancel = CancellationToken::new();

        let result = watcher(rpc)
            .watch(&signed_transaction(1, 1_000), 850, &cancel)
            .await;

        assert_eq!(result, Ok(WatchResult::Expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_fatal() {
        let rpc = Arc::new(
            ScriptedRpc::new()
                .confirm(ConfirmScript::Pending)
                .poll(PollScript::Fail(RpcError::Server {
                    code: -32005,
                    message: "node is behind".into(),
                })),
        );
        let cancel = CancellationToken::new();

        let result = watcher(rpc)
            .watch(&signed_transaction(1, 1_000), 850, &cancel)
            .await;

        assert!(matches!(result, Err(RpcError::Server { code: -32005, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation_ends_race() {
        let rpc = Arc::new(
            ScriptedRpc::new()
                .confirm(ConfirmScript::Pending)
                .poll(PollScript::Unseen),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let result = watcher(rpc.clone())
            .watch(&signed_transaction(1, 1_000), 850, &cancel)
            .await;

        assert_eq!(result, Err(RpcError::Cancelled));
        assert!(rpc.confirm_was_cancelled());
    }
}
