//! Scripted `SubmissionRpc` for timing-sensitive tests

use super::*;
use crate::error::{RpcError, RpcResult};
use solana_sdk::transaction::VersionedTransaction;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How `confirm_transaction` behaves
pub(crate) enum ConfirmScript {
    /// Never resolves on its own; ends with `Cancelled` when the token fires
    Pending,
    ConfirmAfter(Duration),
    ExpireAfter(Duration),
    FailAfter(Duration, RpcError),
}

/// How `get_signature_status` behaves
pub(crate) enum PollScript {
    Unseen,
    /// Reports `confirmed` on the n-th call (1-based), `processed` before it
    ConfirmedOnPoll(usize),
    Fail(RpcError),
}

pub(crate) struct ScriptedRpc {
    accepted_sends: usize,
    send_error: Option<RpcError>,
    confirm: ConfirmScript,
    poll: PollScript,
    simulation: RpcResult<SimulationResult>,
    block_height: u64,
    sends: Mutex<Vec<Instant>>,
    polls: Mutex<Vec<Instant>>,
    simulations: Mutex<Vec<SimulateOptions>>,
    confirm_args: Mutex<Option<BlockhashWithExpiry>>,
    confirm_cancelled: AtomicBool,
}

impl ScriptedRpc {
    pub(crate) fn new() -> Self {
        Self {
            accepted_sends: usize::MAX,
            send_error: None,
            confirm: ConfirmScript::Pending,
            poll: PollScript::Unseen,
            simulation: Ok(SimulationResult::default()),
            block_height: 1_000,
            sends: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
            simulations: Mutex::new(Vec::new()),
            confirm_args: Mutex::new(None),
            confirm_cancelled: AtomicBool::new(false),
        }
    }

    /// Every broadcast fails
    pub(crate) fn failing_sends(mut self, error: RpcError) -> Self {
        self.accepted_sends = 0;
        self.send_error = Some(error);
        self
    }

    /// The initial broadcast is accepted, every later one fails
    pub(crate) fn failing_resends(mut self, error: RpcError) -> Self {
        self.accepted_sends = 1;
        self.send_error = Some(error);
        self
    }

    pub(crate) fn confirm(mut self, script: ConfirmScript) -> Self {
        self.confirm = script;
        self
    }

    pub(crate) fn poll(mut self, script: PollScript) -> Self {
        self.poll = script;
        self
    }

    pub(crate) fn simulation(mut self, result: RpcResult<SimulationResult>) -> Self {
        self.simulation = result;
        self
    }

    pub(crate) fn send_times(&self) -> Vec<Instant> {
        self.sends.lock().unwrap().clone()
    }

    pub(crate) fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub(crate) fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub(crate) fn simulations(&self) -> Vec<SimulateOptions> {
        self.simulations.lock().unwrap().clone()
    }

    pub(crate) fn confirm_deadline(&self) -> Option<u64> {
        self.confirm_args
            .lock()
            .unwrap()
            .as_ref()
            .map(|e| e.last_valid_block_height)
    }

    pub(crate) fn confirm_blockhash(&self) -> Option<String> {
        self.confirm_args
            .lock()
            .unwrap()
            .as_ref()
            .map(|e| e.blockhash.clone())
    }

    pub(crate) fn confirm_was_cancelled(&self) -> bool {
        self.confirm_cancelled.load(Ordering::SeqCst)
    }

    async fn after(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
        result: RpcResult<ConfirmationDetails>,
    ) -> RpcResult<ConfirmationDetails> {
        tokio::select! {
            _ = cancel.cancelled() => {
                self.confirm_cancelled.store(true, Ordering::SeqCst);
                Err(RpcError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => result,
        }
    }
}

#[async_trait]
impl SubmissionRpc for ScriptedRpc {
    async fn send_transaction(
        &self,
        serialized: &[u8],
        options: SendOptions,
    ) -> RpcResult<Signature> {
        assert!(options.skip_preflight, "broadcasts must skip preflight");
        let count = {
            let mut sends = self.sends.lock().unwrap();
            sends.push(Instant::now());
            sends.len()
        };

        if count > self.accepted_sends {
            if let Some(error) = &self.send_error {
                return Err(error.clone());
            }
        }

        let transaction: VersionedTransaction = bincode::deserialize(serialized).unwrap();
        Ok(transaction.signatures[0])
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        expiry: &BlockhashWithExpiry,
        _commitment: Commitment,
        cancel: &CancellationToken,
    ) -> RpcResult<ConfirmationDetails> {
        *self.confirm_args.lock().unwrap() = Some(expiry.clone());

        let confirmed = ConfirmationDetails {
            slot: 4_242,
            err: None,
            source: ConfirmationSource::Subscription,
        };
        match &self.confirm {
            ConfirmScript::Pending => {
                cancel.cancelled().await;
                self.confirm_cancelled.store(true, Ordering::SeqCst);
                Err(RpcError::Cancelled)
            }
            ConfirmScript::ConfirmAfter(delay) => self.after(*delay, cancel, Ok(confirmed)).await,
            ConfirmScript::ExpireAfter(delay) => {
                let expired = Err(RpcError::Expired {
                    signature: signature.to_string(),
                });
                self.after(*delay, cancel, expired).await
            }
            ConfirmScript::FailAfter(delay, error) => {
                self.after(*delay, cancel, Err(error.clone())).await
            }
        }
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
        search_transaction_history: bool,
    ) -> RpcResult<Option<SignatureStatus>> {
        assert!(!search_transaction_history, "polls must not search history");
        let count = {
            let mut polls = self.polls.lock().unwrap();
            polls.push(Instant::now());
            polls.len()
        };

        match &self.poll {
            PollScript::Unseen => Ok(None),
            PollScript::ConfirmedOnPoll(n) => {
                let status = if count >= *n {
                    Commitment::Confirmed
                } else {
                    Commitment::Processed
                };
                Ok(Some(SignatureStatus {
                    slot: 4_240 + count as u64,
                    confirmations: Some(0),
                    err: None,
                    confirmation_status: Some(status),
                }))
            }
            PollScript::Fail(error) => Err(error.clone()),
        }
    }

    async fn simulate_transaction(
        &self,
        _serialized: &[u8],
        options: SimulateOptions,
    ) -> RpcResult<SimulationResult> {
        self.simulations.lock().unwrap().push(options);
        self.simulation.clone()
    }

    async fn get_block_height(&self, _commitment: Commitment) -> RpcResult<u64> {
        Ok(self.block_height)
    }
}
