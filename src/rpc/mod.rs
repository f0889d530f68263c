//! RPC module - the network capabilities the submission protocol depends on
//!
//! This module provides:
//! - The `SubmissionRpc` trait: broadcast, confirmation wait, status poll, simulation
//! - Types shared by the protocol and the network client
//! - `RpcClient`, backed by solana-client's nonblocking RPC and pubsub clients

pub mod client;

#[cfg(test)]
pub(crate) mod fake;

pub use client::RpcClient;

use crate::error::RpcResult;
use crate::tx::Signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_transaction_status::TransactionConfirmationStatus;
use tokio_util::sync::CancellationToken;

/// Durability level requested when asking about a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl From<Commitment> for CommitmentConfig {
    fn from(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl From<TransactionConfirmationStatus> for Commitment {
    fn from(status: TransactionConfirmationStatus) -> Self {
        match status {
            TransactionConfirmationStatus::Processed => Commitment::Processed,
            TransactionConfirmationStatus::Confirmed => Commitment::Confirmed,
            TransactionConfirmationStatus::Finalized => Commitment::Finalized,
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `sendTransaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
}

impl SendOptions {
    /// Broadcast without node-side simulation
    pub fn blind() -> Self {
        Self {
            skip_preflight: true,
        }
    }
}

/// Options for `simulateTransaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulateOptions {
    pub replace_recent_blockhash: bool,
    pub commitment: Commitment,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            replace_recent_blockhash: true,
            commitment: Commitment::Processed,
        }
    }
}

/// Blockhash anchoring a transaction plus the last block height it may land in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockhashWithExpiry {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// Entry of `getSignatureStatuses`
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the status has reached at least `commitment`
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        self.confirmation_status
            .map(|status| status >= commitment)
            .unwrap_or(false)
    }
}

/// Which observation path saw the confirmation first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource {
    Subscription,
    Polling,
}

impl ConfirmationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationSource::Subscription => "subscription",
            ConfirmationSource::Polling => "polling",
        }
    }
}

/// A confirmed landing. `err` is the on-chain execution error, which is a
/// separate concern from whether the submission itself succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationDetails {
    pub slot: u64,
    pub err: Option<Value>,
    pub source: ConfirmationSource,
}

impl ConfirmationDetails {
    pub fn from_status(status: &SignatureStatus) -> Self {
        Self {
            slot: status.slot,
            err: status.err.clone(),
            source: ConfirmationSource::Polling,
        }
    }
}

/// Result of `simulateTransaction`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationResult {
    pub err: Option<Value>,
    pub logs: Option<Vec<String>>,
    pub units_consumed: Option<u64>,
}

/// Network capabilities used by the submission protocol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionRpc: Send + Sync {
    /// Broadcast serialized transaction bytes
    async fn send_transaction(&self, serialized: &[u8], options: SendOptions)
        -> RpcResult<Signature>;

    /// Wait until `signature` reaches `commitment`. Fails with
    /// `RpcError::Expired` once the chain passes `expiry.last_valid_block_height`
    /// and with `RpcError::Cancelled` when `cancel` fires first.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        expiry: &BlockhashWithExpiry,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> RpcResult<ConfirmationDetails>;

    /// Single status lookup; `None` when the node has not seen the signature
    async fn get_signature_status(
        &self,
        signature: &Signature,
        search_transaction_history: bool,
    ) -> RpcResult<Option<SignatureStatus>>;

    async fn simulate_transaction(
        &self,
        serialized: &[u8],
        options: SimulateOptions,
    ) -> RpcResult<SimulationResult>;

    async fn get_block_height(&self, commitment: Commitment) -> RpcResult<u64>;
}
