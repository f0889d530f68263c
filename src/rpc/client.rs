//! `SubmissionRpc` over solana-client's nonblocking RPC and pubsub clients

use super::{
    BlockhashWithExpiry, Commitment, ConfirmationDetails, ConfirmationSource, SendOptions,
    SignatureStatus, SimulateOptions, SimulationResult, SubmissionRpc,
};
use crate::config::RpcConfig;
use crate::error::{RpcError, RpcResult};
use crate::tx::Signature;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::{
    RpcSendTransactionConfig, RpcSignatureSubscribeConfig, RpcSimulateTransactionConfig,
};
use solana_client::rpc_response::RpcSignatureResult;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::transaction::{TransactionError, VersionedTransaction};
use solana_transaction_status::UiTransactionEncoding;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Block height re-check cadence while waiting on a subscription
const BLOCK_HEIGHT_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Client for a single Solana endpoint
pub struct RpcClient {
    client: SolanaRpcClient,
    ws_url: String,
    height_check_interval: Duration,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> RpcResult<Self> {
        let ws_url = match &config.ws_url {
            Some(url) => url.clone(),
            None => websocket_url(&config.http_url)?,
        };
        let client = SolanaRpcClient::new_with_timeout_and_commitment(
            config.http_url.clone(),
            config.request_timeout(),
            CommitmentConfig::confirmed(),
        );

        info!(http_url = %config.http_url, ws_url = %ws_url, "RPC client initialized");

        Ok(Self {
            client,
            ws_url,
            height_check_interval: BLOCK_HEIGHT_CHECK_INTERVAL,
        })
    }

    pub fn with_height_check_interval(mut self, interval: Duration) -> Self {
        self.height_check_interval = interval;
        self
    }

    /// Resolves on the first processed-signature notification. A dead or
    /// failed socket never resolves: the block height check and status
    /// polling still decide.
    async fn subscribe_signature(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> RpcResult<ConfirmationDetails> {
        match self.signature_notification(signature, commitment).await {
            Ok(Some(details)) => Ok(details),
            Ok(None) => {
                warn!("Signature subscription closed without a notification");
                futures::future::pending().await
            }
            Err(e) => {
                warn!(error = %e, "Signature subscription unavailable");
                futures::future::pending().await
            }
        }
    }

    async fn signature_notification(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> RpcResult<Option<ConfirmationDetails>> {
        let pubsub = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let config = RpcSignatureSubscribeConfig {
            commitment: Some(commitment.into()),
            enable_received_notification: Some(false),
        };
        let (mut notifications, unsubscribe) = pubsub
            .signature_subscribe(signature, Some(config))
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let mut details = None;
        while let Some(update) = notifications.next().await {
            match update.value {
                RpcSignatureResult::ProcessedSignature(result) => {
                    details = Some(ConfirmationDetails {
                        slot: update.context.slot,
                        err: result.err.as_ref().map(execution_error),
                        source: ConfirmationSource::Subscription,
                    });
                    break;
                }
                RpcSignatureResult::ReceivedSignature(_) => debug!("Signature received by node"),
            }
        }

        drop(notifications);
        unsubscribe().await;
        if let Err(e) = pubsub.shutdown().await {
            debug!(error = %e, "Pubsub client did not shut down cleanly");
        }
        Ok(details)
    }

    /// Fails with `Expired` once the block height exceeds `deadline`
    async fn expire_after(
        &self,
        signature: &Signature,
        deadline: u64,
        commitment: Commitment,
    ) -> RpcResult<ConfirmationDetails> {
        loop {
            match self.get_block_height(commitment).await {
                Ok(height) if height > deadline => {
                    return Err(RpcError::Expired {
                        signature: signature.to_string(),
                    });
                }
                Ok(height) => debug!(height, deadline, "Within expiry window"),
                Err(e) => warn!(error = %e, "Block height check failed"),
            }
            tokio::time::sleep(self.height_check_interval).await;
        }
    }
}

#[async_trait]
impl SubmissionRpc for RpcClient {
    async fn send_transaction(
        &self,
        serialized: &[u8],
        options: SendOptions,
    ) -> RpcResult<Signature> {
        let transaction = decode(serialized)?;
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            encoding: Some(UiTransactionEncoding::Base64),
            ..RpcSendTransactionConfig::default()
        };

        Ok(self
            .client
            .send_transaction_with_config(&transaction, config)
            .await?)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        expiry: &BlockhashWithExpiry,
        commitment: Commitment,
        cancel: &CancellationToken,
    ) -> RpcResult<ConfirmationDetails> {
        debug!(
            blockhash = %expiry.blockhash,
            deadline = expiry.last_valid_block_height,
            "Waiting for signature notification"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(RpcError::Cancelled),
            result = self.subscribe_signature(signature, commitment) => result,
            result = self.expire_after(signature, expiry.last_valid_block_height, commitment) => result,
        }
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
        search_transaction_history: bool,
    ) -> RpcResult<Option<SignatureStatus>> {
        let response = if search_transaction_history {
            self.client
                .get_signature_statuses_with_history(&[*signature])
                .await?
        } else {
            self.client.get_signature_statuses(&[*signature]).await?
        };

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                slot: status.slot,
                confirmations: status.confirmations.map(|c| c as u64),
                err: status.err.as_ref().map(execution_error),
                confirmation_status: status.confirmation_status.map(Commitment::from),
            }))
    }

    async fn simulate_transaction(
        &self,
        serialized: &[u8],
        options: SimulateOptions,
    ) -> RpcResult<SimulationResult> {
        let transaction = decode(serialized)?;
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: options.replace_recent_blockhash,
            commitment: Some(options.commitment.into()),
            encoding: Some(UiTransactionEncoding::Base64),
            ..RpcSimulateTransactionConfig::default()
        };

        let result = self
            .client
            .simulate_transaction_with_config(&transaction, config)
            .await?
            .value;

        Ok(SimulationResult {
            err: result.err.as_ref().map(execution_error),
            logs: result.logs,
            units_consumed: result.units_consumed,
        })
    }

    async fn get_block_height(&self, commitment: Commitment) -> RpcResult<u64> {
        Ok(self
            .client
            .get_block_height_with_commitment(commitment.into())
            .await?)
    }
}

fn decode(serialized: &[u8]) -> RpcResult<VersionedTransaction> {
    bincode::deserialize(serialized).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

/// On-chain execution error in its JSON-RPC shape
fn execution_error(err: &TransactionError) -> Value {
    serde_json::to_value(err).unwrap_or_else(|_| Value::String(err.to_string()))
}

/// ws(s) endpoint next to an http(s) one; an explicit port moves up by one
fn websocket_url(http_url: &str) -> RpcResult<String> {
    let mut url = url::Url::parse(http_url)
        .map_err(|e| RpcError::Transport(format!("invalid RPC URL '{}': {}", http_url, e)))?;

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(RpcError::Transport(format!(
                "unsupported RPC URL scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RpcError::Transport("cannot derive websocket URL".to_string()))?;

    if let Some(port) = url.port() {
        url.set_port(Some(port.saturating_add(1)))
            .map_err(|_| RpcError::Transport("cannot derive websocket URL".to_string()))?;
    }

    Ok(url.to_string())
}
