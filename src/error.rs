//! Error types for the txlander relayer

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError as RpcRequestError;
use thiserror::Error;

/// Errors reported by the Solana RPC transport
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Invalid RPC request: {0}")]
    InvalidRequest(String),

    #[error("Signature {signature} has expired: block height exceeded")]
    Expired { signature: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl RpcError {
    /// The chain reported that the blockhash window has passed
    pub fn is_expired(&self) -> bool {
        matches!(self, RpcError::Expired { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_) | RpcError::Timeout { .. }
        )
    }
}

impl From<ClientError> for RpcError {
    fn from(e: ClientError) -> Self {
        match &e.kind {
            ClientErrorKind::RpcError(RpcRequestError::RpcResponseError { code, message, .. }) => {
                RpcError::Server {
                    code: *code,
                    message: message.clone(),
                }
            }
            ClientErrorKind::Reqwest(inner) if inner.is_timeout() => RpcError::Timeout {
                operation: e.request.map_or_else(|| "rpc request".to_string(), |r| r.to_string()),
            },
            ClientErrorKind::SerdeJson(_) | ClientErrorKind::RpcError(RpcRequestError::ParseError(_)) => {
                RpcError::InvalidResponse(e.to_string())
            }
            _ => RpcError::Transport(e.to_string()),
        }
    }
}

/// Result type for RPC calls
pub type RpcResult<T> = Result<T, RpcError>;

/// Failures of a single submit-and-confirm run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("Missing transaction signature, the transaction was not signed by the fee payer")]
    MissingSignature,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Initial broadcast failed: {0}")]
    Broadcast(RpcError),

    #[error("Confirmation tracking failed: {0}")]
    Confirmation(RpcError),

    #[error("Simulation request failed: {0}")]
    SimulationUnavailable(RpcError),

    #[error("Simulation rejected transaction: {err}")]
    SimulationRejected { err: String, logs: Vec<String> },
}

impl SubmitError {
    /// Caller-side problems that no amount of retrying fixes
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SubmitError::MissingSignature
                | SubmitError::InvalidTransaction(_)
                | SubmitError::SimulationRejected { .. }
        )
    }
}

/// Main error type for the relayer service
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for relayer operations
pub type RelayerResult<T> = Result<T, RelayerError>;
