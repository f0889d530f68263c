//! Pre-submission simulation screen
//!
//! Broadcasts skip node-side preflight, so obviously failing transactions are
//! caught here instead, before they cost a signature slot on chain.

use crate::error::SubmitError;
use crate::rpc::{SimulateOptions, SimulationResult, SubmissionRpc};
use crate::tx::SubmittedTransaction;

use tracing::{debug, warn};

/// Simulate against the latest blockhash at `processed` commitment and reject
/// the transaction if the simulation reports an error.
pub async fn screen(
    rpc: &dyn SubmissionRpc,
    transaction: &SubmittedTransaction,
) -> Result<SimulationResult, SubmitError> {
    let result = rpc
        .simulate_transaction(transaction.serialized(), SimulateOptions::default())
        .await
        .map_err(SubmitError::SimulationUnavailable)?;

    if let Some(err) = &result.err {
        let logs = result.logs.clone().unwrap_or_default();
        warn!(
            signature = %transaction.signature(),
            error = %err,
            log_lines = logs.len(),
            "Simulation rejected transaction"
        );
        crate::metrics::record_simulation_rejected();
        return Err(SubmitError::SimulationRejected {
            err: err.to_string(),
            logs,
        });
    }

    debug!(
        signature = %transaction.signature(),
        units_consumed = ?result.units_consumed,
        "Simulation passed"
    );
    Ok(result)
}
