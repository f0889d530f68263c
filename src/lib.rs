//! txlander - reliable Solana transaction submission
//!
//! The core is [`tx::SubmissionCoordinator::submit_and_confirm`]: one initial
//! broadcast, then a resend loop racing a subscription wait and a status poll
//! under a shared cancellation token, bounded by a block-height deadline.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rpc;
pub mod tx;
