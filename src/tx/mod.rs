//! Transaction submission module: redundant broadcast and confirmation tracking

mod coordinator;
mod expiry;
pub mod preflight;
mod resender;
pub(crate) mod transaction;
mod watcher;

pub use coordinator::{ConfirmationOutcome, SubmissionCoordinator};
pub use expiry::{ExpiryGuard, DEFAULT_EXPIRY_MARGIN_BLOCKS};
pub use resender::{Resender, RetryState};
pub use transaction::{Signature, SubmittedTransaction};
pub use watcher::{ConfirmationWatcher, WatchResult};
