//! Safety-adjusted expiry deadline for in-flight transactions

/// Blocks subtracted from the chain-reported last valid height. Latency means
/// the real expiry can pass before we observe it, so tracking gives up early.
pub const DEFAULT_EXPIRY_MARGIN_BLOCKS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryGuard {
    margin_blocks: u64,
}

impl ExpiryGuard {
    pub fn new(margin_blocks: u64) -> Self {
        Self { margin_blocks }
    }

    /// Block height after which confirmation tracking stops
    pub fn adjusted_deadline(&self, last_valid_block_height: u64) -> u64 {
        last_valid_block_height.saturating_sub(self.margin_blocks)
    }
}

impl Default for ExpiryGuard {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_MARGIN_BLOCKS)
    }
}
