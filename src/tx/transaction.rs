//! Signed transaction payloads as handed to the submission protocol

use crate::error::SubmitError;
use crate::rpc::BlockhashWithExpiry;

use serde::Deserialize;
use solana_sdk::short_vec;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;

pub use solana_sdk::signature::Signature;

/// Leading signature section of a wire transaction
#[derive(Deserialize)]
struct SignatureSection {
    #[serde(with = "short_vec")]
    signatures: Vec<Signature>,
}

/// A signed, serialized transaction and the expiry window it was built against.
///
/// Immutable once built. Clones share the serialized bytes, so the resend loop
/// and the coordinator can hold it at the same time.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    signature: Signature,
    serialized: Arc<[u8]>,
    expiry: BlockhashWithExpiry,
}

impl SubmittedTransaction {
    /// Parse signed wire bytes. The blockhash is read from the message.
    ///
    /// The signature section is checked before the message is decoded, so an
    /// unsigned payload reports `MissingSignature` even when the rest is garbage.
    pub fn from_wire(
        serialized: Vec<u8>,
        last_valid_block_height: u64,
    ) -> Result<Self, SubmitError> {
        let section: SignatureSection = bincode::deserialize(&serialized).map_err(malformed)?;
        // Unsigned slots are zero-filled
        let signature = section
            .signatures
            .first()
            .copied()
            .filter(|sig| *sig != Signature::default())
            .ok_or(SubmitError::MissingSignature)?;

        let transaction: VersionedTransaction =
            bincode::deserialize(&serialized).map_err(malformed)?;

        Ok(Self {
            signature,
            serialized: serialized.into(),
            expiry: BlockhashWithExpiry {
                blockhash: transaction.message.recent_blockhash().to_string(),
                last_valid_block_height,
            },
        })
    }

    /// Override the blockhash, e.g. with the one the quote service reported
    pub fn with_blockhash(mut self, blockhash: impl Into<String>) -> Self {
        self.expiry.blockhash = blockhash.into();
        self
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }

    pub fn blockhash(&self) -> &str {
        &self.expiry.blockhash
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.expiry.last_valid_block_height
    }

    pub fn expiry(&self) -> &BlockhashWithExpiry {
        &self.expiry
    }
}

fn malformed(e: bincode::Error) -> SubmitError {
    SubmitError::InvalidTransaction(e.to_string())
}

/// Wire bytes for tests: `signatures` over an instruction-free legacy or v0 message
#[cfg(test)]
pub(crate) fn wire_bytes(signatures: &[[u8; 64]], blockhash: [u8; 32], versioned: bool) -> Vec<u8> {
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{v0, Message, MessageHeader, VersionedMessage};
    use solana_sdk::pubkey::Pubkey;

    let header = MessageHeader {
        num_required_signatures: 1,
        num_readonly_signed_accounts: 0,
        num_readonly_unsigned_accounts: 1,
    };
    let account_keys = vec![Pubkey::new_from_array([7u8; 32]), Pubkey::new_from_array([9u8; 32])];
    let recent_blockhash = Hash::new_from_array(blockhash);

    let message = if versioned {
        VersionedMessage::V0(v0::Message {
            header,
            account_keys,
            recent_blockhash,
            instructions: vec![],
            address_table_lookups: vec![],
        })
    } else {
        VersionedMessage::Legacy(Message {
            header,
            account_keys,
            recent_blockhash,
            instructions: vec![],
        })
    };

    let transaction = VersionedTransaction {
        signatures: signatures.iter().map(|sig| Signature::from(*sig)).collect(),
        message,
    };
    bincode::serialize(&transaction).unwrap()
}

/// A signed test transaction whose signature bytes are all `fill`
#[cfg(test)]
pub(crate) fn signed_transaction(fill: u8, last_valid_block_height: u64) -> SubmittedTransaction {
    let bytes = wire_bytes(&[[fill; 64]], [3u8; 32], false);
    SubmittedTransaction::from_wire(bytes, last_valid_block_height).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;

    #[test]
    fn test_parse_legacy_transaction() {
        let bytes = wire_bytes(&[[5u8; 64]], [3u8; 32], false);
        let tx = SubmittedTransaction::from_wire(bytes.clone(), 1_000).unwrap();

        assert_eq!(*tx.signature(), Signature::from([5u8; 64]));
        assert_eq!(tx.serialized(), bytes.as_slice());
        assert_eq!(tx.blockhash(), Hash::new_from_array([3u8; 32]).to_string());
        assert_eq!(tx.last_valid_block_height(), 1_000);
    }

    #[test]
    fn test_parse_versioned_transaction() {
        let bytes = wire_bytes(&[[5u8; 64], [6u8; 64]], [4u8; 32], true);
        let tx = SubmittedTransaction::from_wire(bytes, 10).unwrap();

        assert_eq!(*tx.signature(), Signature::from([5u8; 64]));
        assert_eq!(tx.blockhash(), Hash::new_from_array([4u8; 32]).to_string());
    }

    #[test]
    fn test_unsigned_transaction_is_rejected() {
        let zero_filled = wire_bytes(&[[0u8; 64]], [3u8; 32], true);
        assert_eq!(
            SubmittedTransaction::from_wire(zero_filled, 10).unwrap_err(),
            SubmitError::MissingSignature
        );

        let no_slots = wire_bytes(&[], [3u8; 32], false);
        assert_eq!(
            SubmittedTransaction::from_wire(no_slots, 10).unwrap_err(),
            SubmitError::MissingSignature
        );
    }

    #[test]
    fn test_unsigned_check_precedes_message_decoding() {
        let mut bytes = wire_bytes(&[[0u8; 64]], [3u8; 32], false);
        bytes.truncate(70);

        assert_eq!(
            SubmittedTransaction::from_wire(bytes, 10).unwrap_err(),
            SubmitError::MissingSignature
        );
    }

    #[test]
    fn test_truncated_transaction() {
        let mut bytes = wire_bytes(&[[5u8; 64]], [3u8; 32], false);
        bytes.truncate(100);
        assert!(matches!(
            SubmittedTransaction::from_wire(bytes, 10),
            Err(SubmitError::InvalidTransaction(_))
        ));

        assert!(matches!(
            SubmittedTransaction::from_wire(Vec::new(), 10),
            Err(SubmitError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_blockhash_override() {
        let tx = signed_transaction(1, 500).with_blockhash("quoted");
        assert_eq!(tx.blockhash(), "quoted");
        assert_eq!(tx.expiry().last_valid_block_height, 500);
    }
}
