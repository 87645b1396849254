//! Domain primitives: event identity and storage keys for chain values.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a log in the chain: `(block number, log index)`.
///
/// Orders events the way the ingestion feed delivers them and doubles as the
/// primary key of every append-only record (`"{block}_{logIndex}"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventId {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        EventId {
            block_number,
            log_index,
        }
    }

    /// Storage key for append-only event records.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.block_number, self.log_index)
    }
}

/// Lowercase `0x`-prefixed hex, the canonical storage form for addresses.
pub fn address_key(address: &Address) -> String {
    format!("{address:#x}")
}

/// Lowercase `0x`-prefixed hex for transaction hashes.
pub fn hash_key(hash: &B256) -> String {
    format!("{hash:#x}")
}

/// Composite key of a user's running totals in one pool.
pub fn user_pool_key(user: &Address, pool: &Address) -> String {
    format!("{}_{}", address_key(user), address_key(pool))
}
