//! Live contract state: the reader abstraction used by the snapshot builder.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod rpc;

pub use mock::MockContractReader;
pub use rpc::AlloyContractReader;

/// Argument-less read-only views of a lending-pool router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterView {
    TotalSupplyAssets,
    TotalBorrowAssets,
}

impl RouterView {
    pub fn function_name(&self) -> &'static str {
        match self {
            RouterView::TotalSupplyAssets => "totalSupplyAssets",
            RouterView::TotalBorrowAssets => "totalBorrowAssets",
        }
    }
}

impl fmt::Display for RouterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Reads single numeric values from deployed contracts.
///
/// Implementations must bound every call in time; a hung call is reported as
/// [`ReadError::Timeout`], never awaited forever.
#[async_trait]
pub trait ContractReader: Send + Sync + fmt::Debug {
    async fn read(&self, contract: Address, view: RouterView) -> Result<U256, ReadError>;
}

/// Failure of a live contract read. Always transient from the indexer's
/// point of view: the next event retries with fresh state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("invalid RPC endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("call {view} on {contract} failed: {message}")]
    Call {
        contract: Address,
        view: RouterView,
        message: String,
    },
    #[error("call {view} on {contract} timed out after {after_ms}ms")]
    Timeout {
        contract: Address,
        view: RouterView,
        after_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_display() {
        let err = ReadError::Timeout {
            contract: Address::ZERO,
            view: RouterView::TotalBorrowAssets,
            after_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "call totalBorrowAssets on 0x0000000000000000000000000000000000000000 timed out after 250ms"
        );

        let err = ReadError::InvalidEndpoint("not a url".to_string());
        assert_eq!(err.to_string(), "invalid RPC endpoint: not a url");
    }
}
