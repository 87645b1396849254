//! Mock contract reader for testing without network calls.

use super::{ContractReader, ReadError, RouterView};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock reader returning predefined router totals.
///
/// Values can be changed between events to simulate the chain moving on.
/// Unset views fail with [`ReadError::Call`].
#[derive(Debug, Clone, Default)]
pub struct MockContractReader {
    values: Arc<Mutex<HashMap<(Address, RouterView), Result<U256, ReadError>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockContractReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both totals of a router.
    pub fn with_totals(self, router: Address, supply: U256, borrow: U256) -> Self {
        self.set_totals(router, supply, borrow);
        self
    }

    pub fn set_totals(&self, router: Address, supply: U256, borrow: U256) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert((router, RouterView::TotalSupplyAssets), Ok(supply));
        values.insert((router, RouterView::TotalBorrowAssets), Ok(borrow));
    }

    /// Make one view of a router fail until it is set again.
    pub fn fail(&self, router: Address, view: RouterView, message: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(
            (router, view),
            Err(ReadError::Call {
                contract: router,
                view,
                message: message.to_string(),
            }),
        );
    }

    /// Number of reads served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractReader for MockContractReader {
    async fn read(&self, contract: Address, view: RouterView) -> Result<U256, ReadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values
            .get(&(contract, view))
            .cloned()
            .unwrap_or_else(|| {
                Err(ReadError::Call {
                    contract,
                    view,
                    message: "no mock value".to_string(),
                })
            })
    }
}
