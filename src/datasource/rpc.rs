//! JSON-RPC backed contract reader.

use super::{ContractReader, ReadError, RouterView};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use alloy::sol;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

sol! {
    #[sol(rpc)]
    interface ILendingPoolRouter {
        function totalSupplyAssets() external view returns (uint256);
        function totalBorrowAssets() external view returns (uint256);
    }
}

/// Reads router totals over HTTP JSON-RPC, one `eth_call` per view.
#[derive(Clone)]
pub struct AlloyContractReader {
    provider: DynProvider,
    timeout: Duration,
}

impl AlloyContractReader {
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self, ReadError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|_| ReadError::InvalidEndpoint(rpc_url.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider, timeout })
    }
}

impl fmt::Debug for AlloyContractReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyContractReader")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContractReader for AlloyContractReader {
    async fn read(&self, contract: Address, view: RouterView) -> Result<U256, ReadError> {
        let router = ILendingPoolRouter::new(contract, self.provider.clone());
        let call = async {
            match view {
                RouterView::TotalSupplyAssets => router.totalSupplyAssets().call().await,
                RouterView::TotalBorrowAssets => router.totalBorrowAssets().call().await,
            }
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => {
                tracing::debug!("{} on {} = {}", view, contract, value);
                Ok(value)
            }
            Ok(Err(e)) => Err(ReadError::Call {
                contract,
                view,
                message: e.to_string(),
            }),
            Err(_) => Err(ReadError::Timeout {
                contract,
                view,
                after_ms: millis(self.timeout),
            }),
        }
    }
}

/// Whole milliseconds of `d`, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_connect_rejects_malformed_url() {
        let err = AlloyContractReader::connect("not a url", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, ReadError::InvalidEndpoint("not a url".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_read_error() {
        let reader =
            AlloyContractReader::connect("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let result = reader
            .read(Address::repeat_byte(0x42), RouterView::TotalSupplyAssets)
            .await;
        assert!(matches!(
            result,
            Err(ReadError::Call { .. }) | Err(ReadError::Timeout { .. })
        ));
    }
}
