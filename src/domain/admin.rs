//! Factory, interest-rate-model and emitter configuration records.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Singleton id of the factory configuration row.
pub const FACTORY_ID: &str = "factory";
/// Singleton id of the interest-rate-model configuration row.
pub const IRM_ID: &str = "irm";

/// Address-valued settings of the pool factory, one setter event each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryAddressField {
    Protocol,
    IsHealthy,
    LendingPoolDeployer,
    PositionDeployer,
    LendingPoolRouterDeployer,
    TokenDataStream,
    InterestRateModel,
    ProxyDeployer,
    SharesTokenDeployer,
    WrappedNative,
    DexRouter,
    Emitter,
}

impl FactoryAddressField {
    pub const ALL: [FactoryAddressField; 12] = [
        FactoryAddressField::Protocol,
        FactoryAddressField::IsHealthy,
        FactoryAddressField::LendingPoolDeployer,
        FactoryAddressField::PositionDeployer,
        FactoryAddressField::LendingPoolRouterDeployer,
        FactoryAddressField::TokenDataStream,
        FactoryAddressField::InterestRateModel,
        FactoryAddressField::ProxyDeployer,
        FactoryAddressField::SharesTokenDeployer,
        FactoryAddressField::WrappedNative,
        FactoryAddressField::DexRouter,
        FactoryAddressField::Emitter,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            FactoryAddressField::Protocol => "protocol",
            FactoryAddressField::IsHealthy => "is_healthy",
            FactoryAddressField::LendingPoolDeployer => "lending_pool_deployer",
            FactoryAddressField::PositionDeployer => "position_deployer",
            FactoryAddressField::LendingPoolRouterDeployer => "lending_pool_router_deployer",
            FactoryAddressField::TokenDataStream => "token_data_stream",
            FactoryAddressField::InterestRateModel => "interest_rate_model",
            FactoryAddressField::ProxyDeployer => "proxy_deployer",
            FactoryAddressField::SharesTokenDeployer => "shares_token_deployer",
            FactoryAddressField::WrappedNative => "wrapped_native",
            FactoryAddressField::DexRouter => "dex_router",
            FactoryAddressField::Emitter => "emitter",
        }
    }
}

/// Factory configuration singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactoryConfig {
    pub owner: Option<Address>,
    pub paused: bool,
    pub addresses: Vec<(FactoryAddressField, Address)>,
}

impl FactoryConfig {
    pub fn address(&self, field: FactoryAddressField) -> Option<Address> {
        self.addresses
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, addr)| *addr)
    }
}

/// Interest-rate-model configuration singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrmConfig {
    pub owner: Option<Address>,
    pub scaled_percentage: Option<U256>,
}
