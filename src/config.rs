use crate::domain::{parse_u256, WAD};
use alloy_primitives::U256;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Reserve factor applied when a router has none recorded (10%).
pub const DEFAULT_RESERVE_FACTOR: U256 = U256::from_limbs([100_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub default_reserve_factor: U256,
    pub max_in_flight: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let rpc_url = env_map
            .get("RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RPC_URL".to_string()))?;

        let rpc_timeout_ms = env_map
            .get("RPC_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("10000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "RPC_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;
        if rpc_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RPC_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let default_reserve_factor = match env_map.get("DEFAULT_RESERVE_FACTOR") {
            Some(raw) => {
                let value = parse_u256(raw).map_err(|_| {
                    ConfigError::InvalidValue(
                        "DEFAULT_RESERVE_FACTOR".to_string(),
                        "must be a WAD-scaled integer".to_string(),
                    )
                })?;
                if value > WAD {
                    return Err(ConfigError::InvalidValue(
                        "DEFAULT_RESERVE_FACTOR".to_string(),
                        format!("must not exceed {}, got {}", WAD, value),
                    ));
                }
                value
            }
            None => DEFAULT_RESERVE_FACTOR,
        };

        let max_in_flight = env_map
            .get("MAX_IN_FLIGHT")
            .map(|s| s.as_str())
            .unwrap_or("8")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_IN_FLIGHT".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            database_path,
            rpc_url,
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
            default_reserve_factor,
            max_in_flight,
        })
    }
}
