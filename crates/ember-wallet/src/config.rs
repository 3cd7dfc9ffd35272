//! Wallet configuration.
//!
//! [`WalletConfig`] carries the network, explorer endpoint, and the default
//! fee and gas parameters used when a call does not override them. It can
//! be built programmatically, deserialized, or read from `EMBER_*`
//! environment variables.

use std::time::Duration;

use ember_core::address::Network;
use ember_core::constants::{
    DEFAULT_CALL_GAS_LIMIT, DEFAULT_CREATE_GAS_LIMIT, DEFAULT_FEE_ESTIMATE_BLOCKS,
    DEFAULT_FEE_RATE_PER_BYTE, DEFAULT_GAS_PRICE,
};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Configuration for a wallet instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    /// Explorer API base URL. `None` uses the network default.
    pub explorer_url: Option<String>,
    /// Fee rate in satoshis per byte that bypasses estimation entirely.
    pub fee_rate: Option<u64>,
    /// Rate used when the explorer has no estimate.
    pub fallback_fee_rate: u64,
    /// Confirmation target passed to fee estimation.
    pub fee_estimate_blocks: u32,
    /// Timeout for each explorer request.
    pub request_timeout_secs: u64,
    pub default_call_gas_limit: u64,
    pub default_create_gas_limit: u64,
    /// Satoshis per unit of gas.
    pub default_gas_price: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            explorer_url: None,
            fee_rate: None,
            fallback_fee_rate: DEFAULT_FEE_RATE_PER_BYTE,
            fee_estimate_blocks: DEFAULT_FEE_ESTIMATE_BLOCKS,
            request_timeout_secs: 10,
            default_call_gas_limit: DEFAULT_CALL_GAS_LIMIT,
            default_create_gas_limit: DEFAULT_CREATE_GAS_LIMIT,
            default_gas_price: DEFAULT_GAS_PRICE,
        }
    }
}

impl WalletConfig {
    /// Configuration preset for mainnet.
    pub fn mainnet() -> Self {
        Self::default()
    }

    /// Configuration preset for testnet.
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            ..Self::default()
        }
    }

    /// Configuration preset for a local regtest node.
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            ..Self::default()
        }
    }

    /// Explorer base URL without a trailing slash.
    pub fn explorer_url(&self) -> String {
        self.explorer_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_explorer_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `EMBER_NETWORK` | `network` (then its preset) |
    /// | `EMBER_EXPLORER_URL` | `explorer_url` |
    /// | `EMBER_FEE_RATE` | `fee_rate` |
    /// | `EMBER_FALLBACK_FEE_RATE` | `fallback_fee_rate` |
    /// | `EMBER_FEE_ESTIMATE_BLOCKS` | `fee_estimate_blocks` |
    /// | `EMBER_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` |
    /// | `EMBER_CALL_GAS_LIMIT` | `default_call_gas_limit` |
    /// | `EMBER_CREATE_GAS_LIMIT` | `default_create_gas_limit` |
    /// | `EMBER_GAS_PRICE` | `default_gas_price` |
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup("EMBER_NETWORK") {
            Some(name) => {
                let network = name
                    .parse::<Network>()
                    .map_err(|e| WalletError::Config(format!("EMBER_NETWORK: {e}")))?;
                Self {
                    network,
                    ..Self::default()
                }
            }
            None => Self::default(),
        };

        if let Some(url) = lookup("EMBER_EXPLORER_URL") {
            cfg.explorer_url = Some(url);
        }
        if let Some(v) = lookup("EMBER_FEE_RATE") {
            cfg.fee_rate = Some(parse_positive("EMBER_FEE_RATE", &v)?);
        }
        if let Some(v) = lookup("EMBER_FALLBACK_FEE_RATE") {
            cfg.fallback_fee_rate = parse_positive("EMBER_FALLBACK_FEE_RATE", &v)?;
        }
        if let Some(v) = lookup("EMBER_FEE_ESTIMATE_BLOCKS") {
            let blocks = parse_positive("EMBER_FEE_ESTIMATE_BLOCKS", &v)?;
            cfg.fee_estimate_blocks = u32::try_from(blocks).map_err(|_| {
                WalletError::Config(format!("EMBER_FEE_ESTIMATE_BLOCKS out of range: {v}"))
            })?;
        }
        if let Some(v) = lookup("EMBER_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout_secs = parse_positive("EMBER_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("EMBER_CALL_GAS_LIMIT") {
            cfg.default_call_gas_limit = parse_positive("EMBER_CALL_GAS_LIMIT", &v)?;
        }
        if let Some(v) = lookup("EMBER_CREATE_GAS_LIMIT") {
            cfg.default_create_gas_limit = parse_positive("EMBER_CREATE_GAS_LIMIT", &v)?;
        }
        if let Some(v) = lookup("EMBER_GAS_PRICE") {
            cfg.default_gas_price = parse_positive("EMBER_GAS_PRICE", &v)?;
        }

        Ok(cfg)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u64, WalletError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(WalletError::Config(format!(
            "{key} must be a positive integer, got {value:?}"
        ))),
    }
}
