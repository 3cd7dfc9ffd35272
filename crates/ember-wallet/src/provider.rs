//! Provider-style dispatch for contract interactions.
//!
//! [`ProviderCall`] names the two operations a dapp provider exposes:
//! a state-changing `sendtocontract` and a read-only `callcontract`.
//! Amounts and gas prices arrive as decimal coin strings and are converted
//! exactly; an amount finer than one satoshi is an error.

use ember_core::amount::to_smallest_unit;
use ember_core::traits::{ContractCallResult, SendRawTxResult};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// A contract request from a dapp provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ProviderCall {
    /// Build, sign, and broadcast a contract call transaction.
    #[serde(rename = "sendtocontract")]
    SendToContract {
        contract_address: String,
        payload_hex: String,
        /// Decimal coins sent with the call.
        #[serde(default)]
        amount: Option<String>,
        #[serde(default)]
        gas_limit: Option<u64>,
        /// Decimal coins per unit of gas.
        #[serde(default)]
        gas_price: Option<String>,
    },
    /// Simulate a contract call without a transaction.
    #[serde(rename = "callcontract")]
    CallContract {
        contract_address: String,
        payload_hex: String,
    },
}

/// Result of a [`ProviderCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Sent(SendRawTxResult),
    Called(ContractCallResult),
}

/// Satoshi amount and gas settings of a `sendtocontract` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSettings {
    pub amount: u64,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u64>,
}

/// Convert the optional decimal fields of a `sendtocontract` request.
pub fn send_settings(
    amount: Option<&str>,
    gas_limit: Option<u64>,
    gas_price: Option<&str>,
) -> Result<SendSettings, WalletError> {
    let amount = amount.map(to_smallest_unit).transpose()?.unwrap_or(0);
    let gas_price = gas_price.map(to_smallest_unit).transpose()?;
    if gas_price == Some(0) {
        return Err(WalletError::ScriptEncoding("gas price is zero".into()));
    }
    if gas_limit == Some(0) {
        return Err(WalletError::ScriptEncoding("gas limit is zero".into()));
    }
    Ok(SendSettings {
        amount,
        gas_limit,
        gas_price,
    })
}
