//! Wallet error types.

use ember_core::error::{
    AddressError, AmountError, CryptoError, ExplorerError, ScriptError, TransactionError,
};
use thiserror::Error;

/// Errors that can occur while building, signing, or sending a transaction.
///
/// Every variant is terminal for the current build call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Non-integer, negative, zero, or overflowing monetary value.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// No subset of the available UTXOs covers the outputs plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Total value of every candidate UTXO in satoshis.
        have: u64,
        /// Required value (outputs plus fee) at the point selection gave up.
        need: u64,
    },

    /// Malformed hex payload, contract address, or gas parameters.
    #[error("script encoding: {0}")]
    ScriptEncoding(String),

    /// The explorer could not be reached or returned garbage.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Signing error from ember-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Encoding error from ember-core.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl From<AmountError> for WalletError {
    fn from(e: AmountError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

impl From<ScriptError> for WalletError {
    fn from(e: ScriptError) -> Self {
        WalletError::ScriptEncoding(e.to_string())
    }
}

impl From<ExplorerError> for WalletError {
    fn from(e: ExplorerError) -> Self {
        WalletError::NetworkUnavailable(e.to_string())
    }
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        WalletError::InvalidAddress(e.to_string())
    }
}
