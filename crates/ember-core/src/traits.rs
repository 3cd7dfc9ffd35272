//! Collaborator interfaces consumed by the wallet.
//!
//! - [`Explorer`] — blockchain explorer access: UTXO listing, fee
//!   estimation, broadcast, read-only contract queries and address or
//!   transaction history (the wallet's HTTP client implements it; tests
//!   use in-memory doubles)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ExplorerError;
use crate::types::UnspentOutput;

/// Result of submitting a raw transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SendRawTxResult {
    pub txid: String,
}

/// Result of a simulated (read-only) contract execution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallResult {
    pub address: String,
    pub execution_result: serde_json::Value,
}

/// Balance summary of one address.
///
/// Explorers spell the appearance counters `txApperances`; both spellings
/// are accepted. Fields the wallet does not interpret stay in `extra`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub addr_str: String,
    #[serde(default)]
    pub balance_sat: u64,
    #[serde(default)]
    pub total_received_sat: u64,
    #[serde(default)]
    pub total_sent_sat: u64,
    /// Negative while an unconfirmed spend is pending.
    #[serde(default)]
    pub unconfirmed_balance_sat: i64,
    #[serde(default, alias = "txApperances")]
    pub tx_appearances: u64,
    #[serde(default)]
    pub transactions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of an address's transaction history.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub pages_total: u32,
    /// Explorer-formatted transactions, newest first.
    #[serde(default)]
    pub txs: Vec<serde_json::Value>,
}

/// Remote access to chain state.
///
/// Every method is a single request/response; implementations must not
/// retry internally beyond what their transport does. Failures surface as
/// [`ExplorerError`] and are never recovered by the wallet.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Spendable outputs currently owned by `address`.
    async fn fetch_unspent_outputs(
        &self,
        address: &Address,
    ) -> Result<Vec<UnspentOutput>, ExplorerError>;

    /// Fee rate in satoshis per byte for confirmation within `target_blocks`.
    ///
    /// `Ok(None)` means the explorer has no estimate (always the case on
    /// test networks); the caller falls back to a fixed rate.
    async fn estimate_fee_rate(&self, target_blocks: u32) -> Result<Option<u64>, ExplorerError>;

    /// Submit a hex-encoded signed transaction.
    async fn broadcast_raw_transaction(
        &self,
        raw_hex: &str,
    ) -> Result<SendRawTxResult, ExplorerError>;

    /// Simulate a contract call without creating a transaction.
    async fn call_contract(
        &self,
        contract_address: &str,
        payload_hex: &str,
    ) -> Result<ContractCallResult, ExplorerError>;

    /// Balance and history summary of `address`.
    async fn address_info(&self, address: &Address) -> Result<AddressInfo, ExplorerError>;

    /// Page `page_num` (zero-based) of the transactions touching `address`.
    async fn transactions(
        &self,
        address: &Address,
        page_num: u32,
    ) -> Result<TransactionPage, ExplorerError>;

    /// Explorer view of a single transaction, as returned by the explorer.
    async fn transaction_info(&self, txid: &str) -> Result<serde_json::Value, ExplorerError>;
}
