//! HTTP client for an Insight-style explorer API.
//!
//! Implements [`Explorer`] over these endpoints:
//!
//! | Operation | Request |
//! |---|---|
//! | UTXO listing | `GET /address/{addr}/utxo` |
//! | Fee estimate | `GET /utils/estimatefee?nbBlocks={n}` |
//! | Broadcast | `POST /tx/send` with `{"rawtx": hex}` |
//! | Contract query | `GET /contract/{addr}/call?data={hex}` |
//! | Address summary | `GET /address/{addr}` |
//! | History page | `GET /txs?address={addr}&pageNum={n}` |
//! | Transaction | `GET /tx/{txid}` |
//!
//! Requests are not retried; a timeout or non-success status surfaces as an
//! [`ExplorerError`].

use async_trait::async_trait;
use ember_core::address::Address;
use ember_core::constants::COIN;
use ember_core::error::ExplorerError;
use ember_core::script::Script;
use ember_core::traits::{
    AddressInfo, ContractCallResult, Explorer, SendRawTxResult, TransactionPage,
};
use ember_core::types::{OutPoint, Txid, UnspentOutput};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::WalletConfig;

pub struct InsightExplorer {
    client: Client,
    base_url: String,
}

impl InsightExplorer {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, ExplorerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExplorerError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Client for the explorer named by `config`.
    pub fn from_config(config: &WalletConfig) -> Result<Self, ExplorerError> {
        Self::new(&config.explorer_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ExplorerError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| request_failed(path, e))?;
        decode(path, resp).await
    }
}

fn request_failed(path: &str, e: reqwest::Error) -> ExplorerError {
    warn!(path, error = %e, "explorer request failed");
    ExplorerError::Request(e.to_string())
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, ExplorerError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(path, status = status.as_u16(), "explorer returned error status");
        return Err(ExplorerError::Status {
            status: status.as_u16(),
            body,
        });
    }
    resp.json()
        .await
        .map_err(|e| ExplorerError::Decode(format!("{path}: {e}")))
}

#[async_trait]
impl Explorer for InsightExplorer {
    async fn fetch_unspent_outputs(
        &self,
        address: &Address,
    ) -> Result<Vec<UnspentOutput>, ExplorerError> {
        let owner = address.to_string();
        let raw: Vec<InsightUtxo> = self.get_json(&format!("/address/{owner}/utxo")).await?;
        let utxos = raw
            .into_iter()
            .map(|u| u.into_unspent(&owner))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(address = %owner, count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    async fn estimate_fee_rate(&self, target_blocks: u32) -> Result<Option<u64>, ExplorerError> {
        let value: Value = self
            .get_json(&format!("/utils/estimatefee?nbBlocks={target_blocks}"))
            .await?;
        Ok(fee_rate_from_estimate(&value))
    }

    async fn broadcast_raw_transaction(
        &self,
        raw_hex: &str,
    ) -> Result<SendRawTxResult, ExplorerError> {
        let path = "/tx/send";
        let resp = self
            .client
            .post(self.url(path))
            .json(&json!({ "rawtx": raw_hex }))
            .send()
            .await
            .map_err(|e| request_failed(path, e))?;
        decode(path, resp).await
    }

    async fn call_contract(
        &self,
        contract_address: &str,
        payload_hex: &str,
    ) -> Result<ContractCallResult, ExplorerError> {
        self.get_json(&format!("/contract/{contract_address}/call?data={payload_hex}"))
            .await
    }

    async fn address_info(&self, address: &Address) -> Result<AddressInfo, ExplorerError> {
        self.get_json(&format!("/address/{address}")).await
    }

    async fn transactions(
        &self,
        address: &Address,
        page_num: u32,
    ) -> Result<TransactionPage, ExplorerError> {
        let page: TransactionPage = self.get_json(&history_path(address, page_num)).await?;
        debug!(%address, page_num, pages_total = page.pages_total, "fetched history page");
        Ok(page)
    }

    async fn transaction_info(&self, txid: &str) -> Result<Value, ExplorerError> {
        self.get_json(&format!("/tx/{txid}")).await
    }
}

fn history_path(address: &Address, page_num: u32) -> String {
    format!("/txs?address={address}&pageNum={page_num}")
}

/// Convert an `estimatefee` response (coins per kilobyte) to satoshis per byte.
///
/// Anything other than a positive number means no estimate is available.
pub fn fee_rate_from_estimate(value: &Value) -> Option<u64> {
    let per_kb_coins = value.as_f64()?;
    if !per_kb_coins.is_finite() || per_kb_coins <= 0.0 {
        return None;
    }
    let per_kb = (per_kb_coins * COIN as f64).ceil();
    if per_kb >= u64::MAX as f64 {
        return None;
    }
    Some((per_kb as u64).div_ceil(1024))
}

/// Numeric field that explorers return either as a JSON number or a string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Satoshis {
    Number(u64),
    Text(String),
}

impl Satoshis {
    fn to_u64(&self) -> Result<u64, ExplorerError> {
        match self {
            Satoshis::Number(n) => Ok(*n),
            Satoshis::Text(s) => s
                .parse()
                .map_err(|_| ExplorerError::Decode(format!("non-integer satoshi value {s:?}"))),
        }
    }
}

/// One entry of `/address/{addr}/utxo`.
///
/// Older Insight deployments name the fields `txid`/`vout`/`satoshis`;
/// newer ones use `transactionId`/`outputIndex`/`value`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct InsightUtxo {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
    #[serde(default)]
    output_index: Option<u32>,
    #[serde(default)]
    satoshis: Option<Satoshis>,
    #[serde(default)]
    value: Option<Satoshis>,
    #[serde(default)]
    script_pub_key: Option<String>,
    #[serde(default)]
    is_stake: bool,
    #[serde(default)]
    confirmations: u64,
}

impl InsightUtxo {
    fn into_unspent(self, owner: &str) -> Result<UnspentOutput, ExplorerError> {
        let txid_hex = self
            .transaction_id
            .or(self.txid)
            .ok_or_else(|| ExplorerError::Decode("utxo without txid".into()))?;
        let txid: Txid = txid_hex
            .parse()
            .map_err(|e| ExplorerError::Decode(format!("utxo txid: {e}")))?;
        let vout = self
            .output_index
            .or(self.vout)
            .ok_or_else(|| ExplorerError::Decode(format!("utxo {txid_hex} without output index")))?;
        let value = self
            .satoshis
            .or(self.value)
            .ok_or_else(|| ExplorerError::Decode(format!("utxo {txid_hex} without value")))?
            .to_u64()?;
        let script_pubkey = match self.script_pub_key.as_deref() {
            Some(hex) if !hex.is_empty() => Script::from_hex(hex)
                .map_err(|e| ExplorerError::Decode(format!("utxo script: {e}")))?,
            _ => Script::new(),
        };

        Ok(UnspentOutput {
            outpoint: OutPoint { txid, vout },
            address: self.address.unwrap_or_else(|| owner.to_string()),
            value,
            confirmations: self.confirmations,
            is_stake: self.is_stake,
            script_pubkey,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::address::Network;
    use std::time::Duration;

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    fn parse(json: &str) -> Result<UnspentOutput, ExplorerError> {
        let raw: InsightUtxo = serde_json::from_str(json).unwrap();
        raw.into_unspent("qOwner")
    }

    #[test]
    fn qtum_info_utxo_shape() {
        let json = format!(
            r#"{{"transactionId":"{TXID}","outputIndex":1,
                "scriptPubKey":"76a914000000000000000000000000000000000000000088ac",
                "address":"qAddr","value":"150000000","isStake":true,
                "blockHeight":1200,"confirmations":42}}"#
        );
        let utxo = parse(&json).unwrap();
        assert_eq!(utxo.outpoint.txid.to_string(), TXID);
        assert_eq!(utxo.outpoint.vout, 1);
        assert_eq!(utxo.value, 150_000_000);
        assert!(utxo.is_stake);
        assert_eq!(utxo.confirmations, 42);
        assert_eq!(utxo.address, "qAddr");
        assert!(utxo.script_pubkey.is_p2pkh());
    }

    #[test]
    fn legacy_insight_utxo_shape() {
        let json = format!(
            r#"{{"txid":"{TXID}","vout":0,"amount":0.5,"satoshis":50000000,
                "height":10,"confirmations":3}}"#
        );
        let utxo = parse(&json).unwrap();
        assert_eq!(utxo.outpoint.vout, 0);
        assert_eq!(utxo.value, 50_000_000);
        assert!(!utxo.is_stake);
        assert_eq!(utxo.address, "qOwner");
        assert!(utxo.script_pubkey.is_empty());
    }

    #[test]
    fn fractional_value_rejected() {
        let json = format!(r#"{{"txid":"{TXID}","vout":0,"value":"0.5"}}"#);
        assert!(matches!(parse(&json).unwrap_err(), ExplorerError::Decode(_)));
    }

    #[test]
    fn missing_txid_rejected() {
        assert!(matches!(
            parse(r#"{"vout":0,"satoshis":1}"#).unwrap_err(),
            ExplorerError::Decode(_)
        ));
    }

    #[test]
    fn history_path_carries_address_and_page() {
        let address = Address::from_pubkey_hash([0x11; 20], Network::Testnet);
        assert_eq!(
            history_path(&address, 2),
            format!("/txs?address={address}&pageNum=2")
        );
    }

    #[test]
    fn fee_estimate_converts_per_kb_coins() {
        // 0.004 coin/KB = 400000 sat/KB -> ceil(400000 / 1024) = 391
        assert_eq!(fee_rate_from_estimate(&json!(0.004)), Some(391));
        assert_eq!(fee_rate_from_estimate(&json!(0.001)), Some(98));
    }

    #[test]
    fn fee_estimate_unavailable() {
        assert_eq!(fee_rate_from_estimate(&json!(-1)), None);
        assert_eq!(fee_rate_from_estimate(&json!(0)), None);
        assert_eq!(fee_rate_from_estimate(&json!({"6": 0.004})), None);
        assert_eq!(fee_rate_from_estimate(&json!("0.004")), None);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let explorer = InsightExplorer::new("http://localhost:3001/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(explorer.base_url(), "http://localhost:3001/api");
        assert_eq!(explorer.url("/tx/send"), "http://localhost:3001/api/tx/send");
    }

    #[test]
    fn from_config_uses_network_default() {
        let explorer = InsightExplorer::from_config(&WalletConfig::testnet()).unwrap();
        assert_eq!(explorer.base_url(), "https://testnet.qtum.info/api");
    }
}
