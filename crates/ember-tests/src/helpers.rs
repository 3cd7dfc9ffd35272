//! Shared test helpers for E2E and property tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ember_core::address::{Address, Network};
use ember_core::crypto::KeyPair;
use ember_core::error::ExplorerError;
use ember_core::traits::{
    AddressInfo, ContractCallResult, Explorer, SendRawTxResult, TransactionPage,
};
use ember_core::types::{OutPoint, Transaction, Txid, UnspentOutput};

/// Deterministic keypair from a seed byte (must be non-zero).
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes(&[seed; 32]).expect("non-zero seed is a valid secret")
}

/// Testnet address of `keypair(seed)`.
pub fn address(seed: u8) -> Address {
    Address::from_keypair(&keypair(seed), Network::Testnet)
}

/// Testnet address not backed by any test key.
pub fn foreign_address(byte: u8) -> Address {
    Address::from_pubkey_hash([byte; 20], Network::Testnet)
}

/// Outpoint with a txid derived from `index`.
pub fn outpoint(index: u32) -> OutPoint {
    let mut txid = [0u8; 32];
    txid[..4].copy_from_slice(&index.to_be_bytes());
    txid[31] = 0xee;
    OutPoint {
        txid: Txid(txid),
        vout: index % 4,
    }
}

/// UTXO owned by `owner` with a distinct outpoint per `index`.
pub fn utxo(
    owner: &Address,
    index: u32,
    value: u64,
    confirmations: u64,
    is_stake: bool,
) -> UnspentOutput {
    UnspentOutput {
        outpoint: outpoint(index),
        address: owner.to_string(),
        value,
        confirmations,
        is_stake,
        script_pubkey: owner.script_pubkey(),
    }
}

/// Mature, non-stake UTXOs with the given values.
pub fn utxos(owner: &Address, values: &[u64]) -> Vec<UnspentOutput> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| utxo(owner, i as u32, *v, 10, false))
        .collect()
}

/// Transactions per history page served by [`MockExplorer`].
pub const HISTORY_PAGE_SIZE: usize = 2;

/// In-memory explorer that records every request.
#[derive(Default)]
pub struct MockExplorer {
    pub utxos: Vec<UnspentOutput>,
    /// Estimate returned by `estimate_fee_rate`; `None` means unavailable.
    pub fee_rate: Option<u64>,
    /// When set, every request fails with this message.
    pub fail_with: Option<String>,
    pub requests: AtomicUsize,
    pub broadcasts: Mutex<Vec<String>>,
    pub fee_targets: Mutex<Vec<u32>>,
}

impl MockExplorer {
    pub fn with_utxos(utxos: Vec<UnspentOutput>) -> Self {
        Self {
            utxos,
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Raw transactions broadcast so far.
    pub fn broadcast_log(&self) -> Vec<String> {
        self.broadcasts.lock().expect("broadcast log poisoned").clone()
    }

    /// Broadcast transactions, newest first, as the explorer lists them.
    fn broadcast_history(&self) -> Result<Vec<Transaction>, ExplorerError> {
        self.broadcast_log()
            .iter()
            .rev()
            .map(|raw| Transaction::from_hex(raw).map_err(|e| ExplorerError::Decode(e.to_string())))
            .collect()
    }

    fn record(&self) -> Result<(), ExplorerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(msg) => Err(ExplorerError::Request(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Explorer for MockExplorer {
    async fn fetch_unspent_outputs(
        &self,
        _address: &Address,
    ) -> Result<Vec<UnspentOutput>, ExplorerError> {
        self.record()?;
        Ok(self.utxos.clone())
    }

    async fn estimate_fee_rate(&self, target_blocks: u32) -> Result<Option<u64>, ExplorerError> {
        self.record()?;
        self.fee_targets
            .lock()
            .expect("fee target log poisoned")
            .push(target_blocks);
        Ok(self.fee_rate)
    }

    async fn broadcast_raw_transaction(
        &self,
        raw_hex: &str,
    ) -> Result<SendRawTxResult, ExplorerError> {
        self.record()?;
        let tx = Transaction::from_hex(raw_hex).map_err(|e| ExplorerError::Decode(e.to_string()))?;
        self.broadcasts
            .lock()
            .expect("broadcast log poisoned")
            .push(raw_hex.to_string());
        Ok(SendRawTxResult {
            txid: tx.txid().to_string(),
        })
    }

    async fn call_contract(
        &self,
        contract_address: &str,
        payload_hex: &str,
    ) -> Result<ContractCallResult, ExplorerError> {
        self.record()?;
        Ok(ContractCallResult {
            address: contract_address.to_string(),
            execution_result: serde_json::json!({
                "gasUsed": 21_000,
                "excepted": "None",
                "output": payload_hex,
            }),
        })
    }

    async fn address_info(&self, address: &Address) -> Result<AddressInfo, ExplorerError> {
        self.record()?;
        let history = self.broadcast_history()?;
        Ok(AddressInfo {
            addr_str: address.to_string(),
            balance_sat: self.utxos.iter().map(|u| u.value).sum(),
            tx_appearances: history.len() as u64,
            transactions: history.iter().map(|tx| tx.txid().to_string()).collect(),
            ..AddressInfo::default()
        })
    }

    async fn transactions(
        &self,
        _address: &Address,
        page_num: u32,
    ) -> Result<TransactionPage, ExplorerError> {
        self.record()?;
        let history = self.broadcast_history()?;
        let pages_total = history.len().div_ceil(HISTORY_PAGE_SIZE) as u32;
        let txs = history
            .iter()
            .skip(page_num as usize * HISTORY_PAGE_SIZE)
            .take(HISTORY_PAGE_SIZE)
            .map(|tx| serde_json::json!({ "txid": tx.txid().to_string(), "size": tx.size() }))
            .collect();
        Ok(TransactionPage { pages_total, txs })
    }

    async fn transaction_info(&self, txid: &str) -> Result<serde_json::Value, ExplorerError> {
        self.record()?;
        self.broadcast_history()?
            .iter()
            .find(|tx| tx.txid().to_string() == txid)
            .map(|tx| {
                serde_json::json!({
                    "txid": txid,
                    "size": tx.size(),
                    "valueOut": tx.total_output_value().unwrap_or(0),
                })
            })
            .ok_or_else(|| ExplorerError::Status {
                status: 404,
                body: "Not found".into(),
            })
    }
}
