//! Wallet façade: one key, one address, three transaction builders.
//!
//! The [`Wallet`] owns a signing [`KeyPair`] and composes explorer access,
//! fee resolution, coin selection, and assembly into payment,
//! contract-create, and contract-call transactions. Each builder comes in a
//! `generate_*` form returning signed hex and a broadcasting form returning
//! the transaction id.
//!
//! # Concurrency
//!
//! UTXOs are not reserved between a build and its broadcast. Two builds
//! against the same address that run before either transaction is mined can
//! select the same outputs, and one of the two transactions will be
//! rejected as a double spend. Callers must serialize builds per address.

use std::sync::Arc;

use ember_core::address::{Address, Network};
use ember_core::amount::{fee_rate_per_byte, format_amount};
use ember_core::crypto::KeyPair;
use ember_core::script::decode_hex_field;
use ember_core::traits::{
    AddressInfo, ContractCallResult, Explorer, SendRawTxResult, TransactionPage,
};
use ember_core::types::{Txid, UnspentOutput};
use tracing::{debug, info};

use crate::builder::{SignedTransaction, TransactionBuilder};
use crate::coin_selection::{CoinSelector, OutputRequest};
use crate::config::WalletConfig;
use crate::contract::ContractInvocationParams;
use crate::error::WalletError;
use crate::insight::InsightExplorer;
use crate::provider::{send_settings, ProviderCall, ProviderResponse};

/// Options for a payment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SendTxOptions {
    /// Satoshis per byte; floored. Skips fee estimation when set.
    pub fee_rate: Option<f64>,
}

/// Options for a contract create or call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContractTxOptions {
    /// Satoshis sent to the contract. Must be zero for a create.
    pub amount: u64,
    pub gas_limit: Option<u64>,
    /// Satoshis per unit of gas.
    pub gas_price: Option<u64>,
    /// Satoshis per byte; floored. Skips fee estimation when set.
    pub fee_rate: Option<f64>,
}

/// Single-key wallet bound to an explorer.
pub struct Wallet {
    keypair: KeyPair,
    address: Address,
    config: WalletConfig,
    explorer: Arc<dyn Explorer>,
}

impl Wallet {
    pub fn new(keypair: KeyPair, config: WalletConfig, explorer: Arc<dyn Explorer>) -> Self {
        let address = Address::from_keypair(&keypair, config.network);
        Self {
            keypair,
            address,
            config,
            explorer,
        }
    }

    /// Wallet talking to the Insight explorer named by `config`.
    pub fn with_insight(keypair: KeyPair, config: WalletConfig) -> Result<Self, WalletError> {
        let explorer = InsightExplorer::from_config(&config)?;
        Ok(Self::new(keypair, config, Arc::new(explorer)))
    }

    /// Import a WIF-encoded key for the configured network.
    pub fn from_wif(
        wif: &str,
        config: WalletConfig,
        explorer: Arc<dyn Explorer>,
    ) -> Result<Self, WalletError> {
        let keypair = KeyPair::from_wif(wif, config.network)?;
        Ok(Self::new(keypair, config, explorer))
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Export the signing key as compressed WIF.
    pub fn to_wif(&self) -> String {
        self.keypair.to_wif(self.config.network)
    }

    pub async fn get_utxos(&self) -> Result<Vec<UnspentOutput>, WalletError> {
        Ok(self.explorer.fetch_unspent_outputs(&self.address).await?)
    }

    /// Network fee rate in satoshis per byte.
    ///
    /// A configured `fee_rate` wins; otherwise the explorer estimate is
    /// used, falling back to `fallback_fee_rate` when the explorer has none.
    pub async fn fee_rate_per_byte(&self) -> Result<u64, WalletError> {
        if let Some(rate) = self.config.fee_rate {
            debug!(rate, "using configured fee rate");
            return Ok(rate);
        }
        let estimate = self
            .explorer
            .estimate_fee_rate(self.config.fee_estimate_blocks)
            .await?;
        match estimate {
            Some(rate) if rate > 0 => {
                debug!(rate, blocks = self.config.fee_estimate_blocks, "using estimated fee rate");
                Ok(rate)
            }
            _ => {
                debug!(rate = self.config.fallback_fee_rate, "no fee estimate, using fallback");
                Ok(self.config.fallback_fee_rate)
            }
        }
    }

    async fn resolve_fee_rate(&self, override_rate: Option<u64>) -> Result<u64, WalletError> {
        match override_rate {
            Some(rate) => Ok(rate),
            None => self.fee_rate_per_byte().await,
        }
    }

    /// Fetch UTXOs and the fee rate, then select, assemble, and sign.
    async fn build_signed(
        &self,
        outputs: Vec<OutputRequest>,
        override_rate: Option<u64>,
    ) -> Result<SignedTransaction, WalletError> {
        let utxos = self.get_utxos().await?;
        let fee_rate = self.resolve_fee_rate(override_rate).await?;

        let mut builder = TransactionBuilder::new(fee_rate);
        for output in outputs {
            builder.add_output(output);
        }
        let unsigned = builder.build(&utxos, &self.address)?;
        TransactionBuilder::sign(unsigned, &self.keypair)
    }

    fn parse_recipient(&self, to: &str) -> Result<Address, WalletError> {
        Ok(Address::parse_for(to, self.config.network)?)
    }

    fn contract_call_params(
        &self,
        contract_address: &str,
        payload_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<ContractInvocationParams, WalletError> {
        let params = ContractInvocationParams::call(
            contract_address,
            payload_hex,
            opts.gas_limit.unwrap_or(self.config.default_call_gas_limit),
            opts.gas_price.unwrap_or(self.config.default_gas_price),
        );
        params.validate()?;
        Ok(params)
    }

    // ── Payment ─────────────────────────────────────────────────────────

    /// Build and sign a payment of `amount` satoshis to `to`.
    pub async fn build_payment(
        &self,
        to: &str,
        amount: u64,
        opts: &SendTxOptions,
    ) -> Result<SignedTransaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("payment amount is zero".into()));
        }
        let recipient = self.parse_recipient(to)?;
        let override_rate = opts.fee_rate.map(fee_rate_per_byte).transpose()?;

        let signed = self
            .build_signed(vec![OutputRequest::to_address(recipient, amount)], override_rate)
            .await?;
        debug!(to, amount = %format_amount(amount), fee = signed.fee, "payment built");
        Ok(signed)
    }

    /// Signed payment transaction as hex.
    pub async fn generate_tx(
        &self,
        to: &str,
        amount: u64,
        opts: &SendTxOptions,
    ) -> Result<String, WalletError> {
        Ok(self.build_payment(to, amount, opts).await?.to_hex())
    }

    /// Build, sign, and broadcast a payment.
    pub async fn send(
        &self,
        to: &str,
        amount: u64,
        opts: &SendTxOptions,
    ) -> Result<SendRawTxResult, WalletError> {
        let raw = self.generate_tx(to, amount, opts).await?;
        self.send_raw_tx(&raw).await
    }

    /// Submit a signed raw transaction.
    pub async fn send_raw_tx(&self, raw_hex: &str) -> Result<SendRawTxResult, WalletError> {
        let result = self.explorer.broadcast_raw_transaction(raw_hex).await?;
        info!(txid = %result.txid, "transaction broadcast");
        Ok(result)
    }

    /// Largest amount [`send`](Self::send) can pay to `to` right now.
    pub async fn send_estimate_max_value(
        &self,
        to: &str,
        opts: &SendTxOptions,
    ) -> Result<u64, WalletError> {
        let recipient = self.parse_recipient(to)?;
        let override_rate = opts.fee_rate.map(fee_rate_per_byte).transpose()?;
        let utxos = self.get_utxos().await?;
        let fee_rate = self.resolve_fee_rate(override_rate).await?;
        CoinSelector::max_spendable(&utxos, &OutputRequest::to_address(recipient, 0), &[], fee_rate)
    }

    // ── Contract create ─────────────────────────────────────────────────

    /// Build and sign a contract deployment of `code_hex`.
    ///
    /// Fails before any network request when `opts.amount` is non-zero.
    pub async fn build_contract_create(
        &self,
        code_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<SignedTransaction, WalletError> {
        if opts.amount != 0 {
            return Err(WalletError::InvalidAmount(
                "contract creation cannot carry value".into(),
            ));
        }
        let params = ContractInvocationParams::create(
            code_hex,
            opts.gas_limit.unwrap_or(self.config.default_create_gas_limit),
            opts.gas_price.unwrap_or(self.config.default_gas_price),
        );
        params.validate()?;
        let outputs = params.output_requests(0)?;
        let override_rate = opts.fee_rate.map(fee_rate_per_byte).transpose()?;

        let signed = self.build_signed(outputs, override_rate).await?;
        debug!(
            gas_limit = params.gas_limit,
            gas_price = params.gas_price,
            fee = signed.fee,
            "contract create built"
        );
        Ok(signed)
    }

    pub async fn generate_contract_create_tx(
        &self,
        code_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<String, WalletError> {
        Ok(self.build_contract_create(code_hex, opts).await?.to_hex())
    }

    pub async fn contract_create(
        &self,
        code_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<SendRawTxResult, WalletError> {
        let raw = self.generate_contract_create_tx(code_hex, opts).await?;
        self.send_raw_tx(&raw).await
    }

    // ── Contract call ───────────────────────────────────────────────────

    /// Build and sign a call of `contract_address` with ABI `payload_hex`,
    /// sending `opts.amount` satoshis to the contract.
    pub async fn build_contract_send(
        &self,
        contract_address: &str,
        payload_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<SignedTransaction, WalletError> {
        let params = self.contract_call_params(contract_address, payload_hex, opts)?;
        let outputs = params.output_requests(opts.amount)?;
        let override_rate = opts.fee_rate.map(fee_rate_per_byte).transpose()?;

        let signed = self.build_signed(outputs, override_rate).await?;
        debug!(
            contract = contract_address,
            amount = %format_amount(opts.amount),
            fee = signed.fee,
            "contract call built"
        );
        Ok(signed)
    }

    pub async fn generate_contract_send_tx(
        &self,
        contract_address: &str,
        payload_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<String, WalletError> {
        Ok(self
            .build_contract_send(contract_address, payload_hex, opts)
            .await?
            .to_hex())
    }

    pub async fn contract_send(
        &self,
        contract_address: &str,
        payload_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<SendRawTxResult, WalletError> {
        let raw = self
            .generate_contract_send_tx(contract_address, payload_hex, opts)
            .await?;
        self.send_raw_tx(&raw).await
    }

    /// Largest amount [`contract_send`](Self::contract_send) can carry after
    /// the gas budget and fee. `opts.amount` is ignored.
    pub async fn contract_send_estimate_max_value(
        &self,
        contract_address: &str,
        payload_hex: &str,
        opts: &ContractTxOptions,
    ) -> Result<u64, WalletError> {
        let params = self.contract_call_params(contract_address, payload_hex, opts)?;
        let template = OutputRequest::to_script(params.script()?, 0);
        let gas = OutputRequest::gas_budget(params.gas_budget()?);
        let override_rate = opts.fee_rate.map(fee_rate_per_byte).transpose()?;

        let utxos = self.get_utxos().await?;
        let fee_rate = self.resolve_fee_rate(override_rate).await?;
        CoinSelector::max_spendable(&utxos, &template, &[gas], fee_rate)
    }

    /// Simulate a contract call on the explorer without building a transaction.
    pub async fn contract_call(
        &self,
        contract_address: &str,
        payload_hex: &str,
    ) -> Result<ContractCallResult, WalletError> {
        let address = decode_hex_field("contract address", contract_address)?;
        let payload = decode_hex_field("call payload", payload_hex)?;
        Ok(self
            .explorer
            .call_contract(&hex::encode(address), &hex::encode(payload))
            .await?)
    }

    /// Balance and history summary of this wallet's address.
    pub async fn get_info(&self) -> Result<AddressInfo, WalletError> {
        Ok(self.explorer.address_info(&self.address).await?)
    }

    /// Page `page_num` of this wallet's transaction history, starting at zero.
    pub async fn get_transactions(&self, page_num: u32) -> Result<TransactionPage, WalletError> {
        Ok(self.explorer.transactions(&self.address, page_num).await?)
    }

    /// Explorer view of transaction `id`, which must be a 64-digit hex txid.
    pub async fn get_transaction_info(&self, id: &str) -> Result<serde_json::Value, WalletError> {
        let txid: Txid = id.parse()?;
        Ok(self.explorer.transaction_info(&txid.to_string()).await?)
    }

    /// Dispatch a provider request.
    pub async fn raw_call(&self, call: ProviderCall) -> Result<ProviderResponse, WalletError> {
        match call {
            ProviderCall::SendToContract {
                contract_address,
                payload_hex,
                amount,
                gas_limit,
                gas_price,
            } => {
                let settings = send_settings(amount.as_deref(), gas_limit, gas_price.as_deref())?;
                let opts = ContractTxOptions {
                    amount: settings.amount,
                    gas_limit: settings.gas_limit,
                    gas_price: settings.gas_price,
                    fee_rate: None,
                };
                let sent = self
                    .contract_send(&contract_address, &payload_hex, &opts)
                    .await?;
                Ok(ProviderResponse::Sent(sent))
            }
            ProviderCall::CallContract {
                contract_address,
                payload_hex,
            } => {
                let called = self.contract_call(&contract_address, &payload_hex).await?;
                Ok(ProviderResponse::Called(called))
            }
        }
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address.to_string())
            .field("network", &self.config.network)
            .finish_non_exhaustive()
    }
}
