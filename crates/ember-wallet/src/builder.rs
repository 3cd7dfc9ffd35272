//! Transaction builder with size-aware coin selection and signing.
//!
//! Provides a builder pattern for constructing transactions:
//! 1. Add outputs (payments, contract scripts, gas budget)
//! 2. Build an unsigned transaction (performs coin selection)
//! 3. Sign every input with the wallet key
//!
//! Gas budgets are funded by selection but never serialized; the value
//! ends up with the miner through the fee.

use ember_core::address::Address;
use ember_core::amount::checked_sum;
use ember_core::constants::MAX_TX_SIZE;
use ember_core::crypto::{sign_transaction_input, KeyPair};
use ember_core::script::{pay_to_pubkey_hash, Script};
use ember_core::types::{Transaction, TxInput, TxOutput, Txid, UnspentOutput};
use tracing::debug;

use crate::coin_selection::{CoinSelection, CoinSelector, OutputRequest};
use crate::error::WalletError;

/// An unsigned transaction ready for signing.
#[derive(Debug)]
pub struct UnsignedTransaction {
    /// The transaction with empty signature scripts.
    pub tx: Transaction,
    /// The coin selection result used to build this transaction.
    pub selection: CoinSelection,
    /// Change actually emitted, zero when no change output was added.
    pub change: u64,
}

/// A fully signed transaction and its accounting.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: Transaction,
    /// Network fee paid, excluding any gas budget.
    pub fee: u64,
    /// Value of the change output, zero when none was emitted.
    pub change: u64,
}

impl SignedTransaction {
    /// Raw wire encoding, hex, ready for broadcast.
    pub fn to_hex(&self) -> String {
        self.tx.to_hex()
    }

    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }
}

/// Builder for constructing and signing transactions.
///
/// # Example
/// ```ignore
/// let unsigned = TransactionBuilder::new(fee_rate)
///     .add_recipient(address, 5 * COIN)
///     .build(&utxos, &change_addr)?;
/// let signed = TransactionBuilder::sign(unsigned, &keypair)?;
/// ```
pub struct TransactionBuilder {
    outputs: Vec<OutputRequest>,
    fee_rate: u64,
    lock_time: u32,
}

impl TransactionBuilder {
    /// Create a builder paying `fee_rate` satoshis per byte.
    pub fn new(fee_rate: u64) -> Self {
        Self {
            outputs: Vec::new(),
            fee_rate,
            lock_time: 0,
        }
    }

    pub fn add_output(&mut self, output: OutputRequest) -> &mut Self {
        self.outputs.push(output);
        self
    }

    /// Pay `amount` to a pay-to-pubkey-hash address.
    pub fn add_recipient(&mut self, address: Address, amount: u64) -> &mut Self {
        self.add_output(OutputRequest::to_address(address, amount))
    }

    /// Lock `amount` with a contract script.
    pub fn add_contract_output(&mut self, script: Script, amount: u64) -> &mut Self {
        self.add_output(OutputRequest::to_script(script, amount))
    }

    /// Reserve `gas` satoshis for contract execution.
    pub fn add_gas_budget(&mut self, gas: u64) -> &mut Self {
        self.add_output(OutputRequest::gas_budget(gas))
    }

    /// Set the transaction lock time.
    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    pub fn outputs(&self) -> &[OutputRequest] {
        &self.outputs
    }

    /// Select coins for the current outputs.
    pub fn select(&self, utxos: &[UnspentOutput]) -> Result<CoinSelection, WalletError> {
        CoinSelector::select(utxos, &self.outputs, self.fee_rate)
    }

    /// Build an unsigned transaction by selecting coins and constructing outputs.
    ///
    /// # Arguments
    /// - `utxos` — available UTXOs owned by the wallet
    /// - `change_address` — address to receive change
    pub fn build(
        &self,
        utxos: &[UnspentOutput],
        change_address: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        let selection = self.select(utxos)?;
        let mut unsigned = Self::assemble_unsigned(selection, &self.outputs, change_address)?;
        unsigned.tx.lock_time = self.lock_time;
        Ok(unsigned)
    }

    /// Lay out inputs and outputs for a finished selection.
    ///
    /// Inputs follow selection order. Change is recomputed from the inputs
    /// rather than trusted from the selection and is emitted only when
    /// positive.
    pub fn assemble_unsigned(
        selection: CoinSelection,
        outputs: &[OutputRequest],
        change_address: &Address,
    ) -> Result<UnsignedTransaction, WalletError> {
        if selection.selected.is_empty() {
            return Err(WalletError::BuildError("no inputs selected".into()));
        }
        if outputs.is_empty() {
            return Err(WalletError::BuildError("no outputs requested".into()));
        }

        let total_in = checked_sum(selection.selected.iter().map(|u| u.value))?;
        let total_out = checked_sum(outputs.iter().map(|o| o.value))?;
        let spent = total_out
            .checked_add(selection.fee)
            .ok_or_else(|| WalletError::InvalidAmount("output value overflow".into()))?;
        let change = total_in
            .checked_sub(spent)
            .ok_or(WalletError::InsufficientFunds {
                have: total_in,
                need: spent,
            })?;

        let inputs = selection
            .selected
            .iter()
            .map(|u| TxInput::unsigned(u.outpoint.clone()))
            .collect();

        let mut tx_outputs: Vec<TxOutput> = outputs
            .iter()
            .filter_map(|o| {
                o.script_pubkey().map(|script_pubkey| TxOutput {
                    value: o.value,
                    script_pubkey,
                })
            })
            .collect();
        if tx_outputs.is_empty() {
            return Err(WalletError::BuildError("no serializable outputs".into()));
        }
        if change > 0 {
            tx_outputs.push(TxOutput {
                value: change,
                script_pubkey: change_address.script_pubkey(),
            });
        }

        let tx = Transaction {
            inputs,
            outputs: tx_outputs,
            ..Transaction::default()
        };

        Ok(UnsignedTransaction {
            tx,
            selection,
            change,
        })
    }

    /// Sign all inputs of an unsigned transaction with `keypair`.
    ///
    /// Inputs are signed in index order. Each input's script code is the
    /// key's own pay-to-pubkey-hash script. A UTXO that reports a locking
    /// script other than that one (another key, or any non-P2PKH form) is
    /// rejected; an empty reported script is trusted as the wallet's own.
    pub fn sign(
        unsigned: UnsignedTransaction,
        keypair: &KeyPair,
    ) -> Result<SignedTransaction, WalletError> {
        let own_hash = keypair.public_key().pubkey_hash();
        let script_code = pay_to_pubkey_hash(&own_hash);
        let mut tx = unsigned.tx;

        for (i, utxo) in unsigned.selection.selected.iter().enumerate() {
            let reported = &utxo.script_pubkey;
            if !reported.is_empty() && reported.pubkey_hash() != Some(own_hash) {
                return Err(WalletError::BuildError(format!(
                    "input {} ({}) is not owned by the signing key",
                    i, utxo.outpoint
                )));
            }
            sign_transaction_input(&mut tx, i, &script_code, keypair)?;
        }

        let size = tx.size();
        if size > MAX_TX_SIZE {
            return Err(WalletError::BuildError(format!(
                "transaction of {size} bytes exceeds {MAX_TX_SIZE}"
            )));
        }

        debug!(
            txid = %tx.txid(),
            size,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            fee = unsigned.selection.fee,
            "transaction signed"
        );

        Ok(SignedTransaction {
            tx,
            fee: unsigned.selection.fee,
            change: unsigned.change,
        })
    }
}

/// Turn a selection into a signed transaction in one step.
pub fn assemble(
    selection: CoinSelection,
    outputs: &[OutputRequest],
    change_address: &Address,
    keypair: &KeyPair,
) -> Result<SignedTransaction, WalletError> {
    let unsigned = TransactionBuilder::assemble_unsigned(selection, outputs, change_address)?;
    TransactionBuilder::sign(unsigned, keypair)
}
