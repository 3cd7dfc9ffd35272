//! Core transaction types and their wire encoding.
//!
//! All monetary values are in satoshis (1 coin = 10^8 satoshis).
//! Transactions use the legacy (non-witness) layout and are encoded with
//! `bitcoin`'s consensus codec:
//!
//! ```text
//! version:i32le | n_in:varint | (txid:32 | vout:u32le | script_sig:varbytes | sequence:u32le)*
//!               | n_out:varint | (value:u64le | script_pubkey:varbytes)* | lock_time:u32le
//! ```

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{self, VarInt};
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Sequence, Witness};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{STAKE_MATURITY, SEQUENCE_FINAL, TX_VERSION};
use crate::error::TransactionError;
use crate::script::Script;

/// A 32-byte transaction id in internal byte order.
///
/// Displayed and parsed byte-reversed, the way explorers print txids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl FromStr for Txid {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TransactionError::InvalidTxid(e.to_string()))?;
        let mut arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| TransactionError::InvalidTxid(format!("{} bytes", v.len())))?;
        arr.reverse();
        Ok(Self(arr))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl From<&OutPoint> for bitcoin::OutPoint {
    fn from(outpoint: &OutPoint) -> Self {
        bitcoin::OutPoint {
            txid: bitcoin::Txid::from_byte_array(outpoint.txid.0),
            vout: outpoint.vout,
        }
    }
}

impl From<bitcoin::OutPoint> for OutPoint {
    fn from(outpoint: bitcoin::OutPoint) -> Self {
        OutPoint {
            txid: Txid(outpoint.txid.to_byte_array()),
            vout: outpoint.vout,
        }
    }
}

/// A spendable output owned by the wallet, as reported by the explorer.
///
/// Owned by the caller for the duration of one build; coin selection only
/// reads, filters, and orders these.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    /// Base58 address that controls the output.
    pub address: String,
    /// Value in satoshis.
    pub value: u64,
    pub confirmations: u64,
    /// Coinstake outputs cannot be spent before [`STAKE_MATURITY`].
    pub is_stake: bool,
    /// Locking script of the output; signed over as the script code.
    pub script_pubkey: Script,
}

impl UnspentOutput {
    /// Spendable now: any non-stake output, or a stake output at maturity.
    pub fn is_mature(&self) -> bool {
        !self.is_stake || self.confirmations >= STAKE_MATURITY
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Unlocking script. Empty until the input is signed.
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxInput {
    /// Unsigned input spending `previous_output`.
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: Script,
}

impl TxOutput {
    /// Serialized size of this output.
    pub fn size(&self) -> usize {
        output_size(self.script_pubkey.len())
    }
}

/// Serialized size of an output whose locking script is `script_len` bytes.
pub fn output_size(script_len: usize) -> usize {
    8 + VarInt(script_len as u64).size() + script_len
}

/// A transaction transferring value between scripts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    /// Consensus form of this transaction. Inputs carry no witness.
    pub fn to_bitcoin(&self) -> bitcoin::Transaction {
        bitcoin::Transaction {
            version: Version(self.version),
            lock_time: LockTime::from_consensus(self.lock_time),
            input: self
                .inputs
                .iter()
                .map(|input| bitcoin::TxIn {
                    previous_output: (&input.previous_output).into(),
                    script_sig: input.script_sig.clone().into(),
                    sequence: Sequence::from_consensus(input.sequence),
                    witness: Witness::new(),
                })
                .collect(),
            output: self
                .outputs
                .iter()
                .map(|output| bitcoin::TxOut {
                    value: Amount::from_sat(output.value),
                    script_pubkey: output.script_pubkey.clone().into(),
                })
                .collect(),
        }
    }

    /// Canonical wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        encode::serialize(&self.to_bitcoin())
    }

    /// Hex form of [`encode`](Self::encode), as accepted by `sendrawtransaction`.
    pub fn to_hex(&self) -> String {
        encode::serialize_hex(&self.to_bitcoin())
    }

    /// Decode a transaction, rejecting trailing bytes and witness data.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let tx: bitcoin::Transaction =
            encode::deserialize(bytes).map_err(|e| TransactionError::Decode(e.to_string()))?;
        Self::try_from(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Double SHA-256 of the encoding.
    pub fn txid(&self) -> Txid {
        Txid(self.to_bitcoin().compute_txid().to_byte_array())
    }

    /// Exact serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bitcoin().total_size()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

impl TryFrom<bitcoin::Transaction> for Transaction {
    type Error = TransactionError;

    fn try_from(tx: bitcoin::Transaction) -> Result<Self, Self::Error> {
        if let Some(i) = tx.input.iter().position(|input| !input.witness.is_empty()) {
            return Err(TransactionError::UnexpectedWitness(i));
        }
        Ok(Self {
            version: tx.version.0,
            inputs: tx
                .input
                .into_iter()
                .map(|input| TxInput {
                    previous_output: input.previous_output.into(),
                    script_sig: input.script_sig.into(),
                    sequence: input.sequence.to_consensus_u32(),
                })
                .collect(),
            outputs: tx
                .output
                .into_iter()
                .map(|output| TxOutput {
                    value: output.value.to_sat(),
                    script_pubkey: output.script_pubkey.into(),
                })
                .collect(),
            lock_time: tx.lock_time.to_consensus_u32(),
        })
    }
}
