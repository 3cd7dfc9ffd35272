//! Error types for Ember primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")] Empty,
    #[error("negative amount: {0}")] Negative(String),
    #[error("malformed amount: {0}")] Malformed(String),
    #[error("fractional satoshi amount: {0}")] Fractional(String),
    #[error("amount overflow: {0}")] Overflow(String),
    #[error("zero value: {0}")] Zero(&'static str),
    #[error("invalid fee rate: {0}")] InvalidFeeRate(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("invalid hex in {field}: {reason}")] InvalidHex { field: &'static str, reason: String },
    #[error("empty {0}")] EmptyData(&'static str),
    #[error("contract address must be {expected} bytes, got {got}")] InvalidContractAddress { expected: usize, got: usize },
    #[error("push of {0} bytes exceeds script limits")] PushTooLarge(usize),
    #[error("malformed script: {0}")] Malformed(String),
    #[error("script number out of range: {0}")] NumberOutOfRange(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("malformed transaction: {0}")] Decode(String),
    #[error("witness data on input {0}")] UnexpectedWitness(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid txid: {0}")] InvalidTxid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid secret key")] InvalidSecretKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("malformed signature script on input {0}")] MalformedScriptSig(usize),
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("invalid WIF: {0}")] InvalidWif(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58check: {0}")] InvalidBase58(String),
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("unknown version byte: {0}")] UnknownVersion(u8),
    #[error("address belongs to {found}, expected {expected}")] WrongNetwork { expected: String, found: String },
    #[error("unknown network: {0}")] UnknownNetwork(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplorerError {
    #[error("request failed: {0}")] Request(String),
    #[error("unexpected status {status}: {body}")] Status { status: u16, body: String },
    #[error("malformed response: {0}")] Decode(String),
    #[error("no explorer configured for network {0}")] Unconfigured(String),
}
