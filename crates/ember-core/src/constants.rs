//! Protocol constants. All monetary values in satoshis (1 coin = 10^8 satoshis).

/// Satoshis per whole coin.
pub const COIN: u64 = 100_000_000;

/// Number of decimal places in a coin amount.
pub const COIN_DECIMALS: u32 = 8;

/// Confirmations after which a stake output may be spent.
///
/// Non-stake outputs are spendable at any depth.
pub const STAKE_MATURITY: u64 = 500;

/// Relay fee rate used when the network cannot produce an estimate, in
/// satoshis per byte: `ceil(0.004 coin / 1024 bytes)`.
pub const DEFAULT_FEE_RATE_PER_BYTE: u64 = (COIN * 4 / 1000).div_ceil(1024);

/// Confirmation target passed to fee estimation.
pub const DEFAULT_FEE_ESTIMATE_BLOCKS: u32 = 6;

/// Default gas limit for a contract call.
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 200_000;

/// Default gas limit for contract creation.
pub const DEFAULT_CREATE_GAS_LIMIT: u64 = 3_000_000;

/// Default gas price in satoshis per gas unit.
pub const DEFAULT_GAS_PRICE: u64 = 40;

/// Contract VM version pushed at the start of every contract script.
pub const CONTRACT_VM_VERSION: u8 = 4;

/// Length of a contract address in bytes.
pub const CONTRACT_ADDRESS_LEN: usize = 20;

/// Transaction version written by the assembler.
pub const TX_VERSION: i32 = 1;

/// Input sequence number (final, no relative lock).
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

// --- Size estimation ---

/// Version + lock time, excluding the input/output count varints.
pub const TX_FIXED_SIZE: usize = 4 + 4;

/// Outpoint (32-byte txid + 4-byte index) + sequence.
pub const TX_INPUT_BASE_SIZE: usize = 32 + 4 + 4;

/// Upper bound of a pay-to-pubkey-hash signature script:
/// push(72-byte low-S DER signature with hash type) + push(33-byte compressed key).
pub const P2PKH_SCRIPT_SIG_SIZE: usize = 1 + 72 + 1 + 33;

/// Budgeted size of one signed pay-to-pubkey-hash input.
pub const TX_INPUT_SIZE: usize = TX_INPUT_BASE_SIZE + 1 + P2PKH_SCRIPT_SIG_SIZE;

/// Length of a pay-to-pubkey-hash locking script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// Maximum payload of a transaction the assembler will emit.
pub const MAX_TX_SIZE: usize = 1_000_000;
