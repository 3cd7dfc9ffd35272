//! # ember-wallet — single-key wallet with contract transaction support.
//!
//! Selects coins with a size-aware fee, assembles and signs payment,
//! contract-create, and contract-call transactions, and talks to an
//! Insight-style explorer for UTXOs, fee estimates, and broadcast.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`coin_selection`] — Mature-first greedy UTXO selection
//! - [`builder`] — Transaction builder with signing
//! - [`contract`] — Gas and payload of contract invocations
//! - [`provider`] — Tagged dapp-provider requests
//! - [`config`] — `WalletConfig` defaults, presets, and environment loading
//! - [`insight`] — HTTP explorer client
//! - [`wallet`] — High-level wallet composition

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod contract;
pub mod error;
pub mod insight;
pub mod provider;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{assemble, SignedTransaction, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector, Destination, OutputRequest};
pub use config::WalletConfig;
pub use contract::ContractInvocationParams;
pub use error::WalletError;
pub use insight::InsightExplorer;
pub use provider::{ProviderCall, ProviderResponse};
pub use wallet::{ContractTxOptions, SendTxOptions, Wallet};
