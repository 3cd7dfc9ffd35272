//! # ember-core
//! Primitives for building transactions on a UTXO chain with contract opcodes.

pub mod address;
pub mod amount;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod traits;
pub mod types;
