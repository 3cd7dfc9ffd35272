//! Contract invocation parameters.
//!
//! A contract create or call is funded like a payment plus a gas budget:
//! the script output carries the transfer amount and a non-serialized
//! [`Destination::GasBudget`](crate::coin_selection::Destination) request
//! reserves `gas_limit * gas_price` for execution.

use ember_core::amount::gas_budget;
use ember_core::script::{contract_call, contract_create, decode_hex_field, Script};

use crate::coin_selection::OutputRequest;
use crate::error::WalletError;

/// Gas and payload of one contract invocation.
///
/// `contract_address` absent means a create with `payload_hex` as bytecode;
/// present means a call of that contract with `payload_hex` as ABI data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInvocationParams {
    pub gas_limit: u64,
    /// Satoshis per unit of gas.
    pub gas_price: u64,
    pub payload_hex: String,
    /// 20-byte contract address, hex.
    pub contract_address: Option<String>,
}

/// Decoded form of [`ContractInvocationParams`].
struct Decoded {
    payload: Vec<u8>,
    contract_address: Option<Vec<u8>>,
}

impl ContractInvocationParams {
    pub fn create(code_hex: impl Into<String>, gas_limit: u64, gas_price: u64) -> Self {
        Self {
            gas_limit,
            gas_price,
            payload_hex: code_hex.into(),
            contract_address: None,
        }
    }

    pub fn call(
        contract_address: impl Into<String>,
        payload_hex: impl Into<String>,
        gas_limit: u64,
        gas_price: u64,
    ) -> Self {
        Self {
            gas_limit,
            gas_price,
            payload_hex: payload_hex.into(),
            contract_address: Some(contract_address.into()),
        }
    }

    pub fn is_create(&self) -> bool {
        self.contract_address.is_none()
    }

    fn decode(&self) -> Result<Decoded, WalletError> {
        let payload_field = if self.is_create() {
            "contract bytecode"
        } else {
            "call payload"
        };
        let payload = decode_hex_field(payload_field, &self.payload_hex)?;
        let contract_address = self
            .contract_address
            .as_deref()
            .map(|addr| decode_hex_field("contract address", addr))
            .transpose()?;
        Ok(Decoded {
            payload,
            contract_address,
        })
    }

    /// Check gas and hex fields without building anything.
    pub fn validate(&self) -> Result<(), WalletError> {
        self.gas_budget()?;
        self.script().map(|_| ())
    }

    /// `gas_limit * gas_price` in satoshis.
    pub fn gas_budget(&self) -> Result<u64, WalletError> {
        gas_budget(self.gas_limit, self.gas_price).map_err(|e| WalletError::ScriptEncoding(e.to_string()))
    }

    /// The contract create or call locking script.
    pub fn script(&self) -> Result<Script, WalletError> {
        let decoded = self.decode()?;
        let script = match &decoded.contract_address {
            None => contract_create(self.gas_limit, self.gas_price, &decoded.payload)?,
            Some(addr) => contract_call(self.gas_limit, self.gas_price, &decoded.payload, addr)?,
        };
        Ok(script)
    }

    /// Requests to fund: the script output carrying `amount`, then the gas budget.
    pub fn output_requests(&self, amount: u64) -> Result<Vec<OutputRequest>, WalletError> {
        let gas = self.gas_budget()?;
        Ok(vec![
            OutputRequest::to_script(self.script()?, amount),
            OutputRequest::gas_budget(gas),
        ])
    }
}
