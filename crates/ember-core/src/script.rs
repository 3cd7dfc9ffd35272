//! Script encoder for standard payment outputs and contract invocations.
//!
//! Contract outputs carry their execution budget in the locking script:
//!
//! ```text
//! CREATE: OP_4 <gas_limit> <gas_price> <bytecode>                  OP_CREATE
//! CALL:   OP_4 <gas_limit> <gas_price> <payload> <contract_address> OP_CALL
//! ```
//!
//! `gas_limit` and `gas_price` are pushed as minimal script numbers, the
//! same little-endian sign-magnitude encoding the script interpreter uses
//! when it pops them back off the stack. Bytecode, payload, and address are
//! always data pushes, even when a single byte would fit a small-integer
//! opcode.

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{OP_PUSHNUM_1, OP_PUSHNUM_16, OP_PUSHNUM_NEG1};
use bitcoin::opcodes::Opcode;
use bitcoin::script::{self, Builder, PushBytes, ScriptBuf};
use bitcoin::PubkeyHash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::{CONTRACT_ADDRESS_LEN, CONTRACT_VM_VERSION};
use crate::error::ScriptError;

/// Contract opcodes. Standard opcodes come from [`bitcoin::opcodes::all`].
pub mod opcodes {
    /// Deploy the pushed bytecode.
    pub const OP_CREATE: u8 = 0xc1;
    /// Call the contract at the pushed address.
    pub const OP_CALL: u8 = 0xc2;
}

use opcodes::*;

/// A serialized locking or unlocking script.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(ScriptBuf);

/// One parsed script element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// A data push. `OP_0` parses as an empty push.
    Push(Vec<u8>),
    /// Any other opcode, including `OP_1NEGATE` and `OP_1`..`OP_16`.
    Op(u8),
}

impl Instruction {
    /// Numeric value this instruction leaves on the stack, if it is a
    /// minimal script number of at most four bytes or a small-integer opcode.
    pub fn script_num(&self) -> Option<i64> {
        match self {
            Instruction::Push(bytes) => script::read_scriptint(bytes).ok(),
            Instruction::Op(op) if *op == OP_PUSHNUM_NEG1.to_u8() => Some(-1),
            Instruction::Op(op)
                if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(op) =>
            {
                Some(i64::from(op - OP_PUSHNUM_1.to_u8() + 1))
            }
            Instruction::Op(_) => None,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self(ScriptBuf::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(ScriptBuf::from_bytes(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, ScriptError> {
        let bytes = hex::decode(s).map_err(|e| ScriptError::InvalidHex {
            field: "script",
            reason: e.to_string(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Borrow as a [`bitcoin::Script`] for consensus encoding and sighash.
    pub fn as_script(&self) -> &script::Script {
        self.0.as_script()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn is_p2pkh(&self) -> bool {
        self.0.is_p2pkh()
    }

    /// The 20-byte hash a pay-to-pubkey-hash script commits to.
    pub fn pubkey_hash(&self) -> Option<[u8; 20]> {
        if !self.is_p2pkh() {
            return None;
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.as_bytes()[3..23]);
        Some(hash)
    }

    /// Whether the script ends in `OP_CREATE` or `OP_CALL`.
    pub fn is_contract(&self) -> bool {
        matches!(self.as_bytes().last(), Some(&OP_CREATE) | Some(&OP_CALL))
    }

    /// Parse the script into pushes and opcodes.
    pub fn instructions(&self) -> Result<Vec<Instruction>, ScriptError> {
        self.0
            .instructions()
            .map(|ins| match ins {
                Ok(script::Instruction::PushBytes(data)) => {
                    Ok(Instruction::Push(data.as_bytes().to_vec()))
                }
                Ok(script::Instruction::Op(op)) => Ok(Instruction::Op(op.to_u8())),
                Err(e) => Err(ScriptError::Malformed(e.to_string())),
            })
            .collect()
    }
}

impl From<ScriptBuf> for Script {
    fn from(script: ScriptBuf) -> Self {
        Self(script)
    }
}

impl From<Script> for ScriptBuf {
    fn from(script: Script) -> Self {
        script.0
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Decode a caller-supplied hex field (an optional `0x` prefix is allowed).
pub fn decode_hex_field(field: &'static str, s: &str) -> Result<Vec<u8>, ScriptError> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.is_empty() {
        return Err(ScriptError::EmptyData(field));
    }
    hex::decode(body).map_err(|e| ScriptError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Standard pay-to-pubkey-hash locking script.
pub fn pay_to_pubkey_hash(pubkey_hash: &[u8; 20]) -> Script {
    Script(ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*pubkey_hash)))
}

fn gas_num(field: &'static str, value: u64) -> Result<i64, ScriptError> {
    if value == 0 {
        return Err(ScriptError::NumberOutOfRange(format!("{field} is zero")));
    }
    i64::try_from(value).map_err(|_| ScriptError::NumberOutOfRange(format!("{field} {value}")))
}

fn push_data(builder: Builder, data: &[u8]) -> Result<Builder, ScriptError> {
    let push = <&PushBytes>::try_from(data).map_err(|_| ScriptError::PushTooLarge(data.len()))?;
    Ok(builder.push_slice(push))
}

fn contract_prefix(gas_limit: u64, gas_price: u64) -> Result<Builder, ScriptError> {
    let gas_limit = gas_num("gas limit", gas_limit)?;
    let gas_price = gas_num("gas price", gas_price)?;
    Ok(Builder::new()
        .push_int(i64::from(CONTRACT_VM_VERSION))
        .push_int(gas_limit)
        .push_int(gas_price))
}

/// `OP_4 <gas_limit> <gas_price> <code> OP_CREATE`.
pub fn contract_create(gas_limit: u64, gas_price: u64, code: &[u8]) -> Result<Script, ScriptError> {
    if code.is_empty() {
        return Err(ScriptError::EmptyData("contract bytecode"));
    }
    let builder = push_data(contract_prefix(gas_limit, gas_price)?, code)?;
    Ok(Script(builder.push_opcode(Opcode::from(OP_CREATE)).into_script()))
}

/// `OP_4 <gas_limit> <gas_price> <payload> <contract_address> OP_CALL`.
pub fn contract_call(
    gas_limit: u64,
    gas_price: u64,
    payload: &[u8],
    contract_address: &[u8],
) -> Result<Script, ScriptError> {
    if payload.is_empty() {
        return Err(ScriptError::EmptyData("call payload"));
    }
    if contract_address.len() != CONTRACT_ADDRESS_LEN {
        return Err(ScriptError::InvalidContractAddress {
            expected: CONTRACT_ADDRESS_LEN,
            got: contract_address.len(),
        });
    }
    let builder = push_data(contract_prefix(gas_limit, gas_price)?, payload)?;
    let builder = push_data(builder, contract_address)?;
    Ok(Script(builder.push_opcode(Opcode::from(OP_CALL)).into_script()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::{
        OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160, OP_PUSHBYTES_0, OP_PUSHDATA2,
        OP_PUSHNUM_4,
    };

    const OP_4: u8 = 0x54;
    const OP_16: u8 = 0x60;

    fn contract_addr_one() -> Vec<u8> {
        let mut a = vec![0u8; 20];
        a[19] = 1;
        a
    }

    #[test]
    fn contract_call_opcode_sequence() {
        let payload = [0xaa, 0xbb, 0xcc];
        let addr = contract_addr_one();
        let script = contract_call(250_000, 40, &payload, &addr).unwrap();

        assert_eq!(
            script.instructions().unwrap(),
            vec![
                Instruction::Op(OP_PUSHNUM_4.to_u8()),
                Instruction::Push(vec![0x90, 0xd0, 0x03]),
                Instruction::Push(vec![0x28]),
                Instruction::Push(payload.to_vec()),
                Instruction::Push(addr.clone()),
                Instruction::Op(OP_CALL),
            ]
        );

        let mut expected = vec![OP_4, 0x03, 0x90, 0xd0, 0x03, 0x01, 0x28, 0x03, 0xaa, 0xbb, 0xcc, 0x14];
        expected.extend_from_slice(&addr);
        expected.push(OP_CALL);
        assert_eq!(script.as_bytes(), expected.as_slice());
        assert!(script.is_contract());
    }

    #[test]
    fn gas_values_read_back_as_script_numbers() {
        let script = contract_create(3_000_000, 40, &[0x60, 0x80]).unwrap();
        let ins = script.instructions().unwrap();
        assert_eq!(ins.len(), 5);
        assert_eq!(ins[0].script_num(), Some(4));
        assert_eq!(ins[1].script_num(), Some(3_000_000));
        assert_eq!(ins[2].script_num(), Some(40));
        assert_eq!(ins[3], Instruction::Push(vec![0x60, 0x80]));
        assert_eq!(ins[4], Instruction::Op(OP_CREATE));
    }

    #[test]
    fn script_num_of_non_numbers() {
        assert_eq!(Instruction::Op(OP_CALL).script_num(), None);
        assert_eq!(Instruction::Op(OP_PUSHNUM_NEG1.to_u8()).script_num(), Some(-1));
        // padded encoding is not minimal
        assert_eq!(Instruction::Push(vec![0x28, 0x00]).script_num(), None);
        assert_eq!(Instruction::Push(vec![0x80, 0x00]).script_num(), Some(128));
    }

    #[test]
    fn small_gas_price_uses_small_int_opcode() {
        let script = contract_create(100, 16, &[0xfe]).unwrap();
        // OP_4, push 100, OP_16, push fe, OP_CREATE
        assert_eq!(script.as_bytes(), &[OP_4, 0x01, 100, OP_16, 0x01, 0xfe, OP_CREATE]);
    }

    #[test]
    fn single_byte_payload_is_a_data_push() {
        let script = contract_call(250_000, 40, &[0x05], &[0u8; 20]).unwrap();
        let ins = script.instructions().unwrap();
        assert_eq!(ins[3], Instruction::Push(vec![0x05]));
        assert_eq!(&script.as_bytes()[7..9], &[0x01, 0x05]);
        // a zero address byte is never collapsed to OP_0 either
        assert_eq!(ins[4], Instruction::Push(vec![0u8; 20]));
    }

    #[test]
    fn small_int_bytecode_is_a_data_push() {
        for byte in [0x00, 0x01, 0x10, 0x81] {
            let script = contract_create(200_000, 40, &[byte]).unwrap();
            let bytes = script.as_bytes();
            assert_eq!(&bytes[bytes.len() - 3..], &[0x01, byte, OP_CREATE]);
            assert_eq!(script.instructions().unwrap()[3], Instruction::Push(vec![byte]));
        }
    }

    #[test]
    fn large_bytecode_uses_pushdata2() {
        let code = vec![0x60; 300];
        let script = contract_create(200_000, 40, &code).unwrap();
        let ins = script.instructions().unwrap();
        assert_eq!(ins[3], Instruction::Push(code));
        assert!(script.as_bytes().contains(&OP_PUSHDATA2.to_u8()));
    }

    #[test]
    fn contract_call_rejects_bad_address() {
        let err = contract_call(200_000, 40, &[1], &[0u8; 19]).unwrap_err();
        assert_eq!(
            err,
            ScriptError::InvalidContractAddress { expected: 20, got: 19 }
        );
    }

    #[test]
    fn contract_scripts_reject_empty_data_and_zero_gas() {
        assert!(contract_create(200_000, 40, &[]).is_err());
        assert!(contract_call(200_000, 40, &[], &contract_addr_one()).is_err());
        assert!(contract_create(0, 40, &[1]).is_err());
        assert!(contract_create(1, 0, &[1]).is_err());
    }

    #[test]
    fn gas_above_script_num_range_rejected() {
        assert!(matches!(
            contract_create(u64::MAX, 1, &[1]).unwrap_err(),
            ScriptError::NumberOutOfRange(_)
        ));
    }

    #[test]
    fn p2pkh_layout() {
        let script = pay_to_pubkey_hash(&[0x11; 20]);
        assert_eq!(script.len(), 25);
        assert!(script.is_p2pkh());
        assert!(!script.is_contract());
        assert_eq!(script.pubkey_hash(), Some([0x11; 20]));
        assert_eq!(
            script.instructions().unwrap(),
            vec![
                Instruction::Op(OP_DUP.to_u8()),
                Instruction::Op(OP_HASH160.to_u8()),
                Instruction::Push(vec![0x11; 20]),
                Instruction::Op(OP_EQUALVERIFY.to_u8()),
                Instruction::Op(OP_CHECKSIG.to_u8()),
            ]
        );
    }

    #[test]
    fn pubkey_hash_only_for_p2pkh() {
        let p2pk = Script::from_bytes([vec![0x21], vec![0x02; 33], vec![OP_CHECKSIG.to_u8()]].concat());
        assert_eq!(p2pk.pubkey_hash(), None);
        assert_eq!(Script::new().pubkey_hash(), None);
    }

    #[test]
    fn empty_push_parses_as_empty_data() {
        let script = Script::from_bytes(vec![OP_PUSHBYTES_0.to_u8()]);
        assert_eq!(script.instructions().unwrap(), vec![Instruction::Push(Vec::new())]);
    }

    #[test]
    fn hex_field_decoding() {
        assert_eq!(decode_hex_field("payload", "0xAABBCC").unwrap(), vec![0xaa, 0xbb, 0xcc]);
        assert_eq!(decode_hex_field("payload", "aabbcc").unwrap(), vec![0xaa, 0xbb, 0xcc]);
        assert_eq!(
            decode_hex_field("payload", "").unwrap_err(),
            ScriptError::EmptyData("payload")
        );
        assert!(matches!(
            decode_hex_field("payload", "abc").unwrap_err(),
            ScriptError::InvalidHex { .. }
        ));
        assert!(decode_hex_field("payload", "zz").is_err());
    }

    #[test]
    fn truncated_push_detected() {
        let script = Script::from_bytes(vec![0x05, 0x01]);
        assert!(matches!(
            script.instructions().unwrap_err(),
            ScriptError::Malformed(_)
        ));
    }

    #[test]
    fn serde_as_hex() {
        let script = pay_to_pubkey_hash(&[0x22; 20]);
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, format!("\"{}\"", script.to_hex()));
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }
}
