//! secp256k1 key handling and transaction input signing.
//!
//! # Signing scheme
//!
//! Inputs are signed with the legacy `SIGHASH_ALL` digest computed by
//! [`SighashCache::legacy_signature_hash`], with the spent output's locking
//! script as the script code.
//!
//! The signature script of a pay-to-pubkey-hash input is
//! `<DER signature || hash type> <33-byte compressed public key>`.
//! Signing never mutates the skeleton it reads, so inputs may be signed in
//! any order; the assembler signs them in increasing index order.

use bitcoin::ecdsa;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::script::Builder;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use secp256k1::{Message, SecretKey, SECP256K1};
use std::fmt;
use zeroize::Zeroizing;

use crate::address::Network;
use crate::error::CryptoError;
use crate::script::{Instruction, Script};
use crate::types::Transaction;

/// Compression flag appended to WIF payloads.
const WIF_COMPRESSED: u8 = 0x01;

/// RIPEMD-160 of SHA-256, the hash committed to by pay-to-pubkey-hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// secp256k1 keypair for signing transactions.
///
/// Held by the wallet for its whole lifetime and only borrowed while an
/// input is being signed. The secret is erased on drop.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self::from_secret_key(secret))
    }

    fn from_secret_key(secret: SecretKey) -> Self {
        let public = PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(SECP256K1, &secret),
        };
        Self { secret, public }
    }

    /// Import a compressed-key WIF string for `network`.
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, CryptoError> {
        let payload = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(None)
                .into_vec()
                .map_err(|e| CryptoError::InvalidWif(e.to_string()))?,
        );
        match payload.as_slice() {
            [prefix, secret @ .., WIF_COMPRESSED] if secret.len() == 32 => {
                if *prefix != network.wif_prefix() {
                    return Err(CryptoError::InvalidWif(format!(
                        "prefix {prefix} is not {network}"
                    )));
                }
                let secret =
                    SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidSecretKey)?;
                Ok(Self::from_secret_key(secret))
            }
            _ => Err(CryptoError::InvalidWif(format!(
                "unsupported payload length {}",
                payload.len()
            ))),
        }
    }

    /// Export as a compressed-key WIF string.
    pub fn to_wif(&self, network: Network) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(network.wif_prefix());
        payload.extend_from_slice(&self.secret.secret_bytes());
        payload.push(WIF_COMPRESSED);
        bs58::encode(payload.as_slice()).with_check().into_string()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Low-S ECDSA signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: [u8; 32]) -> secp256k1::ecdsa::Signature {
        SECP256K1.sign_ecdsa(&Message::from_digest(digest), &self.secret)
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public)
            .finish_non_exhaustive()
    }
}

/// Compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            secp256k1::PublicKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    /// 33-byte compressed encoding.
    pub fn to_bytes(&self) -> [u8; 33] {
        self.inner.serialize()
    }

    /// hash160 of the compressed key, as committed to by addresses.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify_digest(
        &self,
        digest: [u8; 32],
        sig: &secp256k1::ecdsa::Signature,
    ) -> Result<(), CryptoError> {
        SECP256K1
            .verify_ecdsa(&Message::from_digest(digest), sig, &self.inner)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

fn check_index(tx: &Transaction, input_index: usize) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }
    Ok(())
}

/// Legacy signature hash for one input.
///
/// `script_code` is the locking script of the output being spent.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash_type: EcdsaSighashType,
) -> Result<[u8; 32], CryptoError> {
    check_index(tx, input_index)?;
    let unsigned = tx.to_bitcoin();
    let sighash = SighashCache::new(&unsigned)
        .legacy_signature_hash(input_index, script_code.as_script(), sighash_type.to_u32())
        .map_err(|_| CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;
    Ok(sighash.to_byte_array())
}

/// Produce the signature script for one input without touching the transaction.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    keypair: &KeyPair,
) -> Result<Script, CryptoError> {
    let digest = signature_hash(tx, input_index, script_code, EcdsaSighashType::All)?;
    let signature = ecdsa::Signature::sighash_all(keypair.sign_digest(digest));
    let script_sig = Builder::new()
        .push_slice(signature.serialize())
        .push_slice(keypair.public_key().to_bytes())
        .into_script();
    Ok(script_sig.into())
}

/// Sign a transaction input in place.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    script_code: &Script,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let script_sig = sign_input(tx, input_index, script_code, keypair)?;
    tx.inputs[input_index].script_sig = script_sig;
    Ok(())
}

/// Verify a signed pay-to-pubkey-hash input against the script it spends.
///
/// Checks that:
/// 1. The signature script is exactly `<sig> <pubkey>`
/// 2. hash160 of the public key matches the one in `script_code`
/// 3. The signature verifies against the `SIGHASH_ALL` digest
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> Result<(), CryptoError> {
    check_index(tx, input_index)?;

    let malformed = || CryptoError::MalformedScriptSig(input_index);
    let pushes = tx.inputs[input_index]
        .script_sig
        .instructions()
        .map_err(|_| malformed())?;
    let (sig, pubkey) = match pushes.as_slice() {
        [Instruction::Push(sig), Instruction::Push(pk)] => (sig, pk),
        _ => return Err(malformed()),
    };
    let sig = ecdsa::Signature::from_slice(sig).map_err(|_| CryptoError::InvalidSignature)?;
    if sig.sighash_type != EcdsaSighashType::All {
        return Err(malformed());
    }

    let pk = PublicKey::from_slice(pubkey)?;
    if script_code.pubkey_hash() != Some(pk.pubkey_hash()) {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let digest = signature_hash(tx, input_index, script_code, EcdsaSighashType::All)?;
    pk.verify_digest(digest, &sig.signature)
}
