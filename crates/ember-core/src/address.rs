//! Pay-to-pubkey-hash addresses and network parameters.
//!
//! An address is the base58check encoding of a one-byte network prefix
//! followed by the 20-byte hash160 of a compressed public key:
//! - Mainnet: prefix 58 (addresses start with `Q`)
//! - Testnet / Regtest: prefix 120 (addresses start with `q`)

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{KeyPair, PublicKey};
use crate::error::AddressError;
use crate::script::{pay_to_pubkey_hash, Script};

/// Network parameters needed to encode addresses and keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Version byte of pay-to-pubkey-hash addresses.
    pub fn pubkey_hash_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 58,
            Network::Testnet | Network::Regtest => 120,
        }
    }

    /// Version byte of WIF-encoded secret keys.
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 128,
            Network::Testnet | Network::Regtest => 239,
        }
    }

    /// Base URL of the default Insight-style explorer API.
    pub fn default_explorer_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://qtum.info/api",
            Network::Testnet => "https://testnet.qtum.info/api",
            Network::Regtest => "http://localhost:3001/api",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A pay-to-pubkey-hash address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; 20],
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(public_key.pubkey_hash(), network)
    }

    /// The single address backing a keypair on `network`.
    pub fn from_keypair(keypair: &KeyPair, network: Network) -> Self {
        Self::from_public_key(keypair.public_key(), network)
    }

    /// Parse an address and require that it belongs to `network`.
    pub fn parse_for(s: &str, network: Network) -> Result<Self, AddressError> {
        let (prefix, pubkey_hash) = decode_payload(s)?;
        if prefix != network.pubkey_hash_prefix() {
            return Err(AddressError::WrongNetwork {
                expected: network.to_string(),
                found: format!("prefix {prefix}"),
            });
        }
        Ok(Self::from_pubkey_hash(pubkey_hash, network))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> Script {
        pay_to_pubkey_hash(&self.pubkey_hash)
    }
}

fn decode_payload(s: &str) -> Result<(u8, [u8; 20]), AddressError> {
    let payload = bs58::decode(s.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
    match payload.as_slice() {
        [prefix, hash @ ..] if hash.len() == 20 => {
            let mut pubkey_hash = [0u8; 20];
            pubkey_hash.copy_from_slice(hash);
            Ok((*prefix, pubkey_hash))
        }
        _ => Err(AddressError::InvalidLength(payload.len())),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.pubkey_hash_prefix());
        payload.extend_from_slice(&self.pubkey_hash);
        f.write_str(&bs58::encode(payload).with_check().into_string())
    }
}

/// Parses mainnet or testnet addresses. Regtest shares the testnet prefix;
/// use [`Address::parse_for`] to pin the network.
impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, pubkey_hash) = decode_payload(s)?;
        let network = [Network::Mainnet, Network::Testnet]
            .into_iter()
            .find(|n| n.pubkey_hash_prefix() == prefix)
            .ok_or(AddressError::UnknownVersion(prefix))?;
        Ok(Self::from_pubkey_hash(pubkey_hash, network))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
