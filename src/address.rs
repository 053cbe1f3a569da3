//! Address classification, script derivation, and Electrum scripthashes.

use crate::network::NetworkParams;
use crate::{Result, WalletError};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, CompressedPublicKey, PublicKey, Script, ScriptBuf, XOnlyPublicKey};
use bitcoin_hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Spendable output forms this wallet understands. `P2SH` is the BIP49
/// p2wpkh-in-p2sh wrapper, the only script-hash form the wallet produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    P2PKH,
    P2SH,
    P2WPKH,
    P2TR,
    Unknown,
}

impl AddressType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::P2PKH => "p2pkh",
            AddressType::P2SH => "p2sh",
            AddressType::P2WPKH => "p2wpkh",
            AddressType::P2TR => "p2tr",
            AddressType::Unknown => "unknown",
        }
    }
}

impl FromStr for AddressType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "p2pkh" => Ok(AddressType::P2PKH),
            "p2sh" | "p2sh-p2wpkh" => Ok(AddressType::P2SH),
            "p2wpkh" => Ok(AddressType::P2WPKH),
            "p2tr" => Ok(AddressType::P2TR),
            _ => Err(WalletError::Parse(format!("Unknown address type: {s}"))),
        }
    }
}

/// Classify an address by prefix alone. Unknown prefixes are a value, not
/// an error, so callers can turn them into user-facing validation messages.
pub fn classify(address: &str) -> AddressType {
    if address.starts_with("bc1q") || address.starts_with("tb1q") || address.starts_with("bcrt1q")
    {
        AddressType::P2WPKH
    } else if address.starts_with("bc1p")
        || address.starts_with("tb1p")
        || address.starts_with("bcrt1p")
    {
        AddressType::P2TR
    } else if address.starts_with('1') || address.starts_with('m') || address.starts_with('n') {
        AddressType::P2PKH
    } else if address.starts_with('3') || address.starts_with('2') {
        AddressType::P2SH
    } else {
        AddressType::Unknown
    }
}

/// Everything the indexer and the input builder need to know about an
/// address: its type, output script, and Electrum scripthash.
#[derive(Debug, Clone)]
pub struct AddressLookup {
    pub address_type: AddressType,
    pub script: ScriptBuf,
    pub output: String,
    pub scripthash: String,
}

/// Parse an address against the configured network and derive its script
/// and scripthash. Wrong-network or malformed addresses fail here.
pub fn detect(address: &str, params: &NetworkParams) -> Result<AddressLookup> {
    let parsed = Address::from_str(address)?.require_network(params.network)?;
    let script = parsed.script_pubkey();
    let scripthash = electrum_scripthash(&script);
    Ok(AddressLookup {
        address_type: classify(address),
        output: hex::encode(script.as_bytes()),
        script,
        scripthash,
    })
}

/// sha256 of the output script, byte-reversed, lowercase hex. The key the
/// ElectrumX family of indexers uses for address subscriptions.
pub fn electrum_scripthash(script: &Script) -> String {
    let digest = sha256::Hash::hash(script.as_bytes());
    let mut bytes = digest.to_byte_array();
    bytes.reverse();
    hex::encode(bytes)
}

/// The output script `public_key` produces at each supported address type.
pub fn script_for_pubkey(
    secp: &Secp256k1<All>,
    public_key: &PublicKey,
    address_type: AddressType,
) -> Result<ScriptBuf> {
    match address_type {
        AddressType::P2PKH => Ok(ScriptBuf::new_p2pkh(&public_key.pubkey_hash())),
        AddressType::P2WPKH => {
            let compressed = CompressedPublicKey::try_from(*public_key)?;
            Ok(ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()))
        }
        AddressType::P2SH => {
            let compressed = CompressedPublicKey::try_from(*public_key)?;
            let redeem = ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());
            Ok(ScriptBuf::new_p2sh(&redeem.script_hash()))
        }
        AddressType::P2TR => {
            let xonly = XOnlyPublicKey::from(public_key.inner);
            Ok(ScriptBuf::new_p2tr(secp, xonly, None))
        }
        AddressType::Unknown => Err(WalletError::UnsupportedAddressType(
            "cannot derive a script for an unknown address type".to_string(),
        )),
    }
}

/// Strip the parity byte of a 33-byte compressed key; 32-byte keys pass
/// through unchanged.
pub fn to_x_only(public_key: &[u8]) -> Result<XOnlyPublicKey> {
    match public_key.len() {
        32 => Ok(XOnlyPublicKey::from_slice(public_key)?),
        33 => Ok(XOnlyPublicKey::from_slice(&public_key[1..])?),
        n => Err(WalletError::Crypto(format!(
            "invalid public key length: {n}"
        ))),
    }
}

/// Render a script back to an address string for display.
pub fn address_from_script(script: &Script, params: &NetworkParams) -> Result<String> {
    Ok(Address::from_script(script, params.network)?.to_string())
}
