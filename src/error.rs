//! Error taxonomy for wallet construction, signing and broadcast flows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletError {
    JsonRpc(String),
    Network(String),
    /// Spendable balance cannot cover the requested amount plus fees.
    InsufficientBalance {
        available: u64,
        required: u64,
    },
    InvalidRecipient(String),
    /// Token input and output values must match exactly; selection never
    /// adjusts token amounts on the caller's behalf.
    TokenQuantityMismatch {
        inputs: u64,
        outputs: u64,
    },
    /// The indexer refused the signed transaction; it must not be
    /// broadcast.
    ValidationRejected(String),
    Signing(String),
    UnsupportedAddress(String),
    UnsupportedAddressType(String),
    Serialization(String),
    Configuration(String),
    InvalidParameters(String),
    Transaction(String),
    Crypto(String),
    Io(String),
    Parse(String),
    Hex(String),
    UncompressedPublicKey,
    Other(String),
}

impl core::fmt::Display for WalletError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WalletError::JsonRpc(msg) => write!(f, "JSON-RPC error: {msg}"),
            WalletError::Network(msg) => write!(f, "Network error: {msg}"),
            WalletError::InsufficientBalance {
                available,
                required,
            } => write!(
                f,
                "Insufficient balance: {available} sat available, {required} sat required"
            ),
            WalletError::InvalidRecipient(addr) => write!(f, "Invalid recipient address: {addr}"),
            WalletError::TokenQuantityMismatch { inputs, outputs } => write!(
                f,
                "Invalid input and output does not match for token: {inputs} in, {outputs} out"
            ),
            WalletError::ValidationRejected(msg) => {
                write!(f, "Transaction rejected by validator: {msg}")
            }
            WalletError::Signing(msg) => write!(f, "Signing error: {msg}"),
            WalletError::UnsupportedAddress(msg) => write!(f, "Unsupported address: {msg}"),
            WalletError::UnsupportedAddressType(msg) => {
                write!(f, "Unsupported address type: {msg}")
            }
            WalletError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            WalletError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            WalletError::InvalidParameters(msg) => write!(f, "Invalid parameters: {msg}"),
            WalletError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            WalletError::Crypto(msg) => write!(f, "Cryptography error: {msg}"),
            WalletError::Io(msg) => write!(f, "I/O error: {msg}"),
            WalletError::Parse(msg) => write!(f, "Parse error: {msg}"),
            WalletError::Hex(msg) => write!(f, "Hex error: {msg}"),
            WalletError::UncompressedPublicKey => write!(f, "Uncompressed public key error"),
            WalletError::Other(msg) => write!(f, "Other error: {msg}"),
        }
    }
}

impl std::error::Error for WalletError {}

pub type Result<T> = core::result::Result<T, WalletError>;

impl From<bitcoin::key::UncompressedPublicKeyError> for WalletError {
    fn from(_: bitcoin::key::UncompressedPublicKeyError) -> Self {
        WalletError::UncompressedPublicKey
    }
}

impl From<core::convert::Infallible> for WalletError {
    fn from(never: core::convert::Infallible) -> Self {
        match never {}
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::Other(format!("{err}"))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Serialization(format!("{err}"))
    }
}

impl From<bitcoin::address::ParseError> for WalletError {
    fn from(err: bitcoin::address::ParseError) -> Self {
        WalletError::UnsupportedAddress(format!("{err:?}"))
    }
}

impl From<bitcoin::address::FromScriptError> for WalletError {
    fn from(err: bitcoin::address::FromScriptError) -> Self {
        WalletError::UnsupportedAddress(format!("{err:?}"))
    }
}

impl From<bitcoin::sighash::TaprootError> for WalletError {
    fn from(err: bitcoin::sighash::TaprootError) -> Self {
        WalletError::Transaction(format!("{err:?}"))
    }
}

impl From<bitcoin::sighash::P2wpkhError> for WalletError {
    fn from(err: bitcoin::sighash::P2wpkhError) -> Self {
        WalletError::Transaction(format!("{err:?}"))
    }
}

impl From<bitcoin::consensus::encode::Error> for WalletError {
    fn from(err: bitcoin::consensus::encode::Error) -> Self {
        WalletError::Transaction(format!("{err}"))
    }
}

impl From<bitcoin::blockdata::transaction::ParseOutPointError> for WalletError {
    fn from(err: bitcoin::blockdata::transaction::ParseOutPointError) -> Self {
        WalletError::Transaction(format!("{err:?}"))
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Io(format!("{err:?}"))
    }
}

impl From<bitcoin::psbt::Error> for WalletError {
    fn from(err: bitcoin::psbt::Error) -> Self {
        WalletError::Transaction(format!("PSBT error: {err}"))
    }
}

impl From<bitcoin::psbt::ExtractTxError> for WalletError {
    fn from(err: bitcoin::psbt::ExtractTxError) -> Self {
        WalletError::Transaction(format!("PSBT extraction error: {err}"))
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self {
        WalletError::Hex(format!("{err:?}"))
    }
}

impl From<bitcoin::hashes::hex::HexToBytesError> for WalletError {
    fn from(err: bitcoin::hashes::hex::HexToBytesError) -> Self {
        WalletError::Hex(format!("{err:?}"))
    }
}

impl From<bitcoin::hashes::hex::HexToArrayError> for WalletError {
    fn from(err: bitcoin::hashes::hex::HexToArrayError) -> Self {
        WalletError::Hex(format!("{err:?}"))
    }
}

impl From<core::num::ParseIntError> for WalletError {
    fn from(err: core::num::ParseIntError) -> Self {
        WalletError::Parse(format!("Failed to parse integer: {err}"))
    }
}

impl From<bitcoin::key::FromSliceError> for WalletError {
    fn from(err: bitcoin::key::FromSliceError) -> Self {
        WalletError::Crypto(format!("{err:?}"))
    }
}

impl From<bitcoin::secp256k1::Error> for WalletError {
    fn from(err: bitcoin::secp256k1::Error) -> Self {
        WalletError::Crypto(format!("{err:?}"))
    }
}

impl From<base64::DecodeError> for WalletError {
    fn from(err: base64::DecodeError) -> Self {
        WalletError::Parse(format!("Base64 decode error: {err}"))
    }
}

impl From<std::string::FromUtf8Error> for WalletError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        WalletError::Parse(err.to_string())
    }
}
