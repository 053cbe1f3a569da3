//! Atomicals Wallet Common Library
//!
//! Core transaction engine for an Atomicals-aware Bitcoin wallet: balance
//! classification, coin selection, probe-signed fee estimation, PSBT
//! construction and signing, and FT/NFT transfer building.
//!
//! The library is structured around trait abstractions that keep the same
//! engine usable against any transport or key store:
//! - `traits`: collaborator seams (indexer, mempool, fee oracle, broadcast, keyring)
//! - `balance`: UTXO classification into regulars, FTs, NFTs, and merged outputs
//! - `transaction` / `tokens`: coin selection and transfer construction
//! - `fee`: probe-signed size measurement and deposit math
//! - `signer`: PSBT signing and finalization, `LocalSigner`, `KeyringRegistry`
//! - `wallet`: the `Wallet<P>` facade wiring the engine to a provider

// Core modules
pub mod address;
pub mod balance;
pub mod electrumx;
pub mod error;
pub mod fee;
pub mod input;
pub mod network;
pub mod signer;
pub mod tokens;
pub mod traits;
pub mod transaction;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock_provider;

// Re-export key types and traits for convenience
pub use error::{Result, WalletError};
pub use traits::*;

pub use address::{AddressLookup, AddressType};
pub use network::{EndpointsConfig, NetworkParams, WalletNetwork};
pub use signer::{KeyringRegistry, LocalSigner, SignOptions};
pub use types::*;
pub use wallet::Wallet;

// Re-export external types for convenience
pub use bitcoin::{Address, Network, ScriptBuf, Transaction};
pub use serde_json::Value as JsonValue;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Utility re-exports for common operations
pub mod prelude {
    pub use crate::traits::*;
    pub use crate::address::AddressType;
    pub use crate::network::NetworkParams;
    pub use crate::signer::{KeyringRegistry, LocalSigner, SignOptions};
    pub use crate::types::*;
    pub use crate::wallet::Wallet;
    pub use crate::{Result, WalletError};
    pub use bitcoin::{Address, Network, ScriptBuf, Transaction};
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert_eq!(NAME, "atomicals-wallet-common");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_error_conversions() {
        let anyhow_err = anyhow::anyhow!("test error");
        let wallet_err: WalletError = anyhow_err.into();
        assert!(matches!(wallet_err, WalletError::Other(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let wallet_err: WalletError = json_err.into();
        assert!(matches!(wallet_err, WalletError::Serialization(_)));
    }
}
