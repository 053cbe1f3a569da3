//! Atomicals ElectrumX surface: method names, parameter builders, and the
//! response envelopes this crate consumes. Concrete transports live outside
//! the crate; everything here is serialization shape only.

use crate::types::{AtomicalKind, AtomicalRegistry, Utxo};
use serde::{Deserialize, Serialize};

/// Verbose `listscripthash` response: the full UTXO set for a scripthash
/// plus the registry of atomicals those UTXOs carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScripthashBalanceResponse {
    #[serde(default)]
    pub atomicals: AtomicalRegistry,
    #[serde(default)]
    pub utxos: Vec<Utxo>,
}

/// Per-atomical balance: the scripthash UTXO set filtered down to the
/// outputs carrying one atomical id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomical_id: Option<String>,
    pub confirmed: u64,
    #[serde(rename = "type")]
    pub kind: AtomicalKind,
    pub utxos: Vec<Utxo>,
}

/// ElectrumX method names for the Atomicals protocol family.
pub struct AtomicalsRpcMethods;

impl AtomicalsRpcMethods {
    // Scripthash endpoints
    pub const LIST_SCRIPTHASH: &'static str = "blockchain.atomicals.listscripthash";
    pub const LIST_UNSPENT: &'static str = "blockchain.scripthash.listunspent";
    pub const GET_HISTORY: &'static str = "blockchain.scripthash.get_history";

    // Atomical lookups
    pub const GET: &'static str = "blockchain.atomicals.get";
    pub const GET_GLOBAL: &'static str = "blockchain.atomicals.get_global";
    pub const GET_STATE: &'static str = "blockchain.atomicals.get_state";
    pub const GET_LOCATION: &'static str = "blockchain.atomicals.get_location";
    pub const AT_LOCATION: &'static str = "blockchain.atomicals.at_location";
    pub const GET_FT_INFO: &'static str = "blockchain.atomicals.get_ft_info";

    // Name resolution
    pub const GET_BY_TICKER: &'static str = "blockchain.atomicals.get_by_ticker";
    pub const GET_BY_REALM: &'static str = "blockchain.atomicals.get_by_realm";
    pub const GET_BY_CONTAINER: &'static str = "blockchain.atomicals.get_by_container";
    pub const FIND_TICKERS: &'static str = "blockchain.atomicals.find_tickers";
    pub const FIND_REALMS: &'static str = "blockchain.atomicals.find_realms";
    pub const FIND_CONTAINERS: &'static str = "blockchain.atomicals.find_containers";

    // Transactions
    pub const VALIDATE: &'static str = "blockchain.atomicals.validate";
    pub const TRANSACTION_BROADCAST: &'static str = "blockchain.transaction.broadcast";
    pub const TRANSACTION_GET: &'static str = "blockchain.transaction.get";
}

/// Helper functions for parameter formatting
pub mod params {
    use serde_json::{json, Value};

    /// Create parameters for single value endpoints
    pub fn single<T: serde::Serialize>(value: T) -> Value {
        json!([value])
    }

    /// Create parameters for dual value endpoints
    pub fn dual<T: serde::Serialize, U: serde::Serialize>(first: T, second: U) -> Value {
        json!([first, second])
    }

    /// Create parameters for an optional second value
    pub fn optional_dual<T: serde::Serialize, U: serde::Serialize>(
        first: T,
        second: Option<U>,
    ) -> Value {
        match second {
            Some(s) => json!([first, s]),
            None => json!([first]),
        }
    }

    /// Cursor-paged listing parameters
    pub fn paged<T: serde::Serialize>(first: T, cursor: u64, size: u64) -> Value {
        json!([first, cursor, size])
    }

    /// Create empty parameters
    pub fn empty() -> Value {
        json!([])
    }
}
