//! Network parameters and endpoint configuration.
//!
//! Parameters are passed explicitly through the call sites that need them;
//! there is no process-global network state.

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::WalletError;
use clap::Args;
use std::str::FromStr;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RpcError {
    #[error("Missing endpoint URL for: {0}")]
    MissingEndpoint(String),
    #[error("RPC error {code}: {message}")]
    JsonRpcError { code: i64, message: String },
}

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        WalletError::JsonRpc(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: Network,
    pub bech32_hrp: String,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Bitcoin,
            bech32_hrp: "bc".to_string(),
            p2pkh_prefix: 0,
            p2sh_prefix: 5,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            bech32_hrp: "tb".to_string(),
            p2pkh_prefix: 111,
            p2sh_prefix: 196,
        }
    }

    pub fn signet() -> Self {
        Self {
            network: Network::Signet,
            bech32_hrp: "tb".to_string(),
            p2pkh_prefix: 111,
            p2sh_prefix: 196,
        }
    }

    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            bech32_hrp: "bcrt".to_string(),
            p2pkh_prefix: 111,
            p2sh_prefix: 196,
        }
    }

    pub fn supported_networks() -> Vec<&'static str> {
        vec!["mainnet", "testnet", "signet", "regtest"]
    }

    pub fn from_network_str(s: &str) -> Result<Self, WalletError> {
        match s {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" => Ok(Self::testnet()),
            "signet" => Ok(Self::signet()),
            "regtest" => Ok(Self::regtest()),
            _ => Err(WalletError::InvalidParameters(format!(
                "Invalid network: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletNetwork(pub Network);

impl FromStr for WalletNetwork {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(WalletNetwork(Network::Bitcoin)),
            "testnet" => Ok(WalletNetwork(Network::Testnet)),
            "signet" => Ok(WalletNetwork(Network::Signet)),
            "regtest" => Ok(WalletNetwork(Network::Regtest)),
            _ => Err(WalletError::InvalidParameters(format!(
                "Invalid network: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for WalletNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self.0 {
                Network::Bitcoin => "mainnet",
                Network::Testnet => "testnet",
                Network::Signet => "signet",
                Network::Regtest => "regtest",
                _ => "unknown",
            }
        )
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Network to operate on
    #[arg(short, long, default_value = "mainnet")]
    pub network: WalletNetwork,

    /// ElectrumX proxy URL (defaults based on network if not provided)
    #[arg(long)]
    pub electrumx_url: Option<String>,

    /// Mempool API URL (overrides the ElectrumX proxy for mempool calls)
    #[arg(long)]
    pub mempool_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,
}

impl EndpointsConfig {
    /// Resolved ElectrumX endpoint for the configured network.
    pub fn electrumx_endpoint(&self) -> Result<String, RpcError> {
        if let Some(url) = &self.electrumx_url {
            return Ok(url.clone());
        }
        match self.network.0 {
            Network::Bitcoin => Ok("https://ep.atomicals.xyz/proxy".to_string()),
            Network::Testnet => Ok("https://eptestnet.atomicals.xyz/proxy".to_string()),
            _ => Err(RpcError::MissingEndpoint(format!(
                "electrumx ({})",
                self.network
            ))),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            network: WalletNetwork(Network::Bitcoin),
            electrumx_url: None,
            mempool_url: None,
            timeout_seconds: 30,
        }
    }
}
