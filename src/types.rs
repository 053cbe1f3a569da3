use crate::address::AddressType;
use crate::Result;
use bitcoin::{psbt::Psbt, OutPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outputs below this value are uneconomical to spend.
pub const DUST_AMOUNT: u64 = 546;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    #[serde(alias = "index")]
    pub vout: u32,
    pub value: u64,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub atomicals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_pubkey: Option<String>,
}

impl Utxo {
    /// Canonical `"txid:vout"` membership key.
    pub fn outpoint_key(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }

    pub fn outpoint(&self) -> Result<OutPoint> {
        Ok(OutPoint::new(self.txid.parse()?, self.vout))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomicalKind {
    #[serde(rename = "FT")]
    Ft,
    #[serde(rename = "NFT")]
    Nft,
}

/// One atomical as reported by the indexer. Mint metadata and protocol
/// fields we do not interpret ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicalItem {
    pub atomical_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomical_number: Option<u64>,
    #[serde(rename = "type")]
    pub kind: AtomicalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(rename = "$ticker", default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(rename = "$realm", default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(
        rename = "$container",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub value: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicalRegistryEntry {
    pub atomical_id: String,
    #[serde(rename = "type")]
    pub kind: AtomicalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub confirmed: u64,
    pub data: AtomicalItem,
}

/// Registry keyed by atomical id; BTreeMap keeps classification order
/// deterministic across refreshes.
pub type AtomicalRegistry = BTreeMap<String, AtomicalRegistryEntry>;

/// Fungible token grouping: one ticker, its carrying UTXOs, summed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtTokenGroup {
    #[serde(flatten)]
    pub item: AtomicalItem,
    pub utxos: Vec<Utxo>,
}

/// A UTXO carrying more than one atomical. Never auto-selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub atomicals: Vec<AtomicalItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub address: String,
    pub output: String,
    pub scripthash: String,
    #[serde(rename = "atomicalFTs")]
    pub atomical_fts: Vec<FtTokenGroup>,
    #[serde(rename = "atomicalNFTs")]
    pub atomical_nfts: Vec<AtomicalItem>,
    pub atomical_merged: Vec<MergedUtxo>,
    #[serde(rename = "confirmedUTXOs")]
    pub confirmed_utxos: Vec<Utxo>,
    pub confirmed_value: u64,
    #[serde(rename = "unconfirmedUTXOs")]
    pub unconfirmed_utxos: Vec<Utxo>,
    pub unconfirmed_value: u64,
    #[serde(rename = "atomicalsUTXOs")]
    pub atomicals_utxos: Vec<Utxo>,
    pub atomicals_value: u64,
    #[serde(rename = "ordinalsUTXOs")]
    pub ordinals_utxos: Vec<Utxo>,
    pub ordinals_value: u64,
    #[serde(rename = "regularsUTXOs")]
    pub regulars_utxos: Vec<Utxo>,
    pub regulars_value: u64,
    #[serde(rename = "atomicalsWithOrdinalsUTXOs")]
    pub atomicals_with_ordinals_utxos: Vec<Utxo>,
    pub atomicals_with_ordinals_value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummaryEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub fee_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSummary {
    pub list: Vec<FeeSummaryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolVin {
    pub txid: String,
    pub vout: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MempoolTxStatus {
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolTx {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<MempoolVin>,
    #[serde(default)]
    pub status: MempoolTxStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription_number: Option<i64>,
    /// `"txid:vout"` of the output currently holding the inscription.
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InscriptionsPage {
    pub list: Vec<Inscription>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToSignInput {
    pub index: u32,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sighash_types: Option<Vec<u32>>,
}

/// Caller-facing selection of inputs to sign. Each form is validated
/// against the signing account before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToSignInputSpec {
    #[serde(rename_all = "camelCase")]
    ByAddress {
        address: String,
        index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sighash_types: Option<Vec<u32>>,
    },
    #[serde(rename_all = "camelCase")]
    ByPublicKey {
        public_key: String,
        index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sighash_types: Option<Vec<u32>>,
    },
    #[serde(rename_all = "camelCase")]
    ByIndex {
        index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sighash_types: Option<Vec<u32>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub public_key: String,
    pub address_type: AddressType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendParams {
    pub to_address: String,
    pub to_amount: u64,
    pub fee_rate: Option<f64>,
    /// Fee is deducted from the recipient amount instead of change.
    pub receiver_pays_fee: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutput {
    pub address: String,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransferParams {
    pub selected_utxos: Vec<Utxo>,
    pub outputs: Vec<TransferOutput>,
    pub fee_rate: Option<f64>,
}

/// A constructed, not yet signed transfer.
#[derive(Debug, Clone)]
pub struct BuiltPayment {
    pub psbt: Psbt,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<TransferOutput>,
    pub fee: u64,
}

/// A constructed token transfer; `expected_funding` is the plain-value
/// deposit reserved for fees on top of the token inputs.
#[derive(Debug, Clone)]
pub struct BuiltTokenTransfer {
    pub psbt: Psbt,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<TransferOutput>,
    pub fee: u64,
    pub expected_funding: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransfer {
    pub psbt_hex: String,
    pub raw_tx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub fee: u64,
}
