//! Fee estimation by measurement: the candidate transaction is rebuilt
//! against a throwaway probe key, fully signed and finalized, and the fee
//! is computed from the witness-discounted serialized size. Real
//! signatures keep DER length variance inside the estimate instead of
//! under it.

use crate::address::{script_for_pubkey, AddressType};
use crate::input::{build_input, build_psbt};
use crate::network::NetworkParams;
use crate::signer::{finalize_input, sign_inputs_with_key, LocalSigner};
use crate::types::{ToSignInput, Utxo, DUST_AMOUNT};
use crate::{Result, WalletError};
use bitcoin::consensus;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{PrivateKey, ScriptBuf, Transaction};
use once_cell::sync::Lazy;

/// Publicly known throwaway key used only to measure signature and witness
/// sizes. It never controls real funds.
pub const PROBE_WIF: &str = "L1NstttD9o7ssouMCzgMymwaWFYpNnq7WzkEP32MRdpDd4EKvqKP";

/// Derivation path the probe key was taken from, kept for reference.
pub const PROBE_PATH: &str = "m/44'/0'/0'/1/0";

/// The probe key's taproot form on mainnet.
pub const PROBE_ADDRESS: &str = "bc1p64lgtass0du6jfkaeslfmfs7t34lehwrya56xuu84zjtz37wnkdqgzl60f";

/// Flat byte estimate for the non-input, non-output portion of a commit
/// style transaction, matching the deposit-sizing heuristics below.
pub const BASE_TX_BYTES: usize = 300;

const INPUT_BYTES_ESTIMATE: usize = 36 + 4 + 64;
const OUTPUT_BYTES_ESTIMATE: usize = 8 + 20 + 4;

static PROBE_KEY: Lazy<Option<PrivateKey>> = Lazy::new(|| PrivateKey::from_wif(PROBE_WIF).ok());

fn probe_key() -> Result<PrivateKey> {
    (*PROBE_KEY).ok_or_else(|| WalletError::Crypto("probe key failed to parse".to_string()))
}

/// A [`LocalSigner`] over the probe key, for callers that need the probe
/// account itself rather than a fee number.
pub fn probe_signer(address_type: AddressType, params: &NetworkParams) -> Result<LocalSigner> {
    LocalSigner::from_wif(PROBE_WIF, address_type, params)
}

/// Estimate the fee for spending `inputs` to `outputs` at `fee_rate`
/// sat/byte, with every input rewritten to the probe key's script at
/// `address_type`. The probe transaction is signed and finalized through
/// the same key path as [`LocalSigner`], then measured.
pub fn estimate_fee(
    inputs: &[Utxo],
    outputs: &[(ScriptBuf, u64)],
    fee_rate: f64,
    address_type: AddressType,
    _params: &NetworkParams,
) -> Result<u64> {
    let secp = Secp256k1::new();
    let private_key = probe_key()?;
    let public_key = private_key.public_key(&secp);
    let script = script_for_pubkey(&secp, &public_key, address_type)?;

    let mut records = Vec::with_capacity(inputs.len());
    for utxo in inputs {
        records.push(build_input(utxo, &script, address_type, &public_key)?);
    }
    let mut psbt = build_psbt(records, outputs)?;

    let to_sign: Vec<ToSignInput> = (0..psbt.inputs.len())
        .map(|i| ToSignInput {
            index: i as u32,
            public_key: public_key.to_string(),
            sighash_types: None,
        })
        .collect();
    let legacy_compatibility = address_type == AddressType::P2PKH;
    sign_inputs_with_key(&secp, &mut psbt, &to_sign, &private_key, legacy_compatibility)?;
    for index in 0..psbt.inputs.len() {
        finalize_input(&mut psbt, index)?;
    }

    // The probe often spends far more than it pays out while selection is
    // still accumulating inputs, so skip the absurd-fee check.
    let tx = psbt.extract_tx_unchecked_fee_rate();
    let fee = (discounted_size(&tx) * fee_rate).ceil() as u64;
    log::debug!(
        "estimated fee {} sat for {} input(s), {} output(s) at {} sat/byte",
        fee,
        tx.input.len(),
        tx.output.len(),
        fee_rate
    );
    Ok(fee)
}

/// Witness-discounted size of a finalized transaction in fractional bytes:
/// serialized length minus three quarters of each input's serialized
/// witness. Inputs without a witness contribute at full weight.
pub fn discounted_size(tx: &Transaction) -> f64 {
    let mut size = consensus::serialize(tx).len() as f64;
    for txin in &tx.input {
        if !txin.witness.is_empty() {
            size -= consensus::serialize(&txin.witness).len() as f64 * 0.75;
        }
    }
    size
}

/// Expected fee and deposit for funding an atomical-carrying commit of
/// roughly `BASE_TX_BYTES + mint_data_length` bytes. A positive deposit
/// below the dust limit is raised to it; a negative deposit means the
/// inputs already cover the target and is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsRequired {
    pub expected_satoshis_deposit: i64,
    pub expected_fee: u64,
}

pub fn calculate_funds_required(
    additional_input_value: u64,
    atomical_sats: u64,
    sats_byte: f64,
    mint_data_length: usize,
) -> FundsRequired {
    let estimated_bytes = BASE_TX_BYTES + mint_data_length;
    let expected_fee = (estimated_bytes as f64 * sats_byte).ceil() as u64;
    let mut deposit =
        expected_fee as i64 + atomical_sats as i64 - additional_input_value as i64;
    if deposit > 0 && deposit < DUST_AMOUNT as i64 {
        deposit = DUST_AMOUNT as i64;
    }
    FundsRequired {
        expected_satoshis_deposit: deposit,
        expected_fee,
    }
}

/// Byte-heuristic sizing for FT transfers: per-input outpoint, sequence
/// and witness estimates plus per-output value and script estimates on top
/// of the flat base.
pub fn calculate_ft_funds_required(
    input_count: usize,
    output_count: usize,
    sats_byte: f64,
    mint_data_length: usize,
) -> FundsRequired {
    let estimated_bytes = BASE_TX_BYTES
        + mint_data_length
        + input_count * INPUT_BYTES_ESTIMATE
        + output_count * OUTPUT_BYTES_ESTIMATE;
    let expected_fee = (estimated_bytes as f64 * sats_byte).ceil() as u64;
    let mut deposit = expected_fee as i64;
    if deposit > 0 && deposit < DUST_AMOUNT as i64 {
        deposit = DUST_AMOUNT as i64;
    }
    FundsRequired {
        expected_satoshis_deposit: deposit,
        expected_fee,
    }
}
