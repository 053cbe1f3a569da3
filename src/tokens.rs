//! Atomicals token transfers. FT transfers spend caller-selected
//! token-bearing UTXOs under an exact value-conservation rule and fund the
//! fee from plain balance; NFT transfers pass the selected outputs through
//! at equal value. Neither ever adjusts token amounts to make a
//! transaction fit.

use crate::address;
use crate::fee::estimate_fee;
use crate::network::NetworkParams;
use crate::transaction::{assemble, build_with_selected, recipient_script, ScriptedOutput};
use crate::types::{
    AccountInfo, BuiltPayment, BuiltTokenTransfer, TokenTransferParams, TransferOutput, Utxo,
    WalletBalance, DUST_AMOUNT,
};
use crate::{Result, WalletError};
use bitcoin::ScriptBuf;

/// Upper bound on fee refinement passes. Each pass can only add funding
/// inputs, so the estimate is monotone and the bound caps pathological
/// fee-rate/fragmentation combinations instead of looping.
pub const MAX_GAS_PASSES: usize = 4;

/// Fee reserve ("gas") for a token transfer whose fee is paid from plain
/// UTXOs rather than token value.
///
/// The token-only shape is measured first; a result at or under the dust
/// limit settles to the dust limit. Otherwise the estimate is refined:
/// fund the current reserve from `candidates` (change added when the
/// leftover clears dust), re-measure the funded shape, and repeat until
/// the fee stops growing or [`MAX_GAS_PASSES`] is spent. Funding shortage
/// is not an error here; the build that consumes the reserve reports it.
pub fn calculate_token_gas(
    token_inputs: &[Utxo],
    token_outputs: &[(ScriptBuf, u64)],
    candidates: &[Utxo],
    fee_rate: f64,
    account: &AccountInfo,
    network: &NetworkParams,
) -> Result<u64> {
    let fee = estimate_fee(
        token_inputs,
        token_outputs,
        fee_rate,
        account.address_type,
        network,
    )?;
    if fee <= DUST_AMOUNT {
        return Ok(DUST_AMOUNT);
    }

    let sender = address::detect(&account.address, network)?;
    let mut gas = fee;
    for pass in 1..MAX_GAS_PASSES {
        let mut funding: Vec<Utxo> = Vec::new();
        let mut acc = 0u64;
        for utxo in candidates {
            if acc >= gas {
                break;
            }
            acc += utxo.value;
            funding.push(utxo.clone());
        }

        let mut all_inputs = token_inputs.to_vec();
        all_inputs.extend(funding);
        let mut outputs = token_outputs.to_vec();
        let leftover = acc.saturating_sub(gas);
        if leftover >= DUST_AMOUNT {
            outputs.push((sender.script.clone(), leftover));
        }
        let refined = estimate_fee(
            &all_inputs,
            &outputs,
            fee_rate,
            account.address_type,
            network,
        )?;
        log::debug!("gas pass {pass}: {gas} -> {refined} sat");
        if refined <= gas {
            return Ok(gas);
        }
        gas = refined;
    }
    Ok(gas)
}

/// Build an unsigned FT transfer: `selected_utxos` carry the token,
/// `outputs` distribute exactly the same token value, and plain UTXOs are
/// pulled to cover the fee reserve.
pub fn build_ft_transfer(
    params: &TokenTransferParams,
    balance: &WalletBalance,
    fee_rate: f64,
    account: &AccountInfo,
    network: &NetworkParams,
) -> Result<BuiltTokenTransfer> {
    let token_in: u64 = params.selected_utxos.iter().map(|u| u.value).sum();
    let token_out: u64 = params.outputs.iter().map(|o| o.value).sum();
    if token_in != token_out {
        return Err(WalletError::TokenQuantityMismatch {
            inputs: token_in,
            outputs: token_out,
        });
    }

    let sender = address::detect(&account.address, network)?;
    let mut scripted: Vec<ScriptedOutput> = Vec::with_capacity(params.outputs.len());
    for out in &params.outputs {
        scripted.push((
            out.address.clone(),
            recipient_script(&out.address, network)?,
            out.value,
        ));
    }
    let token_scripts: Vec<(ScriptBuf, u64)> = scripted
        .iter()
        .map(|(_, script, value)| (script.clone(), *value))
        .collect();

    let gas = calculate_token_gas(
        &params.selected_utxos,
        &token_scripts,
        &balance.regulars_utxos,
        fee_rate,
        account,
        network,
    )?;

    let mut funding: Vec<Utxo> = Vec::new();
    let mut acc = 0u64;
    for utxo in &balance.regulars_utxos {
        if acc >= gas {
            break;
        }
        acc += utxo.value;
        funding.push(utxo.clone());
    }
    if acc < gas {
        return Err(WalletError::InsufficientBalance {
            available: acc,
            required: gas,
        });
    }

    let mut inputs = params.selected_utxos.clone();
    inputs.extend(funding);
    let leftover = acc - gas;
    let mut outputs = scripted;
    let fee = if leftover >= DUST_AMOUNT {
        outputs.push((account.address.clone(), sender.script.clone(), leftover));
        gas
    } else {
        gas + leftover
    };
    log::info!(
        "ft transfer built: {} token sat across {} output(s), fee {} sat",
        token_out,
        params.outputs.len(),
        fee
    );

    let built = assemble(inputs, outputs, fee, &sender.script, account)?;
    Ok(BuiltTokenTransfer {
        psbt: built.psbt,
        inputs: built.inputs,
        outputs: built.outputs,
        fee: built.fee,
        expected_funding: gas,
    })
}

/// Build an unsigned NFT transfer: each selected UTXO is forwarded to the
/// recipient at its own value, and the fee is funded from plain balance.
pub fn build_nft_transfer(
    selected: &[Utxo],
    recipient: &str,
    balance: &WalletBalance,
    fee_rate: f64,
    account: &AccountInfo,
    network: &NetworkParams,
) -> Result<BuiltPayment> {
    if selected.is_empty() {
        return Err(WalletError::InvalidParameters(
            "no inputs selected for NFT transfer".to_string(),
        ));
    }
    let outputs: Vec<TransferOutput> = selected
        .iter()
        .map(|utxo| TransferOutput {
            address: recipient.to_string(),
            value: utxo.value,
        })
        .collect();
    build_with_selected(
        selected,
        &outputs,
        &balance.regulars_utxos,
        0,
        fee_rate,
        account,
        network,
    )
}
