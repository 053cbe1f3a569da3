//! Plain-value transfers: safe-balance gating, fee-aware input selection,
//! change policy, and unsigned PSBT assembly.
//!
//! Only regular UTXOs ever enter these loops; atomical- and
//! inscription-bearing outputs are excluded upstream by the balance
//! classifier so a value send can never consume a token by accident.

use crate::address::{self, AddressType};
use crate::fee;
use crate::input::{build_input, build_psbt};
use crate::network::NetworkParams;
use crate::types::{
    AccountInfo, BuiltPayment, SendParams, TransferOutput, Utxo, WalletBalance, DUST_AMOUNT,
};
use crate::{Result, WalletError};
use bitcoin::{PublicKey, ScriptBuf};

/// (address, script, value) triple kept together so the PSBT and the
/// caller-facing output list stay in sync.
pub(crate) type ScriptedOutput = (String, ScriptBuf, u64);

pub(crate) fn recipient_script(addr: &str, network: &NetworkParams) -> Result<ScriptBuf> {
    let lookup = address::detect(addr, network)
        .map_err(|_| WalletError::InvalidRecipient(addr.to_string()))?;
    if lookup.address_type == AddressType::Unknown {
        return Err(WalletError::InvalidRecipient(addr.to_string()));
    }
    Ok(lookup.script)
}

pub(crate) fn assemble(
    inputs: Vec<Utxo>,
    outputs: Vec<ScriptedOutput>,
    fee: u64,
    sender_script: &ScriptBuf,
    account: &AccountInfo,
) -> Result<BuiltPayment> {
    let public_key = PublicKey::from_slice(&hex::decode(&account.public_key)?)?;
    let mut records = Vec::with_capacity(inputs.len());
    for utxo in &inputs {
        records.push(build_input(
            utxo,
            sender_script,
            account.address_type,
            &public_key,
        )?);
    }
    let scripted: Vec<(ScriptBuf, u64)> = outputs
        .iter()
        .map(|(_, script, value)| (script.clone(), *value))
        .collect();
    let psbt = build_psbt(records, &scripted)?;
    Ok(BuiltPayment {
        psbt,
        inputs,
        outputs: outputs
            .into_iter()
            .map(|(address, _, value)| TransferOutput { address, value })
            .collect(),
        fee,
    })
}

/// Build an unsigned plain-value payment from the account's regular UTXOs.
///
/// Order of checks is load-bearing: the safe-balance pre-check runs before
/// recipient validation, which runs before any input is admitted. In
/// auto-adjust mode (`receiver_pays_fee`, or the amount equals the safe
/// balance) every regular UTXO is spent into a single recipient output of
/// `safe balance − fee` and no change is produced.
pub fn build_payment(
    balance: &WalletBalance,
    params: &SendParams,
    fee_rate: f64,
    account: &AccountInfo,
    network: &NetworkParams,
) -> Result<BuiltPayment> {
    let safe_balance = balance.regulars_value;
    if safe_balance < params.to_amount {
        return Err(WalletError::InsufficientBalance {
            available: safe_balance,
            required: params.to_amount,
        });
    }
    let auto_adjust = params.receiver_pays_fee || params.to_amount == safe_balance;
    let amount = if auto_adjust {
        safe_balance
    } else {
        params.to_amount
    };

    let to_script = recipient_script(&params.to_address, network)?;
    let sender = address::detect(&account.address, network)?;

    if auto_adjust {
        let selected = balance.regulars_utxos.clone();
        let probe_outputs = vec![(to_script.clone(), amount)];
        let fee = fee::estimate_fee(
            &selected,
            &probe_outputs,
            fee_rate,
            account.address_type,
            network,
        )?;
        if amount <= fee {
            return Err(WalletError::InsufficientBalance {
                available: amount,
                required: fee,
            });
        }
        let send_value = amount - fee;
        log::info!(
            "auto-adjusted send: {} sat to {} plus {} fee from {} input(s)",
            send_value,
            params.to_address,
            fee,
            selected.len()
        );
        return assemble(
            selected,
            vec![(params.to_address.clone(), to_script, send_value)],
            fee,
            &sender.script,
            account,
        );
    }

    let mut selected: Vec<Utxo> = Vec::new();
    let mut in_value = 0u64;
    let mut last_fee = 0u64;
    for utxo in &balance.regulars_utxos {
        log::debug!(
            "selection admits {} ({} sat)",
            utxo.outpoint_key(),
            utxo.value
        );
        in_value += utxo.value;
        selected.push(utxo.clone());
        if in_value < amount {
            continue;
        }
        let remainder = in_value - amount;
        let mut probe_outputs = vec![(to_script.clone(), amount)];
        if remainder >= DUST_AMOUNT {
            probe_outputs.push((sender.script.clone(), remainder));
        }
        let fee = fee::estimate_fee(
            &selected,
            &probe_outputs,
            fee_rate,
            account.address_type,
            network,
        )?;
        last_fee = fee;
        if remainder < fee {
            continue;
        }
        let change = remainder - fee;
        let mut outputs = vec![(params.to_address.clone(), to_script, amount)];
        let final_fee = if change >= DUST_AMOUNT {
            outputs.push((account.address.clone(), sender.script.clone(), change));
            fee
        } else {
            // Sub-dust change folds into the fee instead of producing an
            // uneconomical output.
            fee + change
        };
        log::info!(
            "payment built: {} input(s), {} output(s), fee {} sat",
            selected.len(),
            outputs.len(),
            final_fee
        );
        return assemble(selected, outputs, final_fee, &sender.script, account);
    }
    Err(WalletError::InsufficientBalance {
        available: in_value,
        required: amount + last_fee,
    })
}

/// Build a transfer around caller-fixed inputs and outputs, funding the
/// fee (plus `amount` extra sats, usually zero) from `candidates`.
///
/// The remainder is tested before each candidate is admitted, so the
/// transaction never pays for an input it does not need. One attempt runs
/// the candidate list once: satisfied or `InsufficientBalance`, no partial
/// state survives.
pub fn build_with_selected(
    selected: &[Utxo],
    outputs: &[TransferOutput],
    candidates: &[Utxo],
    amount: u64,
    fee_rate: f64,
    account: &AccountInfo,
    network: &NetworkParams,
) -> Result<BuiltPayment> {
    let sender = address::detect(&account.address, network)?;
    let mut scripted: Vec<ScriptedOutput> = Vec::with_capacity(outputs.len());
    for out in outputs {
        scripted.push((
            out.address.clone(),
            recipient_script(&out.address, network)?,
            out.value,
        ));
    }

    let mut funding: Vec<Utxo> = Vec::new();
    let mut acc = 0u64;
    let mut last_fee = 0u64;
    let mut pending = candidates.iter();
    loop {
        if acc >= amount {
            let remainder = acc - amount;
            let mut all_inputs: Vec<Utxo> = selected.to_vec();
            all_inputs.extend(funding.iter().cloned());
            let mut probe_outputs: Vec<(ScriptBuf, u64)> = scripted
                .iter()
                .map(|(_, script, value)| (script.clone(), *value))
                .collect();
            if remainder >= DUST_AMOUNT {
                probe_outputs.push((sender.script.clone(), remainder));
            }
            let fee = fee::estimate_fee(
                &all_inputs,
                &probe_outputs,
                fee_rate,
                account.address_type,
                network,
            )?;
            last_fee = fee;
            if remainder >= fee {
                let change = remainder - fee;
                let mut final_outputs = scripted.clone();
                let final_fee = if change >= DUST_AMOUNT {
                    final_outputs.push((account.address.clone(), sender.script.clone(), change));
                    fee
                } else {
                    fee + change
                };
                log::info!(
                    "selected-input build: {} fixed + {} funding input(s), fee {} sat",
                    selected.len(),
                    funding.len(),
                    final_fee
                );
                return assemble(all_inputs, final_outputs, final_fee, &sender.script, account);
            }
        }
        match pending.next() {
            Some(utxo) => {
                log::debug!("funding admits {} ({} sat)", utxo.outpoint_key(), utxo.value);
                acc += utxo.value;
                funding.push(utxo.clone());
            }
            None => {
                return Err(WalletError::InsufficientBalance {
                    available: acc,
                    required: amount + last_fee,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::{estimate_fee, probe_signer, PROBE_ADDRESS};
    use crate::traits::KeyringSigner;

    fn utxo(value: u64, vout: u32) -> Utxo {
        Utxo {
            txid: "ef".repeat(32),
            vout,
            value,
            height: 800_000,
            atomicals: vec![],
            script_pubkey: None,
        }
    }

    fn balance_with_regulars(utxos: Vec<Utxo>) -> WalletBalance {
        WalletBalance {
            regulars_value: utxos.iter().map(|u| u.value).sum(),
            regulars_utxos: utxos,
            ..Default::default()
        }
    }

    fn sender_account() -> AccountInfo {
        probe_signer(AddressType::P2WPKH, &NetworkParams::mainnet())
            .unwrap()
            .account()
    }

    fn send(amount: u64, receiver_pays_fee: bool) -> SendParams {
        SendParams {
            to_address: PROBE_ADDRESS.to_string(),
            to_amount: amount,
            fee_rate: None,
            receiver_pays_fee,
        }
    }

    fn conserved(built: &BuiltPayment) -> bool {
        let in_value: u64 = built.inputs.iter().map(|u| u.value).sum();
        let out_value: u64 = built.outputs.iter().map(|o| o.value).sum();
        in_value == out_value + built.fee
    }

    #[test]
    fn single_input_payment_with_change() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(100_000, 0)]);

        let built = build_payment(&balance, &send(50_000, false), 5.0, &account, &network).unwrap();

        assert_eq!(built.inputs.len(), 1);
        assert_eq!(built.outputs.len(), 2);
        assert_eq!(built.outputs[0].address, PROBE_ADDRESS);
        assert_eq!(built.outputs[0].value, 50_000);
        assert_eq!(built.outputs[1].address, account.address);
        assert_eq!(built.outputs[1].value, 100_000 - 50_000 - built.fee);
        assert!(conserved(&built));
        assert!(built.outputs.iter().all(|o| o.value >= DUST_AMOUNT));

        // The fee must match a fresh estimate over the same probe shape
        // the loop measured: recipient plus tentative change at the full
        // remainder.
        let to_script = recipient_script(PROBE_ADDRESS, &network).unwrap();
        let sender_script = address::detect(&account.address, &network).unwrap().script;
        let recomputed = estimate_fee(
            &balance.regulars_utxos,
            &[(to_script, 50_000), (sender_script, 50_000)],
            5.0,
            AddressType::P2WPKH,
            &network,
        )
        .unwrap();
        assert_eq!(built.fee, recomputed);
    }

    #[test]
    fn tiny_balance_fails_before_recipient_validation() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(600, 0)]);

        // Even with a garbage recipient the pre-check fires first.
        let params = SendParams {
            to_address: "xyz123".to_string(),
            to_amount: 50_000,
            fee_rate: None,
            receiver_pays_fee: false,
        };
        let err = build_payment(&balance, &params, 1.0, &account, &network).unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientBalance {
                available: 600,
                required: 50_000
            }
        ));
    }

    #[test]
    fn unknown_recipient_aborts_before_selection() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(100_000, 0)]);

        let params = SendParams {
            to_address: "xyz123".to_string(),
            to_amount: 50_000,
            fee_rate: None,
            receiver_pays_fee: false,
        };
        let err = build_payment(&balance, &params, 1.0, &account, &network).unwrap_err();
        assert!(matches!(err, WalletError::InvalidRecipient(addr) if addr == "xyz123"));
    }

    #[test]
    fn sub_dust_remainder_folds_into_fee() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        // Remainder after the send amount is 500 sat, below the dust
        // limit, so it must fold into the fee with no change output.
        let balance = balance_with_regulars(vec![utxo(50_500, 0)]);

        let built = build_payment(&balance, &send(50_000, false), 1.0, &account, &network).unwrap();
        assert_eq!(built.outputs.len(), 1);
        assert_eq!(built.outputs[0].value, 50_000);
        assert_eq!(built.fee, 500);
        assert!(conserved(&built));

        let to_script = recipient_script(PROBE_ADDRESS, &network).unwrap();
        let base = estimate_fee(
            &balance.regulars_utxos,
            &[(to_script, 50_000)],
            1.0,
            AddressType::P2WPKH,
            &network,
        )
        .unwrap();
        assert!(built.fee > base);
    }

    #[test]
    fn full_balance_send_auto_adjusts_with_no_change() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(60_000, 0), utxo(40_000, 1)]);

        let built =
            build_payment(&balance, &send(100_000, false), 2.0, &account, &network).unwrap();
        assert_eq!(built.inputs.len(), 2);
        assert_eq!(built.outputs.len(), 1);
        assert_eq!(built.outputs[0].value, 100_000 - built.fee);
        assert!(conserved(&built));
    }

    #[test]
    fn receiver_pays_fee_forces_auto_adjust() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(80_000, 0)]);

        let built = build_payment(&balance, &send(80_000, true), 1.0, &account, &network).unwrap();
        assert_eq!(built.outputs.len(), 1);
        assert_eq!(built.outputs[0].value, 80_000 - built.fee);
    }

    #[test]
    fn more_inputs_admitted_when_first_cannot_cover_fee() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        // First UTXO covers the amount with only 10 spare sats; the loop
        // must pull the second to pay the fee.
        let balance = balance_with_regulars(vec![utxo(50_010, 0), utxo(5_000, 1)]);

        let built = build_payment(&balance, &send(50_000, false), 1.0, &account, &network).unwrap();
        assert_eq!(built.inputs.len(), 2);
        assert!(conserved(&built));
    }

    #[test]
    fn exhaustion_reports_amount_plus_fee() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let balance = balance_with_regulars(vec![utxo(50_010, 0)]);

        let err = build_payment(&balance, &send(50_000, false), 1.0, &account, &network).unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                available,
                required,
            } => {
                assert_eq!(available, 50_010);
                assert!(required > 50_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn selected_inputs_fund_fee_from_candidates() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let fixed = vec![utxo(546, 0)];
        let outputs = vec![TransferOutput {
            address: PROBE_ADDRESS.to_string(),
            value: 546,
        }];
        let candidates = vec![utxo(5_000, 1), utxo(5_000, 2)];

        let built = build_with_selected(
            &fixed, &outputs, &candidates, 0, 1.0, &account, &network,
        )
        .unwrap();

        // One funding input suffices at this rate.
        assert_eq!(built.inputs.len(), 2);
        assert_eq!(built.outputs[0].value, 546);
        assert_eq!(built.outputs.len(), 2);
        assert!(conserved(&built));
        assert!(built.outputs.iter().all(|o| o.value >= DUST_AMOUNT));
    }

    #[test]
    fn selected_inputs_without_candidates_cannot_pay_fee() {
        let network = NetworkParams::mainnet();
        let account = sender_account();
        let fixed = vec![utxo(546, 0)];
        let outputs = vec![TransferOutput {
            address: PROBE_ADDRESS.to_string(),
            value: 546,
        }];

        let err = build_with_selected(&fixed, &outputs, &[], 0, 1.0, &account, &network).unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                available,
                required,
            } => {
                assert_eq!(available, 0);
                assert!(required > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
