//! PSBT input construction per address type.
//!
//! Every input carries a witness UTXO; legacy P2PKH spends additionally
//! require the signing-side compatibility switch since no previous
//! transaction is attached.

use crate::address::{to_x_only, AddressType};
use crate::types::Utxo;
use crate::{Result, WalletError};
use bitcoin::absolute::LockTime;
use bitcoin::psbt::{self, Psbt};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};

/// A signable input: the transaction-level part plus its PSBT metadata.
#[derive(Debug, Clone)]
pub struct TxInputRecord {
    pub txin: TxIn,
    pub psbt_input: psbt::Input,
}

/// Build a signable input spending `utxo` locked to `script`, owned by
/// `public_key` at `address_type`.
pub fn build_input(
    utxo: &Utxo,
    script: &ScriptBuf,
    address_type: AddressType,
    public_key: &PublicKey,
) -> Result<TxInputRecord> {
    let previous_output = utxo.outpoint()?;
    let txin = TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
        witness: Witness::default(),
    };

    let mut psbt_input = psbt::Input {
        witness_utxo: Some(TxOut {
            value: Amount::from_sat(utxo.value),
            script_pubkey: script.clone(),
        }),
        ..Default::default()
    };

    match address_type {
        AddressType::P2TR => {
            psbt_input.tap_internal_key = Some(to_x_only(&public_key.to_bytes())?);
        }
        AddressType::P2SH => {
            let compressed = CompressedPublicKey::try_from(*public_key)?;
            psbt_input.redeem_script = Some(ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()));
        }
        AddressType::P2WPKH | AddressType::P2PKH => {}
        AddressType::Unknown => {
            return Err(WalletError::UnsupportedAddressType(
                "cannot spend an output of unknown address type".to_string(),
            ))
        }
    }

    Ok(TxInputRecord { txin, psbt_input })
}

/// Assemble an unsigned PSBT from prepared inputs and `(script, value)`
/// outputs.
pub fn build_psbt(inputs: Vec<TxInputRecord>, outputs: &[(ScriptBuf, u64)]) -> Result<Psbt> {
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs.iter().map(|record| record.txin.clone()).collect(),
        output: outputs
            .iter()
            .map(|(script, value)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: script.clone(),
            })
            .collect(),
    };

    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    for (i, record) in inputs.into_iter().enumerate() {
        psbt.inputs[i] = record.psbt_input;
    }
    Ok(psbt)
}
