//! PSBT signing: to-sign resolution, own-input detection, signature
//! production for the four spend forms, and finalization.
//!
//! The keyring seam only ever receives canonical [`ToSignInput`] entries;
//! caller-facing specs are validated here first.

use crate::address::{address_from_script, script_for_pubkey, to_x_only, AddressType};
use crate::network::NetworkParams;
use crate::traits::KeyringSigner;
use crate::types::{AccountInfo, ToSignInput, ToSignInputSpec};
use crate::{Result, WalletError};
use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::key::{TapTweak, UntweakedKeypair};
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{ecdsa, script::PushBytesBuf, taproot, PrivateKey, PublicKey, ScriptBuf, Witness};
use rand::thread_rng;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Explicit input selection; `None` auto-detects the account's inputs.
    pub inputs: Option<Vec<ToSignInputSpec>>,
    /// Finalize each input right after signing it.
    pub auto_finalize: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            inputs: None,
            auto_finalize: true,
        }
    }
}

/// Validate caller-facing specs into canonical to-sign entries. Address and
/// public-key forms must match the signing account; indexes must be in
/// range for the PSBT.
pub fn resolve_to_sign_inputs(
    specs: &[ToSignInputSpec],
    account: &AccountInfo,
    input_count: usize,
) -> Result<Vec<ToSignInput>> {
    let mut resolved = Vec::with_capacity(specs.len());
    for spec in specs {
        let (index, sighash_types) = match spec {
            ToSignInputSpec::ByAddress {
                address,
                index,
                sighash_types,
            } => {
                if address != &account.address {
                    return Err(WalletError::Signing(format!(
                        "to-sign address {address} does not match the account"
                    )));
                }
                (*index, sighash_types.clone())
            }
            ToSignInputSpec::ByPublicKey {
                public_key,
                index,
                sighash_types,
            } => {
                if !public_key.eq_ignore_ascii_case(&account.public_key) {
                    return Err(WalletError::Signing(format!(
                        "to-sign public key {public_key} does not match the account"
                    )));
                }
                (*index, sighash_types.clone())
            }
            ToSignInputSpec::ByIndex {
                index,
                sighash_types,
            } => (*index, sighash_types.clone()),
        };
        if index as usize >= input_count {
            return Err(WalletError::Signing(format!(
                "to-sign index {index} out of range for {input_count} inputs"
            )));
        }
        resolved.push(ToSignInput {
            index,
            public_key: account.public_key.clone(),
            sighash_types,
        });
    }
    Ok(resolved)
}

/// Scan a PSBT for inputs committed to the account's script. Finalized
/// inputs are skipped; the committed script comes from the witness UTXO or
/// from the referenced output of an attached previous transaction.
pub fn detect_own_inputs(
    psbt: &Psbt,
    account: &AccountInfo,
    account_script: &ScriptBuf,
) -> Vec<ToSignInput> {
    let mut detected = Vec::new();
    for (i, psbt_input) in psbt.inputs.iter().enumerate() {
        if psbt_input.final_script_witness.is_some() || psbt_input.final_script_sig.is_some() {
            continue;
        }
        let script = if let Some(witness_utxo) = &psbt_input.witness_utxo {
            Some(witness_utxo.script_pubkey.clone())
        } else if let Some(prev_tx) = &psbt_input.non_witness_utxo {
            let vout = psbt.unsigned_tx.input[i].previous_output.vout as usize;
            prev_tx.output.get(vout).map(|out| out.script_pubkey.clone())
        } else {
            None
        };
        if script.as_ref() == Some(account_script) {
            detected.push(ToSignInput {
                index: i as u32,
                public_key: account.public_key.clone(),
                sighash_types: psbt_input.sighash_type.map(|t| vec![t.to_u32()]),
            });
        }
    }
    detected
}

/// Recover taproot internal keys on externally built inputs: any input
/// without one whose committed script is the account key's p2tr output
/// gets the account's x-only key. Returns how many inputs were filled.
pub fn inject_taproot_internal_keys(
    psbt: &mut Psbt,
    public_key: &PublicKey,
    secp: &Secp256k1<All>,
) -> Result<usize> {
    let expected = script_for_pubkey(secp, public_key, AddressType::P2TR)?;
    let xonly = to_x_only(&public_key.to_bytes())?;
    let mut injected = 0;
    for input in psbt.inputs.iter_mut() {
        if input.tap_internal_key.is_some() {
            continue;
        }
        if let Some(witness_utxo) = &input.witness_utxo {
            if witness_utxo.script_pubkey == expected {
                input.tap_internal_key = Some(xonly);
                injected += 1;
            }
        }
    }
    Ok(injected)
}

/// Sign a PSBT through a keyring and finalize the signed inputs.
///
/// `legacy_compatibility` must be set when the PSBT carries P2PKH inputs
/// described only by a witness UTXO; without it those inputs are refused.
pub async fn sign_psbt<K: KeyringSigner + ?Sized>(
    psbt: &mut Psbt,
    keyring: &K,
    options: &SignOptions,
    legacy_compatibility: bool,
) -> Result<()> {
    let account = keyring.account();
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_slice(&hex::decode(&account.public_key)?)?;

    if account.address_type == AddressType::P2TR {
        let injected = inject_taproot_internal_keys(psbt, &public_key, &secp)?;
        if injected > 0 {
            log::debug!("injected taproot internal key on {injected} input(s)");
        }
    }

    let to_sign = match &options.inputs {
        Some(specs) => resolve_to_sign_inputs(specs, &account, psbt.inputs.len())?,
        None => {
            let script = script_for_pubkey(&secp, &public_key, account.address_type)?;
            detect_own_inputs(psbt, &account, &script)
        }
    };
    if to_sign.is_empty() {
        return Err(WalletError::Signing("no input to sign".to_string()));
    }

    keyring
        .sign_transaction(psbt, &to_sign, legacy_compatibility)
        .await?;

    if options.auto_finalize {
        for input in &to_sign {
            finalize_input(psbt, input.index as usize)?;
        }
    }
    Ok(())
}

/// Turn a signed input's partial material into final witness/scriptSig.
pub fn finalize_input(psbt: &mut Psbt, index: usize) -> Result<()> {
    let psbt_input = psbt
        .inputs
        .get_mut(index)
        .ok_or_else(|| WalletError::Signing(format!("input {index} out of range")))?;
    if psbt_input.final_script_witness.is_some() || psbt_input.final_script_sig.is_some() {
        return Ok(());
    }

    if let Some(tap_sig) = psbt_input.tap_key_sig {
        psbt_input.final_script_witness = Some(Witness::p2tr_key_spend(&tap_sig));
        psbt_input.tap_key_sig = None;
        psbt_input.tap_internal_key = None;
        return Ok(());
    }

    let script = psbt_input
        .witness_utxo
        .as_ref()
        .map(|w| w.script_pubkey.clone())
        .ok_or_else(|| WalletError::Signing(format!("input {index} missing witness utxo")))?;
    let (public_key, signature) = psbt_input
        .partial_sigs
        .iter()
        .next()
        .map(|(pk, sig)| (*pk, *sig))
        .ok_or_else(|| WalletError::Signing(format!("missing signature for input {index}")))?;

    if script.is_p2wpkh() {
        psbt_input.final_script_witness = Some(Witness::p2wpkh(&signature, &public_key.inner));
    } else if script.is_p2sh() {
        let redeem = psbt_input
            .redeem_script
            .clone()
            .ok_or_else(|| WalletError::Signing(format!("input {index} missing redeem script")))?;
        psbt_input.final_script_witness = Some(Witness::p2wpkh(&signature, &public_key.inner));
        let redeem_push = PushBytesBuf::try_from(redeem.to_bytes())
            .map_err(|e| WalletError::Signing(format!("redeem script too long: {e:?}")))?;
        psbt_input.final_script_sig =
            Some(ScriptBuf::builder().push_slice(redeem_push).into_script());
    } else if script.is_p2pkh() {
        let sig_push = PushBytesBuf::try_from(signature.to_vec())
            .map_err(|e| WalletError::Signing(format!("oversized signature: {e:?}")))?;
        let key_push = PushBytesBuf::try_from(public_key.to_bytes())
            .map_err(|e| WalletError::Signing(format!("oversized public key: {e:?}")))?;
        psbt_input.final_script_sig = Some(
            ScriptBuf::builder()
                .push_slice(sig_push)
                .push_slice(key_push)
                .into_script(),
        );
    } else {
        return Err(WalletError::Signing(format!(
            "cannot finalize input {index}: unsupported script form"
        )));
    }
    psbt_input.partial_sigs.clear();
    Ok(())
}

/// Produce signatures for the given inputs with one private key. Shared by
/// [`LocalSigner`] and the fee estimator's probe.
pub(crate) fn sign_inputs_with_key(
    secp: &Secp256k1<All>,
    psbt: &mut Psbt,
    inputs: &[ToSignInput],
    private_key: &PrivateKey,
    legacy_compatibility: bool,
) -> Result<()> {
    let public_key = private_key.public_key(secp);
    let mut prevouts = Vec::with_capacity(psbt.inputs.len());
    for (i, psbt_input) in psbt.inputs.iter().enumerate() {
        let witness_utxo = psbt_input
            .witness_utxo
            .clone()
            .ok_or_else(|| WalletError::Signing(format!("input {i} missing witness utxo")))?;
        prevouts.push(witness_utxo);
    }

    let unsigned_tx = psbt.unsigned_tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned_tx);

    for to_sign in inputs {
        let index = to_sign.index as usize;
        if index >= psbt.inputs.len() {
            return Err(WalletError::Signing(format!(
                "to-sign index {index} out of range"
            )));
        }
        let prevout = prevouts[index].clone();
        let script = prevout.script_pubkey.clone();
        let declared = psbt.inputs[index].sighash_type;

        if script.is_p2tr() {
            let sighash_type = match declared {
                Some(t) => t
                    .taproot_hash_ty()
                    .map_err(|e| WalletError::Signing(format!("{e:?}")))?,
                None => TapSighashType::Default,
            };
            check_allowed(to_sign, (sighash_type as u8) as u32, index)?;
            let sighash = sighash_cache.taproot_key_spend_signature_hash(
                index,
                &Prevouts::All(&prevouts),
                sighash_type,
            )?;
            let keypair = Keypair::from_secret_key(secp, &private_key.inner);
            let tweaked_keypair = UntweakedKeypair::from(keypair).tap_tweak(secp, None);
            let msg = Message::from(sighash);
            let signature =
                secp.sign_schnorr_with_rng(&msg, &tweaked_keypair.to_keypair(), &mut thread_rng());
            psbt.inputs[index].tap_key_sig = Some(taproot::Signature {
                signature,
                sighash_type,
            });
        } else if script.is_p2wpkh() || script.is_p2sh() {
            let sighash_type = match declared {
                Some(t) => t
                    .ecdsa_hash_ty()
                    .map_err(|e| WalletError::Signing(format!("{e:?}")))?,
                None => EcdsaSighashType::All,
            };
            check_allowed(to_sign, sighash_type.to_u32(), index)?;
            // Nested segwit signs against the p2wpkh redeem script.
            let script_code = if script.is_p2sh() {
                psbt.inputs[index].redeem_script.clone().ok_or_else(|| {
                    WalletError::Signing(format!("input {index} missing redeem script"))
                })?
            } else {
                script.clone()
            };
            let sighash = sighash_cache.p2wpkh_signature_hash(
                index,
                &script_code,
                prevout.value,
                sighash_type,
            )?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&msg, &private_key.inner);
            psbt.inputs[index].partial_sigs.insert(
                public_key,
                ecdsa::Signature {
                    signature,
                    sighash_type,
                },
            );
        } else if script.is_p2pkh() {
            if !legacy_compatibility {
                return Err(WalletError::Signing(format!(
                    "input {index} is legacy p2pkh; enable legacy compatibility to sign it"
                )));
            }
            let sighash_type = match declared {
                Some(t) => t
                    .ecdsa_hash_ty()
                    .map_err(|e| WalletError::Signing(format!("{e:?}")))?,
                None => EcdsaSighashType::All,
            };
            check_allowed(to_sign, sighash_type.to_u32(), index)?;
            let sighash = sighash_cache
                .legacy_signature_hash(index, &script, sighash_type.to_u32())
                .map_err(|e| WalletError::Transaction(format!("{e:?}")))?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&msg, &private_key.inner);
            psbt.inputs[index].partial_sigs.insert(
                public_key,
                ecdsa::Signature {
                    signature,
                    sighash_type,
                },
            );
        } else {
            return Err(WalletError::Signing(format!(
                "input {index}: unsupported script form"
            )));
        }
    }
    Ok(())
}

fn check_allowed(to_sign: &ToSignInput, used: u32, index: usize) -> Result<()> {
    if let Some(allowed) = &to_sign.sighash_types {
        if !allowed.contains(&used) {
            return Err(WalletError::Signing(format!(
                "sighash type {used} not permitted for input {index}"
            )));
        }
    }
    Ok(())
}

/// Software signer over a single WIF key. Backs the fee estimator's probe
/// and is usable directly by embedders holding raw keys.
pub struct LocalSigner {
    secp: Secp256k1<All>,
    private_key: PrivateKey,
    public_key: PublicKey,
    address_type: AddressType,
    address: String,
}

impl LocalSigner {
    pub fn from_wif(wif: &str, address_type: AddressType, params: &NetworkParams) -> Result<Self> {
        let secp = Secp256k1::new();
        let private_key =
            PrivateKey::from_wif(wif).map_err(|e| WalletError::Crypto(format!("{e:?}")))?;
        let public_key = private_key.public_key(&secp);
        let script = script_for_pubkey(&secp, &public_key, address_type)?;
        let address = address_from_script(&script, params)?;
        Ok(Self {
            secp,
            private_key,
            public_key,
            address_type,
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The output script this signer's account controls.
    pub fn account_script(&self) -> Result<ScriptBuf> {
        script_for_pubkey(&self.secp, &self.public_key, self.address_type)
    }
}

#[async_trait(?Send)]
impl KeyringSigner for LocalSigner {
    fn account(&self) -> AccountInfo {
        AccountInfo {
            address: self.address.clone(),
            public_key: self.public_key.to_string(),
            address_type: self.address_type,
        }
    }

    async fn sign_transaction(
        &self,
        psbt: &mut Psbt,
        inputs: &[ToSignInput],
        legacy_compatibility: bool,
    ) -> Result<()> {
        sign_inputs_with_key(
            &self.secp,
            psbt,
            inputs,
            &self.private_key,
            legacy_compatibility,
        )
    }
}

/// Session-scoped registry of keyring handles. Owned by the embedding
/// session and passed by reference into signing flows; there is no global
/// keyring state in this crate.
#[derive(Default)]
pub struct KeyringRegistry {
    keyrings: HashMap<String, Box<dyn KeyringSigner>>,
}

impl KeyringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, keyring: Box<dyn KeyringSigner>) {
        self.keyrings.insert(id.into(), keyring);
    }

    pub fn get(&self, id: &str) -> Option<&dyn KeyringSigner> {
        self.keyrings.get(id).map(|k| k.as_ref())
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<dyn KeyringSigner>> {
        self.keyrings.remove(id)
    }

    pub fn is_empty(&self) -> bool {
        self.keyrings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyrings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{build_input, build_psbt};
    use crate::types::Utxo;

    const TEST_WIF: &str = "L1NstttD9o7ssouMCzgMymwaWFYpNnq7WzkEP32MRdpDd4EKvqKP";

    fn signer(address_type: AddressType) -> LocalSigner {
        LocalSigner::from_wif(TEST_WIF, address_type, &NetworkParams::mainnet()).unwrap()
    }

    fn utxo(value: u64, vout: u32) -> Utxo {
        Utxo {
            txid: "ab".repeat(32),
            vout,
            value,
            height: 0,
            atomicals: vec![],
            script_pubkey: None,
        }
    }

    fn psbt_for(signer: &LocalSigner, values: &[u64], send: u64) -> Psbt {
        let script = signer.account_script().unwrap();
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                build_input(
                    &utxo(*v, i as u32),
                    &script,
                    signer.account().address_type,
                    signer.public_key(),
                )
                .unwrap()
            })
            .collect();
        build_psbt(records, &[(script, send)]).unwrap()
    }

    #[test]
    fn resolve_rejects_foreign_address() {
        let account = signer(AddressType::P2WPKH).account();
        let specs = vec![ToSignInputSpec::ByAddress {
            address: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string(),
            index: 0,
            sighash_types: None,
        }];
        let err = resolve_to_sign_inputs(&specs, &account, 1).unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }

    #[test]
    fn resolve_accepts_case_insensitive_pubkey_and_checks_range() {
        let account = signer(AddressType::P2WPKH).account();
        let specs = vec![ToSignInputSpec::ByPublicKey {
            public_key: account.public_key.to_uppercase(),
            index: 0,
            sighash_types: Some(vec![1]),
        }];
        let resolved = resolve_to_sign_inputs(&specs, &account, 1).unwrap();
        assert_eq!(resolved[0].public_key, account.public_key);
        assert_eq!(resolved[0].sighash_types, Some(vec![1]));

        let out_of_range = vec![ToSignInputSpec::ByIndex {
            index: 5,
            sighash_types: None,
        }];
        assert!(resolve_to_sign_inputs(&out_of_range, &account, 1).is_err());
    }

    #[tokio::test]
    async fn signs_and_finalizes_segwit_inputs() {
        let signer = signer(AddressType::P2WPKH);
        let mut psbt = psbt_for(&signer, &[50_000, 30_000], 70_000);

        sign_psbt(&mut psbt, &signer, &SignOptions::default(), false)
            .await
            .unwrap();

        for input in &psbt.inputs {
            let witness = input.final_script_witness.as_ref().unwrap();
            assert_eq!(witness.len(), 2);
            assert!(input.partial_sigs.is_empty());
        }
        let tx = psbt.extract_tx().unwrap();
        assert_eq!(tx.input.len(), 2);
    }

    #[tokio::test]
    async fn signs_taproot_key_path() {
        let signer = signer(AddressType::P2TR);
        let mut psbt = psbt_for(&signer, &[80_000], 79_000);
        // Drop the internal key to exercise recovery on externally built inputs.
        psbt.inputs[0].tap_internal_key = None;

        sign_psbt(&mut psbt, &signer, &SignOptions::default(), false)
            .await
            .unwrap();

        let witness = psbt.inputs[0].final_script_witness.as_ref().unwrap();
        assert_eq!(witness.len(), 1);
        // Key-path signature with default sighash type is 64 bytes.
        assert_eq!(witness.iter().next().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn legacy_requires_compatibility_mode() {
        let signer = signer(AddressType::P2PKH);
        let mut psbt = psbt_for(&signer, &[40_000], 39_000);

        let err = sign_psbt(&mut psbt, &signer, &SignOptions::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));

        let mut psbt = psbt_for(&signer, &[40_000], 39_000);
        sign_psbt(&mut psbt, &signer, &SignOptions::default(), true)
            .await
            .unwrap();
        let script_sig = psbt.inputs[0].final_script_sig.as_ref().unwrap();
        assert!(!script_sig.is_empty());
        assert!(psbt.inputs[0].final_script_witness.is_none());
    }

    #[tokio::test]
    async fn nested_segwit_finalizes_with_redeem_push() {
        let signer = signer(AddressType::P2SH);
        let mut psbt = psbt_for(&signer, &[60_000], 59_000);

        sign_psbt(&mut psbt, &signer, &SignOptions::default(), false)
            .await
            .unwrap();

        assert!(psbt.inputs[0].final_script_witness.is_some());
        assert!(psbt.inputs[0].final_script_sig.is_some());
        let tx = psbt.extract_tx().unwrap();
        assert!(!tx.input[0].script_sig.is_empty());
        assert_eq!(tx.input[0].witness.len(), 2);
    }

    #[tokio::test]
    async fn refuses_when_nothing_matches() {
        let segwit = signer(AddressType::P2WPKH);
        let taproot = signer(AddressType::P2TR);
        // A PSBT spending the taproot script has nothing for the segwit account.
        let mut psbt = psbt_for(&taproot, &[10_000], 9_000);

        let err = sign_psbt(&mut psbt, &segwit, &SignOptions::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Signing(msg) if msg == "no input to sign"));
    }

    #[tokio::test]
    async fn skips_already_finalized_inputs() {
        let signer = signer(AddressType::P2WPKH);
        let mut psbt = psbt_for(&signer, &[25_000, 25_000], 49_000);
        sign_psbt(&mut psbt, &signer, &SignOptions::default(), false)
            .await
            .unwrap();

        // Re-detect on the finalized PSBT: nothing left to sign.
        let account = signer.account();
        let script = signer.account_script().unwrap();
        assert!(detect_own_inputs(&psbt, &account, &script).is_empty());
    }

    #[test]
    fn registry_is_session_scoped() {
        let mut registry = KeyringRegistry::new();
        assert!(registry.is_empty());
        registry.insert("hd-0", Box::new(signer(AddressType::P2TR)));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("hd-0").is_some());
        assert!(registry.remove("hd-0").is_some());
        assert!(registry.get("hd-0").is_none());
    }
}
