//! Wallet facade: wires the pure builders to a provider and a keyring.
//!
//! Every operation fetches a fresh snapshot of the address state, builds
//! against it, and hands signing to the caller's keyring. Nothing here
//! caches balance between calls; a stale snapshot surfaces as a broadcast
//! failure, never as a silently wrong transaction.

use crate::address::{self, AddressType};
use crate::balance;
use crate::network::NetworkParams;
use crate::signer::{self, SignOptions};
use crate::tokens;
use crate::traits::{AtomicalsProvider, KeyringSigner};
use crate::transaction;
use crate::types::{SendParams, SignedTransfer, TokenTransferParams, Utxo, WalletBalance};
use crate::{Result, WalletError};
use bitcoin::psbt::Psbt;
use bitcoin::Transaction;

/// Wallet over any provider implementing the collaborator traits.
pub struct Wallet<P: AtomicalsProvider> {
    provider: P,
    network: NetworkParams,
}

impl<P: AtomicalsProvider> Wallet<P> {
    pub fn new(provider: P, network: NetworkParams) -> Self {
        Self { provider, network }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn network(&self) -> &NetworkParams {
        &self.network
    }

    /// Fetch and classify everything spendable at `address`: plain UTXOs,
    /// FT groups, NFT items, merged outputs, unconfirmed and inscribed
    /// outputs.
    pub async fn get_balance(&self, address: &str) -> Result<WalletBalance> {
        let lookup = address::detect(address, &self.network)?;
        let response = self
            .provider
            .atomicals_by_scripthash(&lookup.scripthash)
            .await?;
        let inscriptions = balance::fetch_all_inscriptions(&self.provider, address).await?;
        let mempool = self.provider.txs_mempool(address).await?;
        Ok(balance::classify_balance(
            address,
            &lookup.output,
            &lookup.scripthash,
            response.utxos,
            &response.atomicals,
            &inscriptions,
            &mempool,
        ))
    }

    /// The fee oracle's default tier: the second entry of the summary list.
    pub async fn default_fee_rate(&self) -> Result<f64> {
        let summary = self.provider.get_fee_summary().await?;
        summary
            .list
            .get(1)
            .map(|entry| entry.fee_rate)
            .ok_or_else(|| WalletError::Network("fee summary has no default tier".to_string()))
    }

    async fn resolve_fee_rate(&self, requested: Option<f64>) -> Result<f64> {
        match requested {
            Some(rate) if rate > 0.0 => Ok(rate),
            _ => self.default_fee_rate().await,
        }
    }

    /// Build and sign a plain-value payment without broadcasting it.
    pub async fn create_payment<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        params: &SendParams,
    ) -> Result<SignedTransfer> {
        let account = keyring.account();
        let balance = self.get_balance(&account.address).await?;
        let fee_rate = self.resolve_fee_rate(params.fee_rate).await?;
        let built = transaction::build_payment(&balance, params, fee_rate, &account, &self.network)?;
        self.sign_built(keyring, built.psbt, built.fee).await
    }

    /// Build, sign, and broadcast a plain-value payment.
    pub async fn send_payment<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        params: &SendParams,
    ) -> Result<SignedTransfer> {
        let mut signed = self.create_payment(keyring, params).await?;
        let txid = self.provider.broadcast_transaction(&signed.raw_tx).await?;
        log::info!("broadcast payment {txid}");
        signed.txid = Some(txid);
        Ok(signed)
    }

    /// Build and sign an FT transfer, then validate it against the indexer.
    /// A negative verdict blocks the transfer before it can be broadcast.
    pub async fn create_ft_transfer<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        params: &TokenTransferParams,
    ) -> Result<SignedTransfer> {
        let account = keyring.account();
        let balance = self.get_balance(&account.address).await?;
        let fee_rate = self.resolve_fee_rate(params.fee_rate).await?;
        let built = tokens::build_ft_transfer(params, &balance, fee_rate, &account, &self.network)?;
        let signed = self.sign_built(keyring, built.psbt, built.fee).await?;
        self.validate_signed(&signed).await?;
        Ok(signed)
    }

    /// Build and sign an NFT transfer, then validate it against the indexer.
    pub async fn create_nft_transfer<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        selected: &[Utxo],
        recipient: &str,
        fee_rate: Option<f64>,
    ) -> Result<SignedTransfer> {
        let account = keyring.account();
        let balance = self.get_balance(&account.address).await?;
        let fee_rate = self.resolve_fee_rate(fee_rate).await?;
        let built =
            tokens::build_nft_transfer(selected, recipient, &balance, fee_rate, &account, &self.network)?;
        let signed = self.sign_built(keyring, built.psbt, built.fee).await?;
        self.validate_signed(&signed).await?;
        Ok(signed)
    }

    /// Push a raw transaction, returning the txid reported by the network.
    pub async fn broadcast(&self, raw_tx_hex: &str) -> Result<String> {
        self.provider.broadcast_transaction(raw_tx_hex).await
    }

    /// Sign a serialized PSBT, accepting hex or base64 on input and
    /// returning the signed PSBT as hex.
    pub async fn sign_psbt_hex<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        psbt_data: &str,
        options: &SignOptions,
        legacy_compatibility: bool,
    ) -> Result<String> {
        let mut psbt = parse_psbt(psbt_data)?;
        signer::sign_psbt(&mut psbt, keyring, options, legacy_compatibility).await?;
        Ok(hex::encode(psbt.serialize()))
    }

    async fn sign_built<K: KeyringSigner + ?Sized>(
        &self,
        keyring: &K,
        mut psbt: Psbt,
        fee: u64,
    ) -> Result<SignedTransfer> {
        let account = keyring.account();
        let legacy_compatibility = account.address_type == AddressType::P2PKH;
        signer::sign_psbt(&mut psbt, keyring, &SignOptions::default(), legacy_compatibility)
            .await?;
        let tx: Transaction = psbt.clone().extract_tx()?;
        Ok(SignedTransfer {
            psbt_hex: hex::encode(psbt.serialize()),
            raw_tx: hex::encode(bitcoin::consensus::serialize(&tx)),
            txid: None,
            fee,
        })
    }

    async fn validate_signed(&self, signed: &SignedTransfer) -> Result<()> {
        let verdict = self.provider.validate_transaction(&signed.raw_tx).await?;
        if !verdict.valid {
            return Err(WalletError::ValidationRejected(
                verdict
                    .message
                    .unwrap_or_else(|| "transaction rejected by indexer".to_string()),
            ));
        }
        Ok(())
    }
}

/// Parse a serialized PSBT from hex, falling back to base64.
pub fn parse_psbt(data: &str) -> Result<Psbt> {
    if let Ok(bytes) = hex::decode(data) {
        if let Ok(psbt) = Psbt::deserialize(&bytes) {
            return Ok(psbt);
        }
    }
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
    Ok(Psbt::deserialize(&bytes)?)
}
