//! Collaborator traits. Concrete transports and keyrings live in the
//! embedding application; this crate only consumes these seams.

use crate::electrumx::{BalanceSummary, ScripthashBalanceResponse};
use crate::types::{
    AccountInfo, FeeSummary, InscriptionsPage, MempoolTx, ToSignInput, ValidationResult,
};
use crate::{Result, WalletError};
use async_trait::async_trait;
use bitcoin::psbt::Psbt;

/// Produces signatures into a PSBT for the inputs it is asked to sign.
/// Private key material never crosses this boundary in the other direction.
#[async_trait(?Send)]
pub trait KeyringSigner {
    /// The account this keyring signs for.
    fn account(&self) -> AccountInfo;

    /// Populate signatures (partial sigs or taproot key sig) for exactly
    /// the given inputs. `legacy_compatibility` must be set for P2PKH
    /// inputs carrying only a witness UTXO.
    async fn sign_transaction(
        &self,
        psbt: &mut Psbt,
        inputs: &[ToSignInput],
        legacy_compatibility: bool,
    ) -> Result<()>;
}

/// Atomicals indexer queries.
#[async_trait(?Send)]
pub trait AtomicalsIndexProvider {
    async fn atomicals_by_scripthash(&self, scripthash: &str)
        -> Result<ScripthashBalanceResponse>;

    async fn get_address_inscriptions(
        &self,
        address: &str,
        cursor: u64,
        size: u64,
    ) -> Result<InscriptionsPage>;

    /// Ask the indexer whether it will accept this transaction under
    /// Atomicals rules. A negative verdict must block broadcast.
    async fn validate_transaction(&self, raw_tx_hex: &str) -> Result<ValidationResult>;

    /// The scripthash UTXO set filtered down to one atomical id.
    async fn get_balance_summary(
        &self,
        atomical_id: &str,
        scripthash: &str,
    ) -> Result<BalanceSummary> {
        let response = self.atomicals_by_scripthash(scripthash).await?;
        let entry = response.atomicals.get(atomical_id).ok_or_else(|| {
            WalletError::InvalidParameters(format!(
                "atomical {atomical_id} not found for scripthash {scripthash}"
            ))
        })?;
        let utxos: Vec<_> = response
            .utxos
            .iter()
            .filter(|utxo| utxo.atomicals.iter().any(|id| id == atomical_id))
            .cloned()
            .collect();
        Ok(BalanceSummary {
            atomical_id: Some(entry.atomical_id.clone()),
            confirmed: entry.confirmed,
            kind: entry.kind,
            utxos,
        })
    }
}

/// Unconfirmed transaction view for an address.
#[async_trait(?Send)]
pub trait MempoolProvider {
    async fn txs_mempool(&self, address: &str) -> Result<Vec<MempoolTx>>;
}

/// Fee rate tiers.
#[async_trait(?Send)]
pub trait FeeOracleProvider {
    async fn get_fee_summary(&self) -> Result<FeeSummary>;
}

/// Raw transaction submission.
#[async_trait(?Send)]
pub trait BroadcastProvider {
    /// Returns the txid reported by the network.
    async fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String>;
}

/// Everything the wallet facade needs from the outside world, bundled.
pub trait AtomicalsProvider:
    AtomicalsIndexProvider + MempoolProvider + FeeOracleProvider + BroadcastProvider
{
}

impl<T> AtomicalsProvider for T where
    T: AtomicalsIndexProvider + MempoolProvider + FeeOracleProvider + BroadcastProvider
{
}
