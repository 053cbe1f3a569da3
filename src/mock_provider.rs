//! Mock provider for testing. Serves canned indexer, mempool, and fee
//! oracle fixtures and records every broadcast instead of touching a
//! network. Available to downstream crates via the `test-utils` feature.

use crate::electrumx::ScripthashBalanceResponse;
use crate::traits::{
    AtomicalsIndexProvider, BroadcastProvider, FeeOracleProvider, MempoolProvider,
};
use crate::types::{
    AtomicalRegistry, FeeSummary, FeeSummaryEntry, Inscription, InscriptionsPage, MempoolTx,
    ValidationResult,
};
use crate::Result;
use async_trait::async_trait;
use bitcoin::Transaction;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory provider: every fixture is a public field, so tests set up
/// exactly the world they need and assert on what was broadcast.
pub struct MockProvider {
    /// Returned verbatim by `atomicals_by_scripthash`.
    pub scripthash_response: ScripthashBalanceResponse,
    /// Full inscription list; `get_address_inscriptions` pages over it.
    pub inscriptions: Vec<Inscription>,
    /// Returned verbatim by `txs_mempool`.
    pub mempool: Vec<MempoolTx>,
    /// Returned verbatim by `get_fee_summary`.
    pub fee_summary: FeeSummary,
    /// Verdict returned by `validate_transaction`.
    pub validation: ValidationResult,
    /// txid -> raw hex of every transaction handed to `broadcast_transaction`.
    pub broadcasted_txs: Arc<Mutex<HashMap<String, String>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            scripthash_response: ScripthashBalanceResponse {
                atomicals: AtomicalRegistry::new(),
                utxos: Vec::new(),
            },
            inscriptions: Vec::new(),
            mempool: Vec::new(),
            fee_summary: FeeSummary {
                list: vec![
                    FeeSummaryEntry {
                        title: "Fast".to_string(),
                        desc: Some("~10 min".to_string()),
                        fee_rate: 20.0,
                    },
                    FeeSummaryEntry {
                        title: "Avg".to_string(),
                        desc: Some("~30 min".to_string()),
                        fee_rate: 10.0,
                    },
                    FeeSummaryEntry {
                        title: "Slow".to_string(),
                        desc: Some("~1 hour".to_string()),
                        fee_rate: 5.0,
                    },
                ],
            },
            validation: ValidationResult {
                valid: true,
                message: None,
            },
            broadcasted_txs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Flip the indexer verdict so every validation fails with `message`.
    pub fn reject_transactions(&mut self, message: &str) {
        self.validation = ValidationResult {
            valid: false,
            message: Some(message.to_string()),
        };
    }
}

#[async_trait(?Send)]
impl AtomicalsIndexProvider for MockProvider {
    async fn atomicals_by_scripthash(
        &self,
        _scripthash: &str,
    ) -> Result<ScripthashBalanceResponse> {
        Ok(self.scripthash_response.clone())
    }

    async fn get_address_inscriptions(
        &self,
        _address: &str,
        cursor: u64,
        size: u64,
    ) -> Result<InscriptionsPage> {
        let total = self.inscriptions.len() as u64;
        let start = (cursor as usize).min(self.inscriptions.len());
        let end = start
            .saturating_add(size as usize)
            .min(self.inscriptions.len());
        Ok(InscriptionsPage {
            list: self.inscriptions[start..end].to_vec(),
            total,
        })
    }

    async fn validate_transaction(&self, _raw_tx_hex: &str) -> Result<ValidationResult> {
        Ok(self.validation.clone())
    }
}

#[async_trait(?Send)]
impl MempoolProvider for MockProvider {
    async fn txs_mempool(&self, _address: &str) -> Result<Vec<MempoolTx>> {
        Ok(self.mempool.clone())
    }
}

#[async_trait(?Send)]
impl FeeOracleProvider for MockProvider {
    async fn get_fee_summary(&self) -> Result<FeeSummary> {
        Ok(self.fee_summary.clone())
    }
}

#[async_trait(?Send)]
impl BroadcastProvider for MockProvider {
    async fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String> {
        let tx_bytes = hex::decode(raw_tx_hex)?;
        let tx: Transaction = bitcoin::consensus::deserialize(&tx_bytes)?;
        let txid = tx.compute_txid().to_string();
        self.broadcasted_txs
            .lock()
            .unwrap()
            .insert(txid.clone(), raw_tx_hex.to_string());
        Ok(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inscription(n: i64) -> Inscription {
        Inscription {
            inscription_id: Some(format!("{:064x}i0", n)),
            inscription_number: Some(n),
            output: format!("{:064x}:0", n),
        }
    }

    #[tokio::test]
    async fn pages_inscriptions_by_cursor() -> anyhow::Result<()> {
        let mut provider = MockProvider::new();
        provider.inscriptions = (0..7).map(inscription).collect();

        let first = provider.get_address_inscriptions("addr", 0, 5).await?;
        assert_eq!(first.list.len(), 5);
        assert_eq!(first.total, 7);

        let second = provider.get_address_inscriptions("addr", 5, 5).await?;
        assert_eq!(second.list.len(), 2);
        assert_eq!(second.list[0].inscription_number, Some(5));

        // Cursor past the end yields an empty page, not a panic.
        let past = provider.get_address_inscriptions("addr", 100, 5).await?;
        assert!(past.list.is_empty());
        assert_eq!(past.total, 7);
        Ok(())
    }

    #[tokio::test]
    async fn broadcast_records_txid_and_hex() -> anyhow::Result<()> {
        use bitcoin::absolute::LockTime;
        use bitcoin::transaction::Version;
        use bitcoin::{Amount, ScriptBuf, TxIn, TxOut};

        let provider = MockProvider::new();
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn::default()],
            output: vec![TxOut {
                value: Amount::from_sat(1000),
                script_pubkey: ScriptBuf::new(),
            }],
        };
        let raw = hex::encode(bitcoin::consensus::serialize(&tx));

        let txid = provider.broadcast_transaction(&raw).await?;
        assert_eq!(txid, tx.compute_txid().to_string());
        let ledger = provider.broadcasted_txs.lock().unwrap();
        assert_eq!(ledger.get(&txid), Some(&raw));
        Ok(())
    }

    #[tokio::test]
    async fn default_fee_summary_has_a_normal_tier() -> anyhow::Result<()> {
        let provider = MockProvider::new();
        let summary = provider.get_fee_summary().await?;
        assert!(summary.list.len() >= 2);
        assert_eq!(summary.list[1].fee_rate, 10.0);
        Ok(())
    }
}
