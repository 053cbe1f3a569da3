//! UTXO classification. Pure given its inputs: the facade fetches the
//! UTXO set, atomicals registry, inscriptions and mempool view, and this
//! module partitions them into the balance buckets selection relies on.

use crate::traits::AtomicalsIndexProvider;
use crate::types::{
    AtomicalKind, AtomicalRegistry, FtTokenGroup, Inscription, MempoolTx, MergedUtxo, Utxo,
    WalletBalance,
};
use crate::{Result, WalletError};
use std::collections::HashSet;

/// Hard ceiling on inscription listing requests for one address. A backend
/// misreporting `total` fails loudly instead of looping.
pub const MAX_INSCRIPTION_PAGES: usize = 64;

/// Inscriptions fetched per request.
pub const INSCRIPTION_PAGE_SIZE: u64 = 100;

/// Partition an address's UTXO set.
///
/// UTXOs are ordered by descending value first (stable, so equal values
/// keep their received order). Any UTXO spent by a mempool transaction is
/// unconfirmed and excluded from every other bucket. Confirmed UTXOs are
/// tested independently for atomical tags and inscription membership; one
/// carrying both shows up in `atomicals_utxos`, `ordinals_utxos` and
/// `atomicals_with_ordinals_utxos`, and one carrying neither is a regular.
///
/// Registry entries bucket in deterministic id order. An id present on a
/// multi-atomical UTXO goes to `atomical_merged` before any FT or NFT
/// grouping is considered, so merged outputs are never double counted.
pub fn classify_balance(
    address: &str,
    output_hex: &str,
    scripthash: &str,
    mut utxos: Vec<Utxo>,
    registry: &AtomicalRegistry,
    inscriptions: &[Inscription],
    mempool_txs: &[MempoolTx],
) -> WalletBalance {
    utxos.sort_by(|a, b| b.value.cmp(&a.value));

    let unconfirmed_vins: HashSet<String> = mempool_txs
        .iter()
        .flat_map(|tx| tx.vin.iter().map(|vin| format!("{}:{}", vin.txid, vin.vout)))
        .collect();
    let inscription_outputs: HashSet<&str> =
        inscriptions.iter().map(|i| i.output.as_str()).collect();

    let mut confirmed_utxos = Vec::new();
    let mut confirmed_value = 0u64;
    let mut unconfirmed_utxos = Vec::new();
    let mut unconfirmed_value = 0u64;
    let mut atomicals_utxos = Vec::new();
    let mut atomicals_value = 0u64;
    let mut ordinals_utxos = Vec::new();
    let mut ordinals_value = 0u64;
    let mut regulars_utxos = Vec::new();
    let mut regulars_value = 0u64;
    let mut atomicals_with_ordinals_utxos = Vec::new();
    let mut atomicals_with_ordinals_value = 0u64;
    let mut merged_candidates: Vec<Utxo> = Vec::new();

    for utxo in utxos {
        let key = utxo.outpoint_key();
        if unconfirmed_vins.contains(&key) {
            unconfirmed_value += utxo.value;
            unconfirmed_utxos.push(utxo);
            continue;
        }
        confirmed_value += utxo.value;

        let is_atomical = !utxo.atomicals.is_empty();
        let is_ordinal = inscription_outputs.contains(key.as_str());
        if utxo.atomicals.len() >= 2 {
            merged_candidates.push(utxo.clone());
        }
        if is_atomical {
            atomicals_value += utxo.value;
            atomicals_utxos.push(utxo.clone());
        }
        if is_ordinal {
            ordinals_value += utxo.value;
            ordinals_utxos.push(utxo.clone());
        }
        if is_atomical && is_ordinal {
            atomicals_with_ordinals_value += utxo.value;
            atomicals_with_ordinals_utxos.push(utxo.clone());
        }
        if !is_atomical && !is_ordinal {
            regulars_value += utxo.value;
            regulars_utxos.push(utxo.clone());
        }
        confirmed_utxos.push(utxo);
    }

    let merged_ids: HashSet<&str> = merged_candidates
        .iter()
        .flat_map(|u| u.atomicals.iter().map(String::as_str))
        .collect();

    let mut atomical_merged: Vec<MergedUtxo> = Vec::new();
    let mut atomical_fts: Vec<FtTokenGroup> = Vec::new();
    let mut atomical_nfts = Vec::new();

    for (atomical_id, entry) in registry {
        // Merged membership takes priority over FT/NFT bucketing.
        if merged_ids.contains(atomical_id.as_str()) {
            for candidate in merged_candidates
                .iter()
                .filter(|u| u.atomicals.iter().any(|id| id == atomical_id))
            {
                let index = match atomical_merged
                    .iter()
                    .position(|m| m.txid == candidate.txid && m.vout == candidate.vout)
                {
                    Some(i) => i,
                    None => {
                        atomical_merged.push(MergedUtxo {
                            txid: candidate.txid.clone(),
                            vout: candidate.vout,
                            value: candidate.value,
                            atomicals: Vec::new(),
                        });
                        atomical_merged.len() - 1
                    }
                };
                atomical_merged[index].atomicals.push(entry.data.clone());
            }
            continue;
        }
        match entry.kind {
            AtomicalKind::Ft => {
                let matching: Vec<Utxo> = atomicals_utxos
                    .iter()
                    .filter(|u| u.atomicals.iter().any(|id| id == atomical_id))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    continue;
                }
                let value: u64 = matching.iter().map(|u| u.value).sum();
                let ticker = entry.ticker.clone().or_else(|| entry.data.ticker.clone());
                if let Some(group) = atomical_fts.iter_mut().find(|g| g.item.ticker == ticker) {
                    group.item.value += value;
                    group.utxos.extend(matching);
                } else {
                    let mut item = entry.data.clone();
                    item.ticker = ticker;
                    item.confirmed = true;
                    item.value = value;
                    atomical_fts.push(FtTokenGroup {
                        item,
                        utxos: matching,
                    });
                }
            }
            AtomicalKind::Nft => {
                let mut item = entry.data.clone();
                item.confirmed = entry.confirmed > 0;
                item.value = entry.confirmed;
                atomical_nfts.push(item);
            }
        }
    }

    WalletBalance {
        address: address.to_string(),
        output: output_hex.to_string(),
        scripthash: scripthash.to_string(),
        atomical_fts,
        atomical_nfts,
        atomical_merged,
        confirmed_utxos,
        confirmed_value,
        unconfirmed_utxos,
        unconfirmed_value,
        atomicals_utxos,
        atomicals_value,
        ordinals_utxos,
        ordinals_value,
        regulars_utxos,
        regulars_value,
        atomicals_with_ordinals_utxos,
        atomicals_with_ordinals_value,
    }
}

/// Pull the full inscription listing for an address, page by page, until
/// the reported total is collected. Bounded by [`MAX_INSCRIPTION_PAGES`];
/// a short or empty page before the total is reached is an error rather
/// than a silent partial listing, since missing inscriptions would let
/// selection spend an ordinal as a plain UTXO.
pub async fn fetch_all_inscriptions<P: AtomicalsIndexProvider + ?Sized>(
    provider: &P,
    address: &str,
) -> Result<Vec<Inscription>> {
    let mut collected: Vec<Inscription> = Vec::new();
    let mut cursor = 0u64;
    for _ in 0..MAX_INSCRIPTION_PAGES {
        let page = provider
            .get_address_inscriptions(address, cursor, INSCRIPTION_PAGE_SIZE)
            .await?;
        let fetched = page.list.len();
        collected.extend(page.list);
        if collected.len() as u64 >= page.total {
            return Ok(collected);
        }
        if fetched == 0 {
            return Err(WalletError::Network(format!(
                "inscription listing for {address} returned an empty page at cursor {cursor} \
                 before reaching the reported total {}",
                page.total
            )));
        }
        cursor = collected.len() as u64;
    }
    Err(WalletError::Network(format!(
        "inscription listing for {address} exceeded {MAX_INSCRIPTION_PAGES} pages"
    )))
}
