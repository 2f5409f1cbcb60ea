//! Token-aware UTXO selection.
//!
//! Selection runs in ordered phases: caller-pinned UTXOs first, then one
//! matching UTXO per token transfer request, then plain UTXOs greedily in
//! input order until the required amount is covered. The selector is
//! correctness-first: first match in input order wins, with no attempt to
//! minimize input count or leftover change.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use minnow_core::types::{Hash256, NftCapability, OutPoint, Utxo};

use crate::error::WalletError;
use crate::request::{FeePaidBy, SendRequest, TokenOperation};

/// Token-aware coin selector.
pub struct UtxoSelector;

impl UtxoSelector {
    /// Select a sufficient input set from `available`.
    ///
    /// # Arguments
    /// - `available` — the caller's known spendable UTXOs, in input order
    /// - `must_include` — caller-pinned UTXOs seeding the selection
    /// - `amount_required` — satoshis the selection must cover, or `None`
    ///   to select everything (send-max)
    /// - `requests` — the send requests; token transfers each claim an input
    /// - `token_operation` — token matching only runs for [`TokenOperation::Send`]
    /// - `fee_paid_by` — policies other than change-funded skip the final
    ///   sufficiency check
    pub fn select(
        available: &[Utxo],
        must_include: &[Utxo],
        amount_required: Option<u64>,
        requests: &[SendRequest],
        token_operation: TokenOperation,
        fee_paid_by: &FeePaidBy,
    ) -> Result<Vec<Utxo>, WalletError> {
        let mut selected: Vec<Utxo> = Vec::new();
        let mut seen: HashSet<OutPoint> = HashSet::new();

        // Phase 1: caller-pinned UTXOs, deduplicated on outpoint.
        for utxo in must_include {
            if seen.insert(utxo.outpoint) {
                selected.push(utxo.clone());
            }
        }

        // Phase 2: one matching UTXO per token transfer request.
        if token_operation == TokenOperation::Send {
            let mut nft_claims: HashMap<OutPoint, u32> = HashMap::new();
            for request in requests {
                let SendRequest::TokenTransfer { category, nft, .. } = request else {
                    continue;
                };
                match nft {
                    None => {
                        Self::match_fungible(category, available, &mut selected, &mut seen)?
                    }
                    Some(want) => Self::match_nft(
                        category,
                        want.capability,
                        &want.commitment,
                        available,
                        &mut selected,
                        &mut seen,
                        &mut nft_claims,
                    )?,
                }
            }
        }

        let mut amount_available: u64 = selected.iter().map(|u| u.value).sum();

        // Phase 3: plain UTXOs greedily in input order. Without a target
        // amount everything spendable is taken (send-max).
        for utxo in available {
            if let Some(required) = amount_required {
                if amount_available > required {
                    break;
                }
            }
            if utxo.has_token() || seen.contains(&utxo.outpoint) {
                continue;
            }
            seen.insert(utxo.outpoint);
            amount_available += utxo.value;
            selected.push(utxo.clone());
        }

        debug!(
            inputs = selected.len(),
            amount_available,
            ?amount_required,
            "utxo selection complete"
        );

        // Phase 4: fee policies that do not draw on change skip the
        // sufficiency check entirely.
        if !fee_paid_by.requires_sufficiency_check() {
            return Ok(selected);
        }

        // Phase 5: no target amount means the selection is returned as-is.
        let Some(required) = amount_required else {
            return Ok(selected);
        };

        // Phase 6: the selection must cover the target.
        if amount_available >= required {
            Ok(selected)
        } else {
            Err(WalletError::InsufficientFunds {
                required,
                available: amount_available,
            })
        }
    }

    /// Satisfy a fungible-only transfer request.
    ///
    /// Presence of the category anywhere in the selection is sufficient; a
    /// single UTXO may back any number of fungible requests of its category.
    fn match_fungible(
        category: &Hash256,
        available: &[Utxo],
        selected: &mut Vec<Utxo>,
        seen: &mut HashSet<OutPoint>,
    ) -> Result<(), WalletError> {
        if selected.iter().any(|u| u.has_category(category)) {
            trace!(%category, "fungible request satisfied by existing selection");
            return Ok(());
        }
        let found = available
            .iter()
            .find(|u| !seen.contains(&u.outpoint) && u.has_category(category));
        match found {
            Some(utxo) => {
                trace!(%category, outpoint = %utxo.outpoint, "fungible token utxo selected");
                seen.insert(utxo.outpoint);
                selected.push(utxo.clone());
                Ok(())
            }
            None => Err(WalletError::MissingTokenUtxo {
                category: *category,
                capability: None,
                commitment: None,
            }),
        }
    }

    /// Satisfy an NFT transfer request.
    ///
    /// Each NFT request must claim its own UTXO; the claim counter prevents
    /// two requests from consuming the same NFT. Minting and mutable
    /// requests fall back to any UTXO holding the capability, since owning
    /// the baton matters more than the exact commitment.
    #[allow(clippy::too_many_arguments)]
    fn match_nft(
        category: &Hash256,
        capability: NftCapability,
        commitment: &[u8],
        available: &[Utxo],
        selected: &mut Vec<Utxo>,
        seen: &mut HashSet<OutPoint>,
        nft_claims: &mut HashMap<OutPoint, u32>,
    ) -> Result<(), WalletError> {
        let exact = |u: &Utxo| {
            u.has_category(category)
                && u.nft()
                    .is_some_and(|n| n.capability == capability && n.commitment == commitment)
        };
        let same_capability = |u: &Utxo| {
            u.has_category(category) && u.nft().is_some_and(|n| n.capability == capability)
        };

        let mut matched =
            Self::find_unclaimed(selected, available, seen, nft_claims, &exact);
        if matched.is_none()
            && matches!(capability, NftCapability::Minting | NftCapability::Mutable)
        {
            matched =
                Self::find_unclaimed(selected, available, seen, nft_claims, &same_capability);
        }

        let Some((utxo, already_selected)) = matched else {
            return Err(WalletError::MissingTokenUtxo {
                category: *category,
                capability: Some(capability),
                commitment: Some(hex::encode(commitment)),
            });
        };

        trace!(%category, outpoint = %utxo.outpoint, "nft utxo claimed");
        *nft_claims.entry(utxo.outpoint).or_insert(0) += 1;
        if !already_selected {
            seen.insert(utxo.outpoint);
            selected.push(utxo);
        }
        Ok(())
    }

    /// Find the first unclaimed NFT UTXO matching `pred`, searching the
    /// current selection before the full available set. The bool is true if
    /// the match was already selected.
    fn find_unclaimed(
        selected: &[Utxo],
        available: &[Utxo],
        seen: &HashSet<OutPoint>,
        nft_claims: &HashMap<OutPoint, u32>,
        pred: &dyn Fn(&Utxo) -> bool,
    ) -> Option<(Utxo, bool)> {
        let unclaimed = |u: &Utxo| nft_claims.get(&u.outpoint).copied().unwrap_or(0) == 0;

        if let Some(u) = selected.iter().find(|u| pred(u) && unclaimed(u)) {
            return Some((u.clone(), true));
        }
        available
            .iter()
            .find(|u| !seen.contains(&u.outpoint) && pred(u) && unclaimed(u))
            .map(|u| (u.clone(), false))
    }
}
