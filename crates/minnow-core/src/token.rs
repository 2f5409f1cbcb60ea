//! Token conservation rules.
//!
//! A transaction spending token-carrying UTXOs must balance every category:
//! fungible amounts are conserved exactly, and each NFT output must be
//! backed by an NFT input of the same category. A minting-capability input
//! (the mint baton) may back any number of new NFTs of its category.

use std::collections::{HashMap, HashSet};

use crate::error::TokenError;
use crate::types::{Hash256, NftCapability, TxOutput, Utxo};

/// Per-category token flow on one side of a transaction.
#[derive(Debug, Default, Clone)]
struct CategoryFlow {
    fungible: u64,
    nft_count: usize,
}

/// Verify token conservation between a transaction's outputs and the source
/// outputs its inputs consume.
///
/// Rules, per category:
/// - the fungible output sum must equal the fungible input sum;
/// - the NFT output count must not exceed the NFT input count, unless the
///   inputs include a minting-capability NFT of that category.
///
/// Categories appearing only on one side fail the fungible rule with a zero
/// on the other side (genesis and burn flows are handled by callers before
/// this check).
pub fn verify_conservation(outputs: &[TxOutput], sources: &[Utxo]) -> Result<(), TokenError> {
    let mut inputs_by_category: HashMap<Hash256, CategoryFlow> = HashMap::new();
    let mut minting_categories: HashSet<Hash256> = HashSet::new();

    for source in sources {
        let Some(token) = &source.token else { continue };
        let flow = inputs_by_category.entry(token.category).or_default();
        flow.fungible = flow
            .fungible
            .checked_add(token.amount)
            .ok_or_else(|| TokenError::AmountOverflow {
                category: token.category.to_string(),
            })?;
        if let Some(nft) = &token.nft {
            flow.nft_count += 1;
            if nft.capability == NftCapability::Minting {
                minting_categories.insert(token.category);
            }
        }
    }

    let mut outputs_by_category: HashMap<Hash256, CategoryFlow> = HashMap::new();
    for output in outputs {
        let Some(token) = &output.token else { continue };
        let flow = outputs_by_category.entry(token.category).or_default();
        flow.fungible = flow
            .fungible
            .checked_add(token.amount)
            .ok_or_else(|| TokenError::AmountOverflow {
                category: token.category.to_string(),
            })?;
        if token.nft.is_some() {
            flow.nft_count += 1;
        }
    }

    let categories: HashSet<Hash256> = inputs_by_category
        .keys()
        .chain(outputs_by_category.keys())
        .copied()
        .collect();

    for category in categories {
        let input = inputs_by_category.get(&category).cloned().unwrap_or_default();
        let output = outputs_by_category.get(&category).cloned().unwrap_or_default();

        if input.fungible != output.fungible {
            return Err(TokenError::FungibleMismatch {
                category: category.to_string(),
                inputs: input.fungible,
                outputs: output.fungible,
            });
        }

        if output.nft_count > input.nft_count && !minting_categories.contains(&category) {
            return Err(TokenError::UnbackedNft {
                category: category.to_string(),
                inputs: input.nft_count,
                outputs: output.nft_count,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NftData, OutPoint, TokenData};

    fn cat(byte: u8) -> Hash256 {
        Hash256([byte; 32])
    }

    fn source(value: u64, token: Option<TokenData>) -> Utxo {
        Utxo {
            outpoint: OutPoint {
                txid: Hash256([0x01; 32]),
                vout: 0,
            },
            value,
            pubkey_hash: Hash256([0xAA; 32]),
            token,
        }
    }

    fn output(value: u64, token: Option<TokenData>) -> TxOutput {
        TxOutput {
            value,
            lock: crate::types::OutputLock::PubkeyHash(Hash256([0xBB; 32])),
            token,
        }
    }

    #[test]
    fn plain_transaction_conserves() {
        let sources = vec![source(10_000, None)];
        let outputs = vec![output(9_000, None)];
        verify_conservation(&outputs, &sources).unwrap();
    }

    #[test]
    fn fungible_balanced() {
        let sources = vec![source(1000, Some(TokenData::fungible(cat(1), 50)))];
        let outputs = vec![
            output(546, Some(TokenData::fungible(cat(1), 30))),
            output(546, Some(TokenData::fungible(cat(1), 20))),
        ];
        verify_conservation(&outputs, &sources).unwrap();
    }

    #[test]
    fn fungible_mismatch_rejected() {
        let sources = vec![source(1000, Some(TokenData::fungible(cat(1), 50)))];
        let outputs = vec![output(546, Some(TokenData::fungible(cat(1), 49)))];
        let err = verify_conservation(&outputs, &sources).unwrap_err();
        assert!(matches!(err, TokenError::FungibleMismatch { inputs: 50, outputs: 49, .. }));
    }

    #[test]
    fn output_only_category_rejected() {
        let sources = vec![source(1000, None)];
        let outputs = vec![output(546, Some(TokenData::fungible(cat(2), 1)))];
        let err = verify_conservation(&outputs, &sources).unwrap_err();
        assert!(matches!(err, TokenError::FungibleMismatch { inputs: 0, outputs: 1, .. }));
    }

    #[test]
    fn nft_one_to_one_passes() {
        let sources = vec![source(
            1000,
            Some(TokenData::nft(cat(3), NftCapability::Immutable, vec![0x00])),
        )];
        let outputs = vec![output(
            546,
            Some(TokenData::nft(cat(3), NftCapability::Immutable, vec![0x00])),
        )];
        verify_conservation(&outputs, &sources).unwrap();
    }

    #[test]
    fn extra_nft_output_rejected() {
        let sources = vec![source(
            1000,
            Some(TokenData::nft(cat(3), NftCapability::Immutable, vec![0x00])),
        )];
        let outputs = vec![
            output(546, Some(TokenData::nft(cat(3), NftCapability::Immutable, vec![0x00]))),
            output(546, Some(TokenData::nft(cat(3), NftCapability::Immutable, vec![0x01]))),
        ];
        let err = verify_conservation(&outputs, &sources).unwrap_err();
        assert!(matches!(err, TokenError::UnbackedNft { inputs: 1, outputs: 2, .. }));
    }

    #[test]
    fn minting_baton_backs_many_nfts() {
        let sources = vec![source(
            1000,
            Some(TokenData::nft(cat(4), NftCapability::Minting, vec![])),
        )];
        let outputs = vec![
            output(546, Some(TokenData::nft(cat(4), NftCapability::Minting, vec![]))),
            output(546, Some(TokenData::nft(cat(4), NftCapability::Immutable, vec![0x01]))),
            output(546, Some(TokenData::nft(cat(4), NftCapability::Immutable, vec![0x02]))),
        ];
        verify_conservation(&outputs, &sources).unwrap();
    }

    #[test]
    fn hybrid_token_balances_both_halves() {
        let hybrid_in = TokenData {
            category: cat(5),
            amount: 100,
            nft: Some(NftData::new(NftCapability::Mutable, vec![0xAB])),
        };
        let sources = vec![source(1000, Some(hybrid_in))];
        let outputs = vec![
            output(546, Some(TokenData {
                category: cat(5),
                amount: 100,
                nft: Some(NftData::new(NftCapability::Mutable, vec![0xCD])),
            })),
        ];
        verify_conservation(&outputs, &sources).unwrap();
    }

    #[test]
    fn multiple_categories_independent() {
        let sources = vec![
            source(1000, Some(TokenData::fungible(cat(6), 10))),
            source(1000, Some(TokenData::fungible(cat(7), 20))),
        ];
        let outputs = vec![
            output(546, Some(TokenData::fungible(cat(6), 10))),
            output(546, Some(TokenData::fungible(cat(7), 19))),
        ];
        let err = verify_conservation(&outputs, &sources).unwrap_err();
        match err {
            TokenError::FungibleMismatch { category, inputs, outputs } => {
                assert_eq!(category, cat(7).to_string());
                assert_eq!((inputs, outputs), (20, 19));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overflow_detected() {
        let sources = vec![
            source(1000, Some(TokenData::fungible(cat(8), u64::MAX))),
            source(1000, Some(TokenData::fungible(cat(8), 1))),
        ];
        let outputs = vec![];
        let err = verify_conservation(&outputs, &sources).unwrap_err();
        assert!(matches!(err, TokenError::AmountOverflow { .. }));
    }
}
