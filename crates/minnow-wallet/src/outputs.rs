//! Output assembly: fee allocation, request conversion, and change.
//!
//! Converts abstract [`SendRequest`]s into protocol outputs, subtracting the
//! fee from whichever outputs the [`FeePaidBy`] policy designates, and
//! appends a change output when the remainder clears the dust threshold.

use minnow_core::address::Address;
use minnow_core::constants::{DUST_THRESHOLD, MAX_COMMITMENT_LEN};
use minnow_core::error::TransactionError;
use minnow_core::types::{TokenData, TxOutput};

use crate::error::WalletError;
use crate::request::{FeePaidBy, SendRequest};

/// One request converted to concrete satoshis, before fee deduction.
struct PendingOutput {
    value: u64,
    output: TxOutput,
    /// Data carriers never absorb fees.
    bears_fee: bool,
}

/// Converts requests to protocol outputs and applies the fee policy.
pub struct OutputAssembler;

impl OutputAssembler {
    /// Assemble the final output list.
    ///
    /// `change_amount` is the *natural* change (inputs minus requested
    /// outputs minus fee), which may be negative when a non-change fee
    /// policy let selection skip the sufficiency check. Fee shares deducted
    /// from request outputs flow back into the change, so the transaction
    /// always balances.
    ///
    /// The change output is appended only when its value clears
    /// [`DUST_THRESHOLD`]; otherwise the remainder is silently absorbed as
    /// additional fee. `discard_change` forces the remainder into the fee
    /// unconditionally.
    pub fn assemble(
        requests: &[SendRequest],
        fee: u64,
        fee_paid_by: &FeePaidBy,
        change_amount: i128,
        change_address: &Address,
        discard_change: bool,
    ) -> Result<Vec<TxOutput>, WalletError> {
        let mut pending = requests
            .iter()
            .map(Self::convert)
            .collect::<Result<Vec<_>, _>>()?;

        let deducted = Self::apply_fee_policy(&mut pending, fee, fee_paid_by, change_amount)?;

        let mut outputs: Vec<TxOutput> = pending
            .into_iter()
            .map(|p| {
                let mut out = p.output;
                out.value = p.value;
                out
            })
            .collect();

        let change = change_amount + deducted as i128;
        if change < 0 {
            return Err(WalletError::Build(format!(
                "outputs and fee exceed input value by {} satoshis",
                -change
            )));
        }
        if !discard_change && change > DUST_THRESHOLD as i128 {
            outputs.push(TxOutput::pay(change as u64, change_address.pubkey_hash()));
        }

        Ok(outputs)
    }

    /// Convert one request into a pending protocol output.
    ///
    /// This is where non-integral satoshi values and oversized commitments
    /// are rejected.
    fn convert(request: &SendRequest) -> Result<PendingOutput, WalletError> {
        match request {
            SendRequest::PlainValue { address, .. } => {
                let value = request.value_satoshis()?;
                Ok(PendingOutput {
                    value,
                    output: TxOutput::pay(value, address.pubkey_hash()),
                    bears_fee: true,
                })
            }
            SendRequest::TokenTransfer {
                address,
                category,
                amount,
                nft,
            } => {
                if let Some(nft) = nft {
                    if nft.commitment.len() > MAX_COMMITMENT_LEN {
                        return Err(TransactionError::OversizedCommitment {
                            len: nft.commitment.len(),
                            max: MAX_COMMITMENT_LEN,
                        }
                        .into());
                    }
                }
                let value = request.value_satoshis()?;
                let token = TokenData {
                    category: *category,
                    amount: amount.unwrap_or(0),
                    nft: nft.clone(),
                };
                Ok(PendingOutput {
                    value,
                    output: TxOutput::pay_token(value, address.pubkey_hash(), token),
                    bears_fee: true,
                })
            }
            SendRequest::DataOutput { data } => Ok(PendingOutput {
                value: 0,
                output: TxOutput::data(data.clone()),
                bears_fee: false,
            }),
        }
    }

    /// Deduct the fee from the outputs the policy designates.
    ///
    /// Returns the total deducted from request outputs (which flows back
    /// into the change).
    fn apply_fee_policy(
        pending: &mut [PendingOutput],
        fee: u64,
        fee_paid_by: &FeePaidBy,
        change_amount: i128,
    ) -> Result<u64, WalletError> {
        match fee_paid_by {
            // Change-funded policies leave the request outputs untouched.
            FeePaidBy::Change | FeePaidBy::SourceAddress => Ok(0),

            FeePaidBy::EachRecipient => {
                let indexes: Vec<usize> = pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.bears_fee)
                    .map(|(i, _)| i)
                    .collect();
                Self::deduct_evenly(pending, &indexes, fee)
            }

            FeePaidBy::SpecificOutputs(indexes) => {
                for &i in indexes {
                    if i >= pending.len() {
                        return Err(WalletError::Build(format!(
                            "fee output index {i} out of range ({} outputs)",
                            pending.len()
                        )));
                    }
                    if !pending[i].bears_fee {
                        return Err(WalletError::Build(format!(
                            "fee output index {i} is a data output"
                        )));
                    }
                }
                Self::deduct_evenly(pending, indexes, fee)
            }

            FeePaidBy::ChangeThenRequests => {
                // Change absorbs what it can; only the deficit cascades.
                if change_amount >= 0 {
                    return Ok(0);
                }
                let deficit = (-change_amount) as u64;
                Self::deduct_cascading(pending, deficit)
            }

            FeePaidBy::RequestsThenChange => {
                // Requests absorb the whole fee if they can; the deducted
                // value flows back into change.
                Self::deduct_cascading(pending, fee)
            }
        }
    }

    /// Split `fee` evenly across the outputs at `indexes`; the first output
    /// also covers the division remainder.
    fn deduct_evenly(
        pending: &mut [PendingOutput],
        indexes: &[usize],
        fee: u64,
    ) -> Result<u64, WalletError> {
        if indexes.is_empty() {
            return Err(WalletError::Build(
                "fee policy designates no outputs to pay the fee".into(),
            ));
        }
        let share = fee / indexes.len() as u64;
        let remainder = fee % indexes.len() as u64;

        for (n, &i) in indexes.iter().enumerate() {
            let deduction = if n == 0 { share + remainder } else { share };
            let current = pending[i].value;
            let reduced = current.checked_sub(deduction).ok_or_else(|| {
                WalletError::Build(format!(
                    "fee share {deduction} exceeds output {i} value {current}"
                ))
            })?;
            pending[i].value = reduced;
        }
        Ok(fee)
    }

    /// Deduct `amount` from fee-bearing outputs in order, each down to zero.
    fn deduct_cascading(pending: &mut [PendingOutput], amount: u64) -> Result<u64, WalletError> {
        let mut remaining = amount;
        for p in pending.iter_mut().filter(|p| p.bears_fee) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(p.value);
            p.value -= take;
            remaining -= take;
        }
        if remaining > 0 {
            return Err(WalletError::Build(format!(
                "outputs cannot absorb {remaining} satoshis of the fee"
            )));
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minnow_core::address::Network;
    use minnow_core::types::{Hash256, NftCapability, NftData, OutputLock};

    use crate::request::{Amount, TOKEN_OUTPUT_VALUE};

    fn addr(byte: u8) -> Address {
        Address::from_pubkey_hash(Hash256([byte; 32]), Network::Mainnet)
    }

    fn plain(sats: u64, to: u8) -> SendRequest {
        SendRequest::PlainValue {
            address: addr(to),
            amount: Amount::satoshis(sats),
        }
    }

    #[test]
    fn change_policy_appends_change_output() {
        // 10_000 in, 3_000 requested, 200 fee -> change 6_800
        let requests = vec![plain(3_000, 0xBB)];
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::Change,
            6_800,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].value, 3_000);
        assert_eq!(outputs[0].lock, OutputLock::PubkeyHash(Hash256([0xBB; 32])));
        assert_eq!(outputs[1].value, 6_800);
        assert_eq!(outputs[1].lock, OutputLock::PubkeyHash(Hash256([0xAA; 32])));
    }

    #[test]
    fn dust_change_folded_into_fee() {
        let requests = vec![plain(3_000, 0xBB)];
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::Change,
            DUST_THRESHOLD as i128,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn change_just_above_dust_kept() {
        let requests = vec![plain(3_000, 0xBB)];
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::Change,
            DUST_THRESHOLD as i128 + 1,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].value, DUST_THRESHOLD + 1);
    }

    #[test]
    fn discard_change_always_folds() {
        let requests = vec![plain(3_000, 0xBB)];
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::Change,
            1_000_000,
            &addr(0xAA),
            true,
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn token_request_converted_with_fields() {
        let cat = Hash256([0x01; 32]);
        let requests = vec![SendRequest::TokenTransfer {
            address: addr(0xBB),
            category: cat,
            amount: Some(25),
            nft: Some(NftData::new(NftCapability::Mutable, vec![0x0A])),
        }];
        let outputs =
            OutputAssembler::assemble(&requests, 0, &FeePaidBy::Change, 0, &addr(0xAA), false)
                .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value, TOKEN_OUTPUT_VALUE);
        let token = outputs[0].token.as_ref().unwrap();
        assert_eq!(token.category, cat);
        assert_eq!(token.amount, 25);
        assert_eq!(token.nft.as_ref().unwrap().commitment, vec![0x0A]);
    }

    #[test]
    fn data_request_converted_zero_value() {
        let requests = vec![SendRequest::DataOutput {
            data: b"metadata".to_vec(),
        }];
        let outputs =
            OutputAssembler::assemble(&requests, 0, &FeePaidBy::Change, 0, &addr(0xAA), false)
                .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value, 0);
        assert_eq!(outputs[0].lock, OutputLock::Data(b"metadata".to_vec()));
    }

    #[test]
    fn fractional_value_rejected() {
        let requests = vec![SendRequest::PlainValue {
            address: addr(0xBB),
            amount: Amount {
                value: 10.5,
                unit: crate::request::Unit::Satoshi,
            },
        }];
        let err =
            OutputAssembler::assemble(&requests, 0, &FeePaidBy::Change, 0, &addr(0xAA), false)
                .unwrap_err();
        assert!(matches!(err, WalletError::FractionalValue(_)));
    }

    #[test]
    fn oversized_commitment_rejected() {
        let requests = vec![SendRequest::TokenTransfer {
            address: addr(0xBB),
            category: Hash256([0x02; 32]),
            amount: None,
            nft: Some(NftData::new(NftCapability::Immutable, vec![0u8; 41])),
        }];
        let err =
            OutputAssembler::assemble(&requests, 0, &FeePaidBy::Change, 0, &addr(0xAA), false)
                .unwrap_err();
        assert!(matches!(
            err,
            WalletError::Transaction(TransactionError::OversizedCommitment { len: 41, max: 40 })
        ));
    }

    #[test]
    fn each_recipient_splits_fee() {
        let requests = vec![plain(5_000, 0xB1), plain(5_000, 0xB2)];
        // natural change = in - req - fee; pick in = 12_000, fee = 300
        let outputs = OutputAssembler::assemble(
            &requests,
            300,
            &FeePaidBy::EachRecipient,
            12_000 - 10_000 - 300,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs[0].value, 4_850);
        assert_eq!(outputs[1].value, 4_850);
        // change gets the fee back: 1_700 + 300 = 2_000
        assert_eq!(outputs[2].value, 2_000);
    }

    #[test]
    fn each_recipient_odd_fee_remainder_on_first() {
        let requests = vec![plain(5_000, 0xB1), plain(5_000, 0xB2)];
        let outputs = OutputAssembler::assemble(
            &requests,
            301,
            &FeePaidBy::EachRecipient,
            1_699,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs[0].value, 5_000 - 151);
        assert_eq!(outputs[1].value, 5_000 - 150);
    }

    #[test]
    fn specific_outputs_pay_the_fee() {
        let requests = vec![plain(5_000, 0xB1), plain(5_000, 0xB2)];
        let outputs = OutputAssembler::assemble(
            &requests,
            300,
            &FeePaidBy::SpecificOutputs(vec![1]),
            1_700,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs[0].value, 5_000);
        assert_eq!(outputs[1].value, 4_700);
    }

    #[test]
    fn specific_outputs_index_out_of_range() {
        let requests = vec![plain(5_000, 0xB1)];
        let err = OutputAssembler::assemble(
            &requests,
            300,
            &FeePaidBy::SpecificOutputs(vec![3]),
            0,
            &addr(0xAA),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::Build(_)));
    }

    #[test]
    fn specific_outputs_rejects_data_output() {
        let requests = vec![SendRequest::DataOutput { data: vec![1] }];
        let err = OutputAssembler::assemble(
            &requests,
            300,
            &FeePaidBy::SpecificOutputs(vec![0]),
            0,
            &addr(0xAA),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::Build(_)));
    }

    #[test]
    fn fee_exceeding_designated_output_fails() {
        let requests = vec![plain(100, 0xB1)];
        let err = OutputAssembler::assemble(
            &requests,
            300,
            &FeePaidBy::EachRecipient,
            0,
            &addr(0xAA),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::Build(_)));
    }

    #[test]
    fn change_then_requests_with_sufficient_change() {
        let requests = vec![plain(5_000, 0xB1)];
        // change covers the fee: behaves exactly like Change
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::ChangeThenRequests,
            4_800,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs[0].value, 5_000);
        assert_eq!(outputs[1].value, 4_800);
    }

    #[test]
    fn change_then_requests_cascades_deficit() {
        let requests = vec![plain(5_000, 0xB1)];
        // natural change is -150: the request output covers the deficit
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::ChangeThenRequests,
            -150,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value, 4_850);
    }

    #[test]
    fn requests_then_change_refunds_deduction() {
        let requests = vec![plain(5_000, 0xB1)];
        // in = 10_000, fee = 200 -> natural change 4_800; request pays the
        // fee so change comes back to 5_000
        let outputs = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::RequestsThenChange,
            4_800,
            &addr(0xAA),
            false,
        )
        .unwrap();
        assert_eq!(outputs[0].value, 4_800);
        assert_eq!(outputs[1].value, 5_000);
    }

    #[test]
    fn negative_balance_after_policy_fails() {
        let requests = vec![plain(5_000, 0xB1)];
        let err = OutputAssembler::assemble(
            &requests,
            200,
            &FeePaidBy::Change,
            -150,
            &addr(0xAA),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::Build(_)));
    }
}
