//! Transaction construction, signing, and encoding.
//!
//! The builder is the last stage of the pipeline: it takes an already
//! selected input set and a fee, assembles the outputs through
//! [`OutputAssembler`], resolves a signing key per input (explicit key
//! first, wallet cache second), signs, and encodes. Phases always run in
//! that order because signing commits to the exact output layout.

use tracing::debug;

use minnow_core::address::Address;
use minnow_core::constants::{TX_LOCK_TIME, TX_VERSION};
use minnow_core::crypto::{self, KeyPair};
use minnow_core::token::verify_conservation;
use minnow_core::types::{Transaction, TxInput, Utxo};

use crate::cache::WalletCache;
use crate::error::WalletError;
use crate::outputs::OutputAssembler;
use crate::request::{FeePaidBy, SendRequest};

/// A finished build: the transaction, its canonical bytes, and the source
/// output behind each input (needed to verify or re-sign later).
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    pub encoded: Vec<u8>,
    pub source_outputs: Vec<Utxo>,
}

/// Assembles, signs, and encodes transactions.
pub struct TransactionBuilder;

impl TransactionBuilder {
    /// Build, sign, and encode a transaction.
    ///
    /// Each input's key is resolved from `signing_key` when given, else
    /// from `cache` by the input's pubkey hash; an input with neither
    /// fails with [`WalletError::MissingSigningKey`].
    ///
    /// Token conservation is re-verified across the assembled transaction
    /// for fee-bearing builds. Zero-fee builds skip the check: they are
    /// draft measurements for the precise fee estimator, never broadcast.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        inputs: &[Utxo],
        requests: &[SendRequest],
        signing_key: Option<&KeyPair>,
        fee: u64,
        discard_change: bool,
        fee_paid_by: &FeePaidBy,
        change_address: &Address,
        cache: Option<&WalletCache>,
    ) -> Result<BuiltTransaction, WalletError> {
        let mut transaction = Self::construct(
            inputs,
            requests,
            fee,
            discard_change,
            fee_paid_by,
            change_address,
        )?;

        if fee > 0 {
            verify_conservation(&transaction.outputs, inputs)?;
        }

        for (index, source) in inputs.iter().enumerate() {
            let key = Self::resolve_key(source, signing_key, cache)?;
            crypto::sign_transaction_input(&mut transaction, index, source, &key)?;
        }

        let encoded = transaction.encode()?;
        debug!(
            inputs = inputs.len(),
            outputs = transaction.outputs.len(),
            bytes = encoded.len(),
            fee,
            "transaction built"
        );

        Ok(BuiltTransaction {
            transaction,
            encoded,
            source_outputs: inputs.to_vec(),
        })
    }

    /// Build without signing: every input's unlocking data is left blank,
    /// for external or multi-party signing flows.
    pub fn build_unsigned(
        inputs: &[Utxo],
        requests: &[SendRequest],
        fee: u64,
        discard_change: bool,
        fee_paid_by: &FeePaidBy,
        change_address: &Address,
    ) -> Result<BuiltTransaction, WalletError> {
        let transaction = Self::construct(
            inputs,
            requests,
            fee,
            discard_change,
            fee_paid_by,
            change_address,
        )?;

        if fee > 0 {
            verify_conservation(&transaction.outputs, inputs)?;
        }

        let encoded = transaction.encode()?;
        Ok(BuiltTransaction {
            transaction,
            encoded,
            source_outputs: inputs.to_vec(),
        })
    }

    /// Re-attach unlocking data to a previously built unsigned transaction,
    /// using the source-output metadata returned with it.
    pub fn sign_unsigned_transaction(
        mut transaction: Transaction,
        source_outputs: &[Utxo],
        signing_key: Option<&KeyPair>,
        cache: Option<&WalletCache>,
    ) -> Result<BuiltTransaction, WalletError> {
        if transaction.inputs.len() != source_outputs.len() {
            return Err(minnow_core::error::TransactionError::SourceOutputMismatch {
                sources: source_outputs.len(),
                inputs: transaction.inputs.len(),
            }
            .into());
        }
        for (input, source) in transaction.inputs.iter().zip(source_outputs) {
            if input.previous_output != source.outpoint {
                return Err(WalletError::Build(format!(
                    "source output {} does not match input outpoint {}",
                    source.outpoint, input.previous_output
                )));
            }
        }

        for (index, source) in source_outputs.iter().enumerate() {
            let key = Self::resolve_key(source, signing_key, cache)?;
            crypto::sign_transaction_input(&mut transaction, index, source, &key)?;
        }

        let encoded = transaction.encode()?;
        Ok(BuiltTransaction {
            transaction,
            encoded,
            source_outputs: source_outputs.to_vec(),
        })
    }

    /// Construct the unsigned transaction: balance the amounts, run the
    /// output assembler, fix version and lock time.
    fn construct(
        inputs: &[Utxo],
        requests: &[SendRequest],
        fee: u64,
        discard_change: bool,
        fee_paid_by: &FeePaidBy,
        change_address: &Address,
    ) -> Result<Transaction, WalletError> {
        if inputs.is_empty() {
            return Err(WalletError::Build("no inputs".into()));
        }
        if requests.is_empty() {
            return Err(WalletError::Build("no outputs requested".into()));
        }

        let total_in = inputs.iter().try_fold(0u64, |acc, u| {
            acc.checked_add(u.value)
                .ok_or_else(|| WalletError::InvalidAmount("input value overflow".into()))
        })?;
        let request_total = SendRequest::total_satoshis(requests)?;

        let change_amount = total_in as i128 - request_total as i128 - fee as i128;
        let outputs = OutputAssembler::assemble(
            requests,
            fee,
            fee_paid_by,
            change_amount,
            change_address,
            discard_change,
        )?;

        Ok(Transaction {
            version: TX_VERSION,
            inputs: inputs
                .iter()
                .map(|u| TxInput::unsigned(u.outpoint))
                .collect(),
            outputs,
            lock_time: TX_LOCK_TIME,
        })
    }

    /// Explicit key first, cache lookup second, error third.
    fn resolve_key(
        source: &Utxo,
        signing_key: Option<&KeyPair>,
        cache: Option<&WalletCache>,
    ) -> Result<KeyPair, WalletError> {
        if let Some(key) = signing_key {
            return Ok(key.clone());
        }
        if let Some(cache) = cache {
            if let Some(key) = cache.signing_key_for(&source.pubkey_hash) {
                return Ok(key);
            }
        }
        Err(WalletError::MissingSigningKey(source.pubkey_hash.to_string()))
    }
}
