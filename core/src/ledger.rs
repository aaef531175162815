//! UTXO ledger
//!
//! Two indices over the live outputs: by owner address and by transaction id.
//! Slot `i` of an id entry is the UTXO of output `i`, or `None` once spent or
//! when the output carried no value. Batches are applied to a private clone of
//! the indices which replaces the live ones only when the whole batch succeeds.

use crate::error::LedgerError;
use crate::settings::ProtocolSettings;
use crate::transaction::{InputInfo, Transaction};
use crate::utxo::Utxo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Indices {
    by_address: HashMap<String, Vec<Arc<Utxo>>>,
    by_id: HashMap<String, Vec<Option<Arc<Utxo>>>>,
}

impl Indices {
    fn utxo(&self, info: &InputInfo) -> Result<&Arc<Utxo>, LedgerError> {
        let slots = self
            .by_id
            .get(info.transaction_id())
            .ok_or_else(|| LedgerError::UnknownTransaction(info.transaction_id().to_string()))?;
        slots
            .get(usize::from(info.output_index()))
            .and_then(Option::as_ref)
            .ok_or_else(|| LedgerError::UnknownOutput {
                transaction_id: info.transaction_id().to_string(),
                output_index: info.output_index(),
            })
    }

    fn apply(&mut self, transactions: &[Transaction], timestamp: i64) -> Result<(), LedgerError> {
        for transaction in transactions {
            self.add_outputs(transaction, timestamp)?;
        }
        for transaction in transactions {
            for input in transaction.inputs() {
                self.remove(&input.info())?;
            }
        }
        self.verify_incomes()
    }

    fn add_outputs(&mut self, transaction: &Transaction, timestamp: i64) -> Result<(), LedgerError> {
        if self.by_id.contains_key(transaction.id()) {
            return Err(LedgerError::DuplicateTransaction(transaction.id().to_string()));
        }
        let mut slots = Vec::with_capacity(transaction.outputs().len());
        for (index, output) in transaction.outputs().iter().enumerate() {
            if output.initial_value() == 0 {
                slots.push(None);
                continue;
            }
            let output_index = u16::try_from(index)
                .map_err(|_| LedgerError::TooManyOutputs(transaction.id().to_string()))?;
            let utxo = Arc::new(Utxo::new(
                InputInfo::new(output_index, transaction.id()),
                output.clone(),
                timestamp,
            ));
            self.by_address
                .entry(output.address().to_string())
                .or_default()
                .push(Arc::clone(&utxo));
            slots.push(Some(utxo));
        }
        if slots.iter().any(Option::is_some) {
            self.by_id.insert(transaction.id().to_string(), slots);
        }
        Ok(())
    }

    fn remove(&mut self, info: &InputInfo) -> Result<(), LedgerError> {
        let utxo = {
            let slots = self
                .by_id
                .get_mut(info.transaction_id())
                .ok_or_else(|| LedgerError::UnknownTransaction(info.transaction_id().to_string()))?;
            let utxo = slots
                .get_mut(usize::from(info.output_index()))
                .and_then(Option::take)
                .ok_or_else(|| LedgerError::UnknownOutput {
                    transaction_id: info.transaction_id().to_string(),
                    output_index: info.output_index(),
                })?;
            if slots.iter().all(Option::is_none) {
                self.by_id.remove(info.transaction_id());
            }
            utxo
        };
        if let Some(bucket) = self.by_address.get_mut(utxo.address()) {
            bucket.retain(|candidate| !Arc::ptr_eq(candidate, &utxo));
            if bucket.is_empty() {
                self.by_address.remove(utxo.address());
            }
        }
        Ok(())
    }

    /// An address holds at most one yielding UTXO
    fn verify_incomes(&self) -> Result<(), LedgerError> {
        for (address, utxos) in &self.by_address {
            if utxos.iter().filter(|utxo| utxo.is_yielding()).count() > 1 {
                return Err(LedgerError::MultipleIncomes(address.clone()));
            }
        }
        Ok(())
    }
}

/// Live UTXO set, or an independent snapshot of it
#[derive(Debug)]
pub struct UtxosLedger {
    settings: Arc<ProtocolSettings>,
    indices: RwLock<Indices>,
}

impl UtxosLedger {
    pub fn new(settings: Arc<ProtocolSettings>) -> Self {
        Self {
            settings,
            indices: RwLock::new(Indices::default()),
        }
    }

    pub fn settings(&self) -> &Arc<ProtocolSettings> {
        &self.settings
    }

    pub fn clear(&self) {
        *self.indices.write() = Indices::default();
    }

    /// Independent snapshot; UTXOs are immutable so they are shared, not cloned
    pub fn copy(&self) -> UtxosLedger {
        Self {
            settings: Arc::clone(&self.settings),
            indices: RwLock::new(self.indices.read().clone()),
        }
    }

    /// Replace the current state with the state of `snapshot`
    pub fn promote(&self, snapshot: UtxosLedger) {
        *self.indices.write() = snapshot.indices.into_inner();
    }

    /// Apply `transactions` as one batch, new UTXOs stamped with `timestamp`.
    /// On error the ledger is left untouched.
    pub fn update_utxos(
        &self,
        transactions: &[Transaction],
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        let mut indices = self.indices.write();
        let mut next = indices.clone();
        next.apply(transactions, timestamp)?;
        *indices = next;
        Ok(())
    }

    /// Same checks as [`UtxosLedger::update_utxos`] without keeping the result
    pub fn verify_utxos(
        &self,
        transactions: &[Transaction],
        timestamp: i64,
    ) -> Result<(), LedgerError> {
        let mut next = self.indices.read().clone();
        next.apply(transactions, timestamp)
    }

    pub fn utxo(&self, info: &InputInfo) -> Result<Utxo, LedgerError> {
        self.indices.read().utxo(info).map(|utxo| Utxo::clone(utxo))
    }

    pub fn utxos(&self, address: &str) -> Vec<Utxo> {
        self.indices
            .read()
            .by_address
            .get(address)
            .map(|utxos| utxos.iter().map(|utxo| Utxo::clone(utxo)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.indices.read().by_address.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.read().by_address.is_empty()
    }

    /// Fee left by `transaction` when spent at `timestamp`: the decayed value
    /// of its inputs minus the initial value of its outputs
    pub fn calculate_fee(
        &self,
        transaction: &Transaction,
        timestamp: i64,
    ) -> Result<u64, LedgerError> {
        let indices = self.indices.read();
        let mut inputs_value: u64 = 0;
        for input in transaction.inputs() {
            let utxo = indices.utxo(&input.info())?;
            let input_address = input.address()?;
            if utxo.address() != input_address {
                return Err(LedgerError::AddressMismatch {
                    utxo_address: utxo.address().to_string(),
                    input_address,
                });
            }
            inputs_value = inputs_value
                .checked_add(utxo.value(timestamp, &self.settings))
                .ok_or(LedgerError::Overflow)?;
        }
        let outputs_value = transaction
            .outputs()
            .iter()
            .try_fold(0u64, |sum, output| sum.checked_add(output.initial_value()))
            .ok_or(LedgerError::Overflow)?;
        let fee = inputs_value
            .checked_sub(outputs_value)
            .ok_or(LedgerError::NegativeFee)?;
        if fee < self.settings.minimal_transaction_fee {
            return Err(LedgerError::FeeTooLow {
                fee,
                minimal: self.settings.minimal_transaction_fee,
            });
        }
        Ok(fee)
    }
}

impl PartialEq for UtxosLedger {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        *self.indices.read() == *other.indices.read()
    }
}
