//! Per-conversion history.

use std::collections::HashMap;

use bridgeledger_common::{
    AccountId, Price, RecordId, SourceTxId, TargetAmount, Timestamp, UsdValue,
};
use serde::{Deserialize, Serialize};

/// One accepted conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: RecordId,
    /// Sequence number of the unit of work that accepted this conversion.
    /// Every item of a batch shares it.
    pub unit_seq: u64,
    pub submitter: AccountId,
    pub source_tx_id: SourceTxId,
    /// Source base units.
    pub source_amount: u64,
    pub usd_value: UsdValue,
    pub target_amount: TargetAmount,
    /// Prices the conversion was computed with.
    pub source_price: Price,
    pub target_price: Price,
    pub timestamp: Timestamp,
}

/// Append-only record store indexed by transaction id and submitter.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<ConversionRecord>,
    by_tx: HashMap<SourceTxId, usize>,
    by_account: HashMap<AccountId, Vec<usize>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: ConversionRecord) {
        let index = self.records.len();
        self.by_tx.insert(record.source_tx_id, index);
        self.by_account
            .entry(record.submitter.clone())
            .or_default()
            .push(index);
        self.records.push(record);
    }

    /// Record for a source transaction, if it was converted.
    pub fn by_tx(&self, tx_id: &SourceTxId) -> Option<&ConversionRecord> {
        self.by_tx.get(tx_id).map(|&i| &self.records[i])
    }

    /// Records of a submitter, oldest first.
    pub fn by_account(&self, account: &AccountId) -> Vec<ConversionRecord> {
        self.by_account
            .get(account)
            .map(|indices| indices.iter().map(|&i| self.records[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Every record, oldest first.
    pub fn all(&self) -> &[ConversionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
