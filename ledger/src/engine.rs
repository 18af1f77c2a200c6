//! Ledger engine: replay protection, running totals and history behind a
//! single writer.
//!
//! Writers open a [`LedgerTxn`] with [`Ledger::begin`]. Only one transaction
//! is open at a time; everything it stages becomes visible in one step on
//! [`LedgerTxn::commit`]. Dropping a transaction without committing discards
//! it, including its replay reservations.

use bridgeledger_common::{
    AccountId, ConversionError, Price, RecordId, Result, SourceTxId, TargetAmount, Timestamp,
    UsdValue,
};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::record::{ConversionRecord, RecordStore};
use crate::replay::ReplayGuard;
use crate::totals::{AccountTotals, GlobalTotals, LedgerAccumulator};

/// Committed ledger state.
#[derive(Debug, Clone, Default)]
pub struct LedgerBook {
    replay: ReplayGuard,
    totals: LedgerAccumulator,
    records: RecordStore,
    last_unit_seq: u64,
}

impl LedgerBook {
    pub fn replay(&self) -> &ReplayGuard {
        &self.replay
    }

    pub fn totals(&self) -> &LedgerAccumulator {
        &self.totals
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn last_unit_seq(&self) -> u64 {
        self.last_unit_seq
    }
}

/// A conversion staged in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConversion {
    pub submitter: AccountId,
    pub source_tx_id: SourceTxId,
    pub source_amount: u64,
    pub usd_value: UsdValue,
    pub target_amount: TargetAmount,
    pub source_price: Price,
    pub target_price: Price,
    pub timestamp: Timestamp,
}

/// Result of a committed transaction.
#[derive(Debug, Clone)]
pub struct CommittedUnit {
    pub unit_seq: u64,
    pub records: Vec<ConversionRecord>,
    pub global: GlobalTotals,
}

/// The conversion ledger.
pub struct Ledger {
    book: RwLock<LedgerBook>,
    writer: Mutex<()>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            book: RwLock::new(LedgerBook::default()),
            writer: Mutex::new(()),
        }
    }

    /// Open a write transaction, waiting for any open one to finish.
    pub async fn begin(&self) -> LedgerTxn<'_> {
        let gate = self.writer.lock().await;
        debug!("Ledger transaction opened");
        // Committed state cannot change while the gate is held.
        let totals = LedgerAccumulator::overlay(self.global_totals());
        LedgerTxn {
            ledger: self,
            _gate: gate,
            staged: ReplayGuard::new(),
            totals,
            pending: Vec::new(),
        }
    }

    pub fn global_totals(&self) -> GlobalTotals {
        self.book.read().totals.global()
    }

    pub fn account_totals(&self, account: &AccountId) -> AccountTotals {
        self.book.read().totals.account(account)
    }

    /// Committed records of a submitter, oldest first.
    pub fn records_for(&self, account: &AccountId) -> Vec<ConversionRecord> {
        self.book.read().records.by_account(account)
    }

    pub fn record(&self, tx_id: &SourceTxId) -> Option<ConversionRecord> {
        self.book.read().records.by_tx(tx_id).cloned()
    }

    /// Check if a source transaction has been consumed.
    pub fn is_used(&self, tx_id: &SourceTxId) -> bool {
        self.book.read().replay.contains(tx_id)
    }

    /// Sequence number of the last committed unit; 0 before any.
    pub fn last_unit_seq(&self) -> u64 {
        self.book.read().last_unit_seq
    }

    pub fn record_count(&self) -> usize {
        self.book.read().records.len()
    }

    pub fn account_count(&self) -> usize {
        self.book.read().totals.account_count()
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> LedgerBook {
        self.book.read().clone()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Open write transaction on a [`Ledger`].
pub struct LedgerTxn<'a> {
    ledger: &'a Ledger,
    _gate: MutexGuard<'a, ()>,
    staged: ReplayGuard,
    totals: LedgerAccumulator,
    pending: Vec<PendingConversion>,
}

impl<'a> LedgerTxn<'a> {
    /// Reserve a source transaction id for this transaction.
    ///
    /// Fails with `AlreadyUsed` if the id was committed before or is already
    /// reserved by this transaction.
    pub fn reserve(&mut self, tx_id: SourceTxId) -> Result<()> {
        let result = if self.ledger.is_used(&tx_id) {
            Err(ConversionError::AlreadyUsed(tx_id))
        } else {
            self.staged.check_and_reserve(tx_id)
        };
        if result.is_err() {
            warn!(tx_id = %tx_id.short(), "Source transaction already used");
        }
        result
    }

    /// Stage a conversion and return the account and global totals as they
    /// will read after commit.
    ///
    /// The source transaction must have been reserved. On `Overflow` nothing
    /// is staged.
    pub fn apply(
        &mut self,
        conversion: PendingConversion,
    ) -> Result<(AccountTotals, GlobalTotals)> {
        if !self.staged.contains(&conversion.source_tx_id) {
            return Err(ConversionError::invalid_field(
                "source transaction was not reserved",
                "source_tx_id",
            ));
        }

        if !self.totals.is_loaded(&conversion.submitter) {
            let committed = self.ledger.account_totals(&conversion.submitter);
            self.totals.load(conversion.submitter.clone(), committed);
        }
        let after = self.totals.apply(
            &conversion.submitter,
            conversion.source_amount,
            conversion.usd_value,
            conversion.target_amount,
        )?;
        self.pending.push(conversion);

        Ok(after)
    }

    /// Number of staged conversions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Make everything staged visible at once and assign the unit's sequence
    /// number.
    #[instrument(skip(self), fields(conversions = self.pending.len()))]
    pub fn commit(mut self) -> Result<CommittedUnit> {
        let mut book = self.ledger.book.write();
        let unit_seq = book
            .last_unit_seq
            .checked_add(1)
            .ok_or(ConversionError::Overflow)?;

        let records: Vec<ConversionRecord> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|p| ConversionRecord {
                id: RecordId::new(),
                unit_seq,
                submitter: p.submitter,
                source_tx_id: p.source_tx_id,
                source_amount: p.source_amount,
                usd_value: p.usd_value,
                target_amount: p.target_amount,
                source_price: p.source_price,
                target_price: p.target_price,
                timestamp: p.timestamp,
            })
            .collect();

        let totals = std::mem::take(&mut self.totals);
        let global = totals.global();
        book.totals.commit(totals);
        book.replay.absorb(std::mem::take(&mut self.staged));
        for record in &records {
            book.records.push(record.clone());
        }
        book.last_unit_seq = unit_seq;

        info!(
            unit_seq,
            conversions = records.len(),
            total_conversions = global.conversion_count,
            "Ledger unit committed"
        );

        Ok(CommittedUnit {
            unit_seq,
            records,
            global,
        })
    }
}
