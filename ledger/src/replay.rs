//! Duplicate protection for source-chain transactions.

use std::collections::HashSet;

use bridgeledger_common::{ConversionError, Result, SourceTxId};

/// Set of source transaction ids that have been credited.
///
/// Grows monotonically. There is no expiry and no removal: once an id is
/// consumed it stays consumed for the lifetime of the ledger.
#[derive(Debug, Clone, Default)]
pub struct ReplayGuard {
    used: HashSet<SourceTxId>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an id has been consumed.
    pub fn contains(&self, tx_id: &SourceTxId) -> bool {
        self.used.contains(tx_id)
    }

    /// Consume an id, failing with `AlreadyUsed` if it was consumed before.
    ///
    /// Lookup and insertion are one step on `&mut self`.
    pub fn check_and_reserve(&mut self, tx_id: SourceTxId) -> Result<()> {
        if self.used.insert(tx_id) {
            Ok(())
        } else {
            Err(ConversionError::AlreadyUsed(tx_id))
        }
    }

    /// Number of consumed ids.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Consume every id of `other`.
    pub(crate) fn absorb(&mut self, other: ReplayGuard) {
        self.used.extend(other.used);
    }
}
