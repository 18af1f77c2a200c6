//! BridgeLedger Ledger Engine
//!
//! Replay protection, global and per-account running totals and the
//! per-conversion history, committed as one unit per conversion or batch.

pub mod engine;
pub mod replay;
pub mod totals;
pub mod record;

pub use engine::{CommittedUnit, Ledger, LedgerBook, LedgerTxn, PendingConversion};
pub use replay::ReplayGuard;
pub use totals::{AccountTotals, GlobalTotals, LedgerAccumulator, Totals};
pub use record::{ConversionRecord, RecordStore};
