//! Unit-of-work state definitions.

use bridgeledger_common::ErrorKind;
use tracing::debug;

/// Progress of one conversion (or one batch item) through the service.
///
/// None of these states is visible outside the service; a unit either
/// reaches `Emitted` with all of its effects committed or ends `Rejected`
/// with none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Request received.
    Pending,
    /// Amount and transaction id are well-formed.
    Validated,
    /// Transaction id reserved.
    ReplayChecked,
    /// Prices fetched.
    Priced,
    /// USD value and target amount computed.
    Computed,
    /// Totals staged.
    Ledgered,
    /// Committed and notified.
    Emitted,
    /// Aborted; nothing persisted.
    Rejected(ErrorKind),
}

impl UnitState {
    /// The state that follows this one on success.
    pub fn successor(&self) -> Option<UnitState> {
        match self {
            UnitState::Pending => Some(UnitState::Validated),
            UnitState::Validated => Some(UnitState::ReplayChecked),
            UnitState::ReplayChecked => Some(UnitState::Priced),
            UnitState::Priced => Some(UnitState::Computed),
            UnitState::Computed => Some(UnitState::Ledgered),
            UnitState::Ledgered => Some(UnitState::Emitted),
            UnitState::Emitted | UnitState::Rejected(_) => None,
        }
    }

    /// Check if `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: UnitState) -> bool {
        match next {
            UnitState::Rejected(_) => !self.is_terminal(),
            next => self.successor() == Some(next),
        }
    }

    /// Move to `next`, returning `false` and staying put if the transition
    /// is illegal.
    pub fn advance(&mut self, next: UnitState) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        debug!(from = ?self, to = ?next, "Unit state transition");
        *self = next;
        true
    }

    /// Check if the unit reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Emitted | UnitState::Rejected(_))
    }
}
