//! Running conversion totals.
//!
//! Totals are `u128` per magnitude with checked addition. At 18 target
//! decimals that caps lifetime volume at roughly 3.4e20 whole target units
//! and 3.4e30 USD; crossing it fails the unit with `Overflow`.

use std::collections::HashMap;

use bridgeledger_common::{AccountId, ConversionError, Result, TargetAmount, UsdValue};
use serde::{Deserialize, Serialize};

/// Aggregate of accepted conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// Source asset, in source base units.
    pub total_source: u128,
    /// USD value, 8 fractional digits.
    pub total_usd: UsdValue,
    /// Target asset, in target base units.
    pub total_target: TargetAmount,
    /// Number of accepted conversions.
    pub conversion_count: u64,
}

/// Totals of a single submitter.
pub type AccountTotals = Totals;

/// Totals across every submitter.
pub type GlobalTotals = Totals;

impl Totals {
    /// Totals with one conversion's magnitudes.
    pub fn single(source_amount: u64, usd_value: UsdValue, target_amount: TargetAmount) -> Self {
        Self {
            total_source: u128::from(source_amount),
            total_usd: usd_value,
            total_target: target_amount,
            conversion_count: 1,
        }
    }

    /// Sum of two totals, or `Overflow`.
    pub fn checked_add(&self, other: &Totals) -> Result<Totals> {
        Ok(Totals {
            total_source: self
                .total_source
                .checked_add(other.total_source)
                .ok_or(ConversionError::Overflow)?,
            total_usd: self
                .total_usd
                .checked_add(other.total_usd)
                .ok_or(ConversionError::Overflow)?,
            total_target: self
                .total_target
                .checked_add(other.total_target)
                .ok_or(ConversionError::Overflow)?,
            conversion_count: self
                .conversion_count
                .checked_add(other.conversion_count)
                .ok_or(ConversionError::Overflow)?,
        })
    }

    /// Add one conversion in place. Leaves `self` untouched on failure.
    pub fn apply(
        &mut self,
        source_amount: u64,
        usd_value: UsdValue,
        target_amount: TargetAmount,
    ) -> Result<()> {
        *self = self.checked_add(&Totals::single(source_amount, usd_value, target_amount))?;
        Ok(())
    }
}

/// Global and per-account running totals.
#[derive(Debug, Clone, Default)]
pub struct LedgerAccumulator {
    global: GlobalTotals,
    accounts: HashMap<AccountId, AccountTotals>,
}

impl LedgerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> GlobalTotals {
        self.global
    }

    /// Totals of an account; zero for an account never seen.
    pub fn account(&self, account: &AccountId) -> AccountTotals {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// Number of accounts with at least one conversion.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Credit one conversion to `submitter` and to the global totals.
    ///
    /// Either both totals change or neither does.
    pub fn apply(
        &mut self,
        submitter: &AccountId,
        source_amount: u64,
        usd_value: UsdValue,
        target_amount: TargetAmount,
    ) -> Result<(AccountTotals, GlobalTotals)> {
        let delta = Totals::single(source_amount, usd_value, target_amount);
        let account = self.account(submitter).checked_add(&delta)?;
        let global = self.global.checked_add(&delta)?;

        self.accounts.insert(submitter.clone(), account);
        self.global = global;

        Ok((account, global))
    }

    /// Working copy for a write transaction. Starts from the committed
    /// global totals; accounts are loaded on first touch.
    pub(crate) fn overlay(global: GlobalTotals) -> Self {
        Self {
            global,
            accounts: HashMap::new(),
        }
    }

    pub(crate) fn is_loaded(&self, account: &AccountId) -> bool {
        self.accounts.contains_key(account)
    }

    pub(crate) fn load(&mut self, account: AccountId, totals: AccountTotals) {
        self.accounts.entry(account).or_insert(totals);
    }

    /// Replace committed totals with those of an overlay built on top of
    /// this state.
    pub(crate) fn commit(&mut self, overlay: LedgerAccumulator) {
        self.accounts.extend(overlay.accounts);
        self.global = overlay.global;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    #[test]
    fn test_apply_updates_both() {
        let mut acc = LedgerAccumulator::new();

        let (account, global) = acc
            .apply(
                &alice(),
                500_000_000,
                UsdValue::new(31_000_000_000),
                TargetAmount::new(6_888_888_888_888_888_888_888),
            )
            .unwrap();

        assert_eq!(account, global);
        assert_eq!(account.total_source, 500_000_000);
        assert_eq!(account.conversion_count, 1);
        assert_eq!(acc.account_count(), 1);
    }

    #[test]
    fn test_unknown_account_is_zero() {
        let acc = LedgerAccumulator::new();
        assert_eq!(acc.account(&AccountId::new("nobody")), Totals::default());
    }

    #[test]
    fn test_overflow_leaves_totals_unchanged() {
        let mut acc = LedgerAccumulator::new();
        acc.apply(&alice(), 1, UsdValue::new(u128::MAX), TargetAmount::new(1))
            .unwrap();
        let before = acc.global();

        let result = acc.apply(&alice(), 1, UsdValue::new(1), TargetAmount::new(1));

        assert_eq!(result, Err(ConversionError::Overflow));
        assert_eq!(acc.global(), before);
        assert_eq!(acc.account(&alice()), before);
    }

    #[test]
    fn test_overlay_commits_on_top_of_state() {
        let mut committed = LedgerAccumulator::new();
        committed
            .apply(&alice(), 100, UsdValue::new(62), TargetAmount::new(1_000))
            .unwrap();

        let mut overlay = LedgerAccumulator::overlay(committed.global());
        overlay.load(alice(), committed.account(&alice()));
        let (account, global) = overlay
            .apply(&alice(), 50, UsdValue::new(31), TargetAmount::new(500))
            .unwrap();
        assert_eq!(account.total_source, 150);
        assert_eq!(global.conversion_count, 2);
        assert_eq!(committed.global().conversion_count, 1);

        committed.commit(overlay);
        assert_eq!(committed.account(&alice()), account);
        assert_eq!(committed.global(), global);
        assert_eq!(committed.account_count(), 1);
    }

    #[test]
    fn test_accounts_are_separate() {
        let mut acc = LedgerAccumulator::new();
        let bob = AccountId::new("bob");

        acc.apply(&alice(), 10, UsdValue::new(1), TargetAmount::new(2)).unwrap();
        acc.apply(&bob, 20, UsdValue::new(3), TargetAmount::new(4)).unwrap();

        assert_eq!(acc.account(&alice()).total_source, 10);
        assert_eq!(acc.account(&bob).total_source, 20);
        assert_eq!(acc.global().total_source, 30);
        assert_eq!(acc.global().conversion_count, 2);
    }

    proptest! {
        #[test]
        fn prop_global_is_exact_sum(
            items in proptest::collection::vec(
                (0usize..3, 1u64..=u64::MAX, 0u128..=u64::MAX as u128, 0u128..=u64::MAX as u128),
                1..50,
            )
        ) {
            let accounts = [AccountId::new("a"), AccountId::new("b"), AccountId::new("c")];
            let mut acc = LedgerAccumulator::new();
            let mut expected = (0u128, 0u128, 0u128);

            for (who, source, usd, target) in &items {
                acc.apply(&accounts[*who], *source, UsdValue::new(*usd), TargetAmount::new(*target))
                    .unwrap();
                expected.0 += u128::from(*source);
                expected.1 += usd;
                expected.2 += target;
            }

            let global = acc.global();
            prop_assert_eq!(global.total_source, expected.0);
            prop_assert_eq!(global.total_usd.raw(), expected.1);
            prop_assert_eq!(global.total_target.raw(), expected.2);
            prop_assert_eq!(global.conversion_count, items.len() as u64);

            let per_account: u128 = accounts.iter().map(|a| acc.account(a).total_source).sum();
            prop_assert_eq!(per_account, expected.0);
        }
    }
}
