//! Fixed-point conversion arithmetic.
//!
//! All intermediates are computed in 256 bits; a result that does not fit
//! its output width is reported as `Overflow`, never wrapped or clamped.

use bridgeledger_common::{
    pow10, AssetSpec, ConversionError, ConversionRate, Price, Result, TargetAmount, UsdValue,
    MAX_ASSET_DECIMALS, RATE_DECIMALS,
};

mod wide {
    use uint::construct_uint;

    construct_uint! {
        /// 256-bit unsigned integer for intermediate products.
        pub struct U256(4);
    }
}

pub use wide::U256;

/// USD value and target-asset equivalent of a source amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quote {
    /// USD value, 8 fractional digits.
    pub usd_value: UsdValue,
    /// Target amount in target base units.
    pub target_amount: TargetAmount,
}

fn scale(decimals: u32) -> Result<U256> {
    if decimals > MAX_ASSET_DECIMALS {
        return Err(ConversionError::Overflow);
    }
    pow10(decimals).map(U256::from).ok_or(ConversionError::Overflow)
}

fn narrow(value: U256) -> Result<u128> {
    if value.bits() > 128 {
        return Err(ConversionError::Overflow);
    }
    Ok(value.low_u128())
}

/// Compute the USD value and target equivalent of `source_amount` base
/// units of the source asset.
///
/// `usd_value = amount * source_price / 10^source_decimals`, truncated.
/// The target amount is computed from the untruncated numerator:
/// `amount * source_price * 10^target_decimals / (10^source_decimals * target_price)`.
pub fn compute(
    source_amount: u64,
    source_price: Price,
    target_price: Price,
    source_decimals: u32,
    target_decimals: u32,
) -> Result<Quote> {
    if target_price.is_zero() {
        return Err(ConversionError::DivisionByZero);
    }

    let source_unit = scale(source_decimals)?;
    let target_unit = scale(target_decimals)?;

    let value_numerator = U256::from(source_amount)
        .checked_mul(U256::from(source_price.raw()))
        .ok_or(ConversionError::Overflow)?;

    let usd = value_numerator
        .checked_div(source_unit)
        .ok_or(ConversionError::DivisionByZero)?;

    let target_numerator = value_numerator
        .checked_mul(target_unit)
        .ok_or(ConversionError::Overflow)?;
    let target_denominator = source_unit
        .checked_mul(U256::from(target_price.raw()))
        .ok_or(ConversionError::Overflow)?;
    let target = target_numerator
        .checked_div(target_denominator)
        .ok_or(ConversionError::DivisionByZero)?;

    Ok(Quote {
        usd_value: UsdValue::new(narrow(usd)?),
        target_amount: TargetAmount::new(narrow(target)?),
    })
}

/// Target units per whole source unit, 18 fractional digits.
pub fn conversion_rate(source_price: Price, target_price: Price) -> Result<ConversionRate> {
    if target_price.is_zero() {
        return Err(ConversionError::DivisionByZero);
    }

    let rate = U256::from(source_price.raw())
        .checked_mul(scale(RATE_DECIMALS)?)
        .ok_or(ConversionError::Overflow)?
        / U256::from(target_price.raw());

    Ok(ConversionRate::new(narrow(rate)?))
}

/// Conversion arithmetic bound to a source/target asset pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCalculator {
    source: AssetSpec,
    target: AssetSpec,
}

impl ConversionCalculator {
    pub fn new(source: AssetSpec, target: AssetSpec) -> Self {
        Self { source, target }
    }

    pub fn source_asset(&self) -> &AssetSpec {
        &self.source
    }

    pub fn target_asset(&self) -> &AssetSpec {
        &self.target
    }

    /// See [`compute`].
    pub fn compute(
        &self,
        source_amount: u64,
        source_price: Price,
        target_price: Price,
    ) -> Result<Quote> {
        compute(
            source_amount,
            source_price,
            target_price,
            self.source.decimals,
            self.target.decimals,
        )
    }
}

impl Default for ConversionCalculator {
    fn default() -> Self {
        Self::new(AssetSpec::xrp(), AssetSpec::flr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const XRP: Price = Price::new(62_000_000);
    const FLR: Price = Price::new(4_500_000);

    #[test]
    fn test_compute_demo_amount() {
        let quote = compute(500_000_000, XRP, FLR, 6, 18).unwrap();

        assert_eq!(quote.usd_value, UsdValue::new(31_000_000_000));
        assert_eq!(quote.usd_value.to_cents_string(), "310.00");
        assert_eq!(
            quote.target_amount,
            TargetAmount::new(6_888_888_888_888_888_888_888)
        );
    }

    #[test]
    fn test_compute_uses_untruncated_value() {
        // 1 drop at $0.62 is $0.00000062, which has no rounding at 8 digits,
        // but 1 drop at $0.00000001 truncates the USD value to zero.
        let quote = compute(1, Price::new(1), FLR, 6, 18).unwrap();
        assert_eq!(quote.usd_value, UsdValue::ZERO);
        // 1e-14 USD / 0.045 = 2.2e-13 FLR = 222_222 wei
        assert_eq!(quote.target_amount, TargetAmount::new(222_222));
    }

    #[test]
    fn test_zero_target_price() {
        let result = compute(500_000_000, XRP, Price::new(0), 6, 18);
        assert_eq!(result, Err(ConversionError::DivisionByZero));
    }

    #[test]
    fn test_zero_amount() {
        let quote = compute(0, XRP, FLR, 6, 18).unwrap();
        assert_eq!(quote.usd_value, UsdValue::ZERO);
        assert_eq!(quote.target_amount, TargetAmount::ZERO);
    }

    #[test]
    fn test_overflow_is_reported() {
        let result = compute(u64::MAX, Price::new(u64::MAX), Price::new(1), 0, 30);
        assert_eq!(result, Err(ConversionError::Overflow));

        let result = compute(1, XRP, FLR, 6, 31);
        assert_eq!(result, Err(ConversionError::Overflow));
    }

    #[test]
    fn test_wide_intermediate_narrowing() {
        let product = U256::from(u128::MAX) * U256::from(2u8);
        assert!(product.bits() > 128);
        assert_eq!(narrow(product), Err(ConversionError::Overflow));
        assert_eq!(narrow(U256::from(u128::MAX)), Ok(u128::MAX));
        assert_eq!(U256::from_dec_str("1000").ok().map(|v| v.low_u64()), Some(1000));
    }

    #[test]
    fn test_conversion_rate() {
        let rate = conversion_rate(XRP, FLR).unwrap();
        assert_eq!(rate, ConversionRate::new(13_777_777_777_777_777_777));
        assert_eq!(conversion_rate(XRP, Price::new(0)), Err(ConversionError::DivisionByZero));
    }

    #[test]
    fn test_calculator_matches_free_function() {
        let calculator = ConversionCalculator::default();
        assert_eq!(
            calculator.compute(250_000_000, XRP, FLR).unwrap(),
            compute(250_000_000, XRP, FLR, 6, 18).unwrap()
        );
        assert_eq!(calculator.source_asset().symbol, "XRP");
    }

    proptest! {
        #[test]
        fn prop_compute_is_deterministic(
            amount in 0u64..=u64::MAX,
            source in 1u64..=10_000_000_000_000,
            target in 1u64..=10_000_000_000_000,
        ) {
            let a = compute(amount, Price::new(source), Price::new(target), 6, 18);
            let b = compute(amount, Price::new(source), Price::new(target), 6, 18);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_target_is_floor_of_exact_ratio(
            amount in 1u64..=100_000_000_000_000,
            source in 1u64..=1_000_000_000_000,
            target in 1u64..=1_000_000_000_000,
        ) {
            let quote = compute(amount, Price::new(source), Price::new(target), 6, 18).unwrap();
            let numerator = U256::from(amount) * U256::from(source) * U256::from(10u128.pow(18));
            let denominator = U256::from(10u64.pow(6)) * U256::from(target);
            let lower = U256::from(quote.target_amount.raw()) * denominator;
            prop_assert!(lower <= numerator);
            prop_assert!(numerator < lower + denominator);
        }

        #[test]
        fn prop_compute_is_monotonic(
            amount in 0u64..=1_000_000_000_000_000,
            extra in 0u64..=1_000_000_000,
        ) {
            let small = compute(amount, XRP, FLR, 6, 18).unwrap();
            let large = compute(amount + extra, XRP, FLR, 6, 18).unwrap();
            prop_assert!(small.usd_value <= large.usd_value);
            prop_assert!(small.target_amount <= large.target_amount);
        }
    }
}
