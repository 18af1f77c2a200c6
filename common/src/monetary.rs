//! Fixed-point monetary types for BridgeLedger.
//!
//! Every amount is an unsigned integer with an implied number of fractional
//! decimal digits. Floats never appear in accounting paths; human-readable
//! rendering goes through exact integer formatting or `rust_decimal`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConversionError;

/// Fractional digits of a USD price.
pub const PRICE_DECIMALS: u32 = 8;

/// Scale of a USD price, `10^PRICE_DECIMALS`.
pub const PRICE_SCALE: u64 = 100_000_000;

/// Fractional digits of a USD value (same as the price precision).
pub const USD_DECIMALS: u32 = PRICE_DECIMALS;

/// Fractional digits of a conversion rate.
pub const RATE_DECIMALS: u32 = 18;

/// Largest decimal exponent accepted for an asset's base unit.
pub const MAX_ASSET_DECIMALS: u32 = 30;

/// `10^exp` as `u128`, or `None` when it does not fit.
pub fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

/// Render a fixed-point integer exactly, e.g. `(31_000_000_000, 8)` as
/// `"310.00000000"`.
pub fn format_fixed(raw: u128, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let digits = raw.to_string();
    let width = decimals as usize;
    if digits.len() <= width {
        format!("0.{:0>width$}", digits, width = width)
    } else {
        let (int, frac) = digits.split_at(digits.len() - width);
        format!("{}.{}", int, frac)
    }
}

/// Convert a fixed-point integer into a `Decimal`, if it fits.
fn fixed_to_decimal(raw: u128, decimals: u32) -> Option<Decimal> {
    let signed = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(signed, decimals).ok()
}

/// USD price of one whole unit of an asset, 8 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Price(u64);

impl Price {
    /// Create from the raw fixed-point integer (`62_000_000` is $0.62).
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw fixed-point integer.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Zero means unset; conversion is undefined at a zero price.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Create from a decimal USD value. More than 8 fractional digits or a
    /// negative value is rejected rather than rounded.
    pub fn from_decimal(value: Decimal) -> Result<Self, ConversionError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ConversionError::invalid_field(
                format!("price must not be negative: {}", value),
                "price",
            ));
        }
        if value.normalize().scale() > PRICE_DECIMALS {
            return Err(ConversionError::invalid_field(
                format!("price has more than {} decimals: {}", PRICE_DECIMALS, value),
                "price",
            ));
        }

        value
            .checked_mul(Decimal::from(PRICE_SCALE))
            .and_then(|scaled| scaled.to_u64())
            .map(Self)
            .ok_or(ConversionError::Overflow)
    }

    /// Parse a decimal string such as `"0.62"`.
    pub fn from_decimal_str(s: &str) -> Result<Self, ConversionError> {
        let value: Decimal = s.trim().parse().map_err(|e| {
            ConversionError::invalid_field(format!("invalid price '{}': {}", s, e), "price")
        })?;
        Self::from_decimal(value)
    }

    /// Decimal USD value.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), PRICE_DECIMALS)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", format_fixed(self.0 as u128, PRICE_DECIMALS))
    }
}

/// USD value, 8 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct UsdValue(u128);

impl UsdValue {
    pub const ZERO: UsdValue = UsdValue(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn checked_add(self, other: UsdValue) -> Option<UsdValue> {
        self.0.checked_add(other.0).map(UsdValue)
    }

    /// Decimal value, if it fits a `Decimal`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        fixed_to_decimal(self.0, USD_DECIMALS)
    }

    /// Round half-up to cents for display, e.g. `"310.00"`.
    pub fn to_cents_string(&self) -> String {
        let per_cent = pow10(USD_DECIMALS - 2).unwrap_or(1);
        let cents = self.0 / per_cent + u128::from(self.0 % per_cent >= per_cent / 2);
        format_fixed(cents, 2)
    }
}

impl fmt::Display for UsdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", format_fixed(self.0, USD_DECIMALS))
    }
}

/// Amount of the target asset in its smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TargetAmount(u128);

impl TargetAmount {
    pub const ZERO: TargetAmount = TargetAmount(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn checked_add(self, other: TargetAmount) -> Option<TargetAmount> {
        self.0.checked_add(other.0).map(TargetAmount)
    }

    /// Exact rendering in whole target units.
    pub fn format(&self, decimals: u32) -> String {
        format_fixed(self.0, decimals)
    }

    /// Decimal value in whole target units, if it fits a `Decimal`.
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        fixed_to_decimal(self.0, decimals)
    }
}

impl fmt::Display for TargetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target units per whole source unit, 18 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ConversionRate(u128);

impl ConversionRate {
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        fixed_to_decimal(self.0, RATE_DECIMALS)
    }
}

impl fmt::Display for ConversionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_fixed(self.0, RATE_DECIMALS))
    }
}

/// An asset and the number of fractional digits of its base unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Ticker symbol.
    pub symbol: String,
    /// Fractional digits of the smallest unit (6 for drops, 18 for wei).
    pub decimals: u32,
}

impl AssetSpec {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            decimals,
        }
    }

    /// Default source asset: XRP in drops.
    pub fn xrp() -> Self {
        Self::new("XRP", 6)
    }

    /// Default target asset: FLR in wei.
    pub fn flr() -> Self {
        Self::new("FLR", 18)
    }

    /// Number of base units in one whole unit.
    pub fn unit(&self) -> Option<u128> {
        pow10(self.decimals)
    }

    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.symbol.is_empty() {
            return Err(ConversionError::Configuration(
                "asset symbol cannot be empty".to_string(),
            ));
        }
        if self.decimals > MAX_ASSET_DECIMALS {
            return Err(ConversionError::Configuration(format!(
                "{} decimals {} exceed maximum {}",
                self.symbol, self.decimals, MAX_ASSET_DECIMALS
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AssetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(31_000_000_000, 8), "310.00000000");
        assert_eq!(format_fixed(5, 3), "0.005");
        assert_eq!(format_fixed(42, 0), "42");
        assert_eq!(format_fixed(0, 2), "0.00");
    }

    #[test]
    fn test_price_from_decimal() {
        assert_eq!(Price::from_decimal(dec!(0.62)).unwrap(), Price::new(62_000_000));
        assert_eq!(Price::from_decimal_str("0.045").unwrap(), Price::new(4_500_000));
        assert!(Price::from_decimal(dec!(0.000000001)).is_err());
        assert!(Price::from_decimal(dec!(-1)).is_err());
        assert!(Price::from_decimal_str("abc").is_err());
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::new(62_000_000).to_string(), "$0.62000000");
        assert_eq!(Price::new(62_000_000).to_decimal(), dec!(0.62));
    }

    #[test]
    fn test_usd_cents() {
        assert_eq!(UsdValue::new(31_000_000_000).to_cents_string(), "310.00");
        assert_eq!(UsdValue::new(1_005_000).to_cents_string(), "0.01");
        assert_eq!(UsdValue::new(1_004_999).to_cents_string(), "0.01");
        assert_eq!(UsdValue::new(499_999).to_cents_string(), "0.00");
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(UsdValue::new(u128::MAX).checked_add(UsdValue::new(1)).is_none());
        assert_eq!(
            TargetAmount::new(1).checked_add(TargetAmount::new(2)),
            Some(TargetAmount::new(3))
        );
    }

    #[test]
    fn test_rate_to_decimal() {
        let rate = ConversionRate::new(13_777_777_777_777_777_777);
        assert_eq!(rate.to_decimal().unwrap(), dec!(13.777777777777777777));
        assert_eq!(rate.to_string(), "13.777777777777777777");
    }

    #[test]
    fn test_asset_spec_validation() {
        assert!(AssetSpec::xrp().validate().is_ok());
        assert_eq!(AssetSpec::flr().unit(), Some(1_000_000_000_000_000_000));
        assert!(AssetSpec::new("", 6).validate().is_err());
        assert!(AssetSpec::new("BIG", 31).validate().is_err());
    }
}
