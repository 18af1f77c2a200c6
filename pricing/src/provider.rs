//! Price source trait and implementations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bridgeledger_common::{now, Price, Timestamp};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{PriceSide, PricingError, PricingResult};

/// Default simulated source price, $0.62.
pub const DEFAULT_SOURCE_PRICE: Price = Price::new(62_000_000);

/// Default simulated target price, $0.045.
pub const DEFAULT_TARGET_PRICE: Price = Price::new(4_500_000);

/// Source and target prices observed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSnapshot {
    /// USD price of one whole source unit.
    pub source: Price,
    /// USD price of one whole target unit.
    pub target: Price,
    /// When the snapshot was taken.
    pub observed_at: Timestamp,
}

impl PriceSnapshot {
    pub fn new(source: Price, target: Price) -> Self {
        Self {
            source,
            target,
            observed_at: now(),
        }
    }
}

/// Supplier of USD-denominated prices for the source and target assets.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// USD price of one whole source unit.
    async fn source_price_usd(&self) -> PricingResult<Price>;

    /// USD price of one whole target unit.
    async fn target_price_usd(&self) -> PricingResult<Price>;

    /// Both prices. Implementations that can read them atomically should
    /// override this.
    async fn snapshot(&self) -> PricingResult<PriceSnapshot> {
        let source = self.source_price_usd().await?;
        let target = self.target_price_usd().await?;
        debug!(
            provider = self.name(),
            source = %source,
            target = %target,
            "Fetched prices"
        );
        Ok(PriceSnapshot::new(source, target))
    }
}

/// In-process price source with settable prices.
///
/// Stands in for an oracle network in tests and in the command-line runner.
pub struct SimulatedPriceSource {
    name: String,
    prices: RwLock<(Option<Price>, Option<Price>)>,
    available: AtomicBool,
    fetches: AtomicU64,
}

impl SimulatedPriceSource {
    /// Create a source quoting the given prices.
    pub fn new(source: Price, target: Price) -> Self {
        Self {
            name: "SIMULATED".to_string(),
            prices: RwLock::new((Some(source), Some(target))),
            available: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
        }
    }

    /// Create a source with no prices set.
    pub fn empty() -> Self {
        Self {
            name: "SIMULATED".to_string(),
            prices: RwLock::new((None, None)),
            available: AtomicBool::new(true),
            fetches: AtomicU64::new(0),
        }
    }

    /// Rename the source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_source_price(&self, price: Price) {
        self.prices.write().0 = Some(price);
    }

    pub fn set_target_price(&self, price: Price) {
        self.prices.write().1 = Some(price);
    }

    /// Simulate a feed outage (or recovery).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of snapshots served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn read(&self, side: PriceSide) -> PricingResult<Price> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(PricingError::Provider(format!("{} is offline", self.name)));
        }
        let prices = self.prices.read();
        let price = match side {
            PriceSide::Source => prices.0,
            PriceSide::Target => prices.1,
        };
        price.ok_or(PricingError::Unavailable(side))
    }
}

impl Default for SimulatedPriceSource {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_PRICE, DEFAULT_TARGET_PRICE)
    }
}

#[async_trait]
impl PriceSource for SimulatedPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn source_price_usd(&self) -> PricingResult<Price> {
        self.read(PriceSide::Source)
    }

    async fn target_price_usd(&self) -> PricingResult<Price> {
        self.read(PriceSide::Target)
    }

    async fn snapshot(&self) -> PricingResult<PriceSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let source = self.read(PriceSide::Source)?;
        let target = self.read(PriceSide::Target)?;
        Ok(PriceSnapshot::new(source, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_defaults() {
        let source = SimulatedPriceSource::default();

        assert_eq!(source.source_price_usd().await.unwrap(), Price::new(62_000_000));
        assert_eq!(source.target_price_usd().await.unwrap(), Price::new(4_500_000));
        assert_eq!(source.name(), "SIMULATED");
    }

    #[tokio::test]
    async fn test_simulated_set_prices() {
        let source = SimulatedPriceSource::default();
        source.set_source_price(Price::new(100_000_000));
        source.set_target_price(Price::new(0));

        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.source, Price::new(100_000_000));
        assert!(snapshot.target.is_zero());
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let source = SimulatedPriceSource::default();
        source.set_available(false);

        let result = source.snapshot().await;
        assert!(matches!(result, Err(PricingError::Provider(_))));

        source.set_available(true);
        assert!(source.snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let source = SimulatedPriceSource::empty();

        let result = source.source_price_usd().await;
        assert_eq!(result, Err(PricingError::Unavailable(PriceSide::Source)));
    }
}
