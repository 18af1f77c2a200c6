//! BridgeLedger Pricing
//!
//! Price sources and the fixed-point arithmetic that turns a source-asset
//! amount into its USD value and target-asset equivalent.
//!
//! # Features
//!
//! - `PriceSource` trait for external price feeds
//! - Settable simulated source for tests and local runs
//! - Snapshot caching with configurable TTL
//! - Overflow-checked 256-bit conversion arithmetic
//!
//! # Example
//!
//! ```rust,ignore
//! use bridgeledger_pricing::{ConversionCalculator, PriceSource, SimulatedPriceSource};
//!
//! let prices = SimulatedPriceSource::default();
//! let snapshot = prices.snapshot().await?;
//!
//! let quote = ConversionCalculator::default()
//!     .compute(500_000_000, snapshot.source, snapshot.target)?;
//! ```

pub mod calculator;
pub mod provider;
pub mod cache;
pub mod error;

pub use calculator::{compute, conversion_rate, ConversionCalculator, Quote};
pub use provider::{PriceSnapshot, PriceSource, SimulatedPriceSource};
pub use cache::{CachedPriceSource, PriceCache, PriceCacheConfig};
pub use error::{PriceSide, PricingError, PricingResult};
