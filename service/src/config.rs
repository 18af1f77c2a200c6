//! Service configuration.

use std::str::FromStr;

use bridgeledger_common::{AssetSpec, ConversionError, Price, Result};
use bridgeledger_pricing::PriceCacheConfig;

/// Main conversion service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bridged-in asset.
    pub source_asset: AssetSpec,
    /// Native asset conversions are credited in.
    pub target_asset: AssetSpec,
    /// Maximum number of items in one batch.
    pub max_batch_size: usize,
    /// Buffered notifications per subscriber before it lags.
    pub notification_capacity: usize,
    /// Price snapshot caching.
    pub price_cache: PriceCacheConfig,
    /// Override for the simulated source price.
    pub source_price: Option<Price>,
    /// Override for the simulated target price.
    pub target_price: Option<Price>,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            source_asset: AssetSpec::xrp(),
            target_asset: AssetSpec::flr(),
            max_batch_size: 100,
            notification_capacity: 1024,
            price_cache: PriceCacheConfig::default(),
            source_price: None,
            target_price: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            ConversionError::Configuration(format!("{} has invalid value {:?}", name, value))
        })
}

fn parse_price(name: &str, value: &str) -> Result<Price> {
    Price::from_decimal_str(value)
        .map_err(|e| ConversionError::Configuration(format!("{}: {}", name, e)))
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(symbol) = lookup("SOURCE_ASSET_SYMBOL") {
            config.source_asset = AssetSpec::new(symbol, config.source_asset.decimals);
        }

        if let Some(decimals) = lookup("SOURCE_ASSET_DECIMALS") {
            config.source_asset.decimals = parse_var("SOURCE_ASSET_DECIMALS", &decimals)?;
        }

        if let Some(symbol) = lookup("TARGET_ASSET_SYMBOL") {
            config.target_asset = AssetSpec::new(symbol, config.target_asset.decimals);
        }

        if let Some(decimals) = lookup("TARGET_ASSET_DECIMALS") {
            config.target_asset.decimals = parse_var("TARGET_ASSET_DECIMALS", &decimals)?;
        }

        if let Some(size) = lookup("MAX_BATCH_SIZE") {
            config.max_batch_size = parse_var("MAX_BATCH_SIZE", &size)?;
        }

        if let Some(capacity) = lookup("NOTIFICATION_CAPACITY") {
            config.notification_capacity = parse_var("NOTIFICATION_CAPACITY", &capacity)?;
        }

        if let Some(ttl) = lookup("PRICE_CACHE_TTL_MS") {
            let ttl_ms = parse_var("PRICE_CACHE_TTL_MS", &ttl)?;
            config.price_cache = PriceCacheConfig::from_ttl_ms(ttl_ms);
        }

        if let Some(price) = lookup("SOURCE_PRICE_USD") {
            config.source_price = Some(parse_price("SOURCE_PRICE_USD", &price)?);
        }

        if let Some(price) = lookup("TARGET_PRICE_USD") {
            config.target_price = Some(parse_price("TARGET_PRICE_USD", &price)?);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.source_asset.validate()?;
        self.target_asset.validate()?;

        if self.max_batch_size == 0 {
            return Err(ConversionError::Configuration(
                "Max batch size cannot be 0".to_string(),
            ));
        }

        if self.notification_capacity == 0 {
            return Err(ConversionError::Configuration(
                "Notification capacity cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source_asset.symbol, "XRP");
        assert_eq!(config.target_asset.decimals, 18);
        assert!(!config.price_cache.enabled);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServiceConfig::default();
        config.max_batch_size = 0;
        assert!(matches!(config.validate(), Err(ConversionError::Configuration(_))));

        let mut config = ServiceConfig::default();
        config.target_asset.decimals = 31;
        assert!(matches!(config.validate(), Err(ConversionError::Configuration(_))));
    }

    #[test]
    fn test_from_lookup() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("TARGET_ASSET_SYMBOL", "wflr"),
            ("MAX_BATCH_SIZE", "10"),
            ("PRICE_CACHE_TTL_MS", "5000"),
            ("SOURCE_PRICE_USD", "0.5"),
        ]))
        .unwrap();

        assert_eq!(config.target_asset.symbol, "WFLR");
        assert_eq!(config.target_asset.decimals, 18);
        assert_eq!(config.max_batch_size, 10);
        assert!(config.price_cache.enabled);
        assert_eq!(config.source_price, Some(Price::new(50_000_000)));
        assert_eq!(config.target_price, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = ServiceConfig::from_lookup(lookup(&[("MAX_BATCH_SIZE", "many")]));
        assert!(matches!(result, Err(ConversionError::Configuration(_))));
    }
}
