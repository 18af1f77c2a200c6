//! Runs scenarios against a service backed by a simulated price feed.

use std::sync::Arc;

use bridgeledger_common::{
    format_fixed, AccountId, ConversionError, Price, Result, SourceTxId,
};
use bridgeledger_ledger::Totals;
use bridgeledger_pricing::provider::{DEFAULT_SOURCE_PRICE, DEFAULT_TARGET_PRICE};
use bridgeledger_pricing::SimulatedPriceSource;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::metrics::MetricsSnapshot;
use crate::scenario::{Scenario, ScenarioStep};
use crate::service::{ConversionRequest, ConversionService};

/// Outcome of one scenario step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub action: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    pub detail: Value,
}

/// Totals rendered in whole units.
#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    pub total_source: String,
    pub total_usd: String,
    pub total_target: String,
    pub conversion_count: u64,
}

/// Everything a scenario run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps: Vec<StepOutcome>,
    pub stats: TotalsView,
    pub metrics: MetricsSnapshot,
}

impl ScenarioReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

/// Drives a [`ConversionService`] through scenario steps.
pub struct ScenarioRunner {
    service: ConversionService,
    prices: Arc<SimulatedPriceSource>,
}

impl ScenarioRunner {
    /// Create a runner whose prices start at the configured overrides, or
    /// $0.62 / $0.045.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let prices = Arc::new(SimulatedPriceSource::new(
            config.source_price.unwrap_or(DEFAULT_SOURCE_PRICE),
            config.target_price.unwrap_or(DEFAULT_TARGET_PRICE),
        ));
        let service = ConversionService::new(config, prices.clone())?;
        Ok(Self { service, prices })
    }

    pub fn service(&self) -> &ConversionService {
        &self.service
    }

    /// Run every step in order. Rejected steps are reported and the run
    /// continues.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        info!(
            scenario = %scenario.name,
            steps = scenario.steps.len(),
            "Running scenario"
        );

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = match self.run_step(step).await {
                Ok(detail) => StepOutcome {
                    step: index + 1,
                    action: step.action(),
                    ok: true,
                    error_code: None,
                    detail,
                },
                Err(err) => {
                    warn!(step = index + 1, action = step.action(), error = %err, "Step rejected");
                    StepOutcome {
                        step: index + 1,
                        action: step.action(),
                        ok: false,
                        error_code: Some(err.error_code()),
                        detail: json!({ "error": err.to_string(), "retryable": err.is_retryable() }),
                    }
                }
            };
            steps.push(outcome);
        }

        ScenarioReport {
            scenario: scenario.name.clone(),
            steps,
            stats: self.view(&self.service.conversion_stats()),
            metrics: self.service.metrics().snapshot(),
        }
    }

    async fn run_step(&self, step: &ScenarioStep) -> Result<Value> {
        match step {
            ScenarioStep::SetPrices { source, target } => {
                if let Some(source) = source {
                    self.prices.set_source_price(Price::from_decimal_str(source)?);
                }
                if let Some(target) = target {
                    self.prices.set_target_price(Price::from_decimal_str(target)?);
                }
                let rate = self.service.conversion_rate().await.ok();
                Ok(json!({
                    "source_price": self.service.source_price_usd().await?.to_string(),
                    "target_price": self.service.target_price_usd().await?.to_string(),
                    "rate": rate.map(|r| r.to_string()),
                }))
            }
            ScenarioStep::SetPriceFeed { available } => {
                self.prices.set_available(*available);
                Ok(json!({ "available": available }))
            }
            ScenarioStep::Preview { source_amount } => {
                let quote = self.service.preview_conversion(*source_amount).await?;
                Ok(json!({
                    "source_amount": self.source_units(u128::from(*source_amount)),
                    "usd_value": quote.usd_value.to_cents_string(),
                    "target_amount": self.target_units(quote.target_amount.raw()),
                }))
            }
            ScenarioStep::Convert {
                submitter,
                source_amount,
                source_tx_id,
            } => {
                let request = ConversionRequest::parse(*source_amount, source_tx_id)?;
                let receipt = self
                    .service
                    .convert(&AccountId::new(submitter.as_str()), request)
                    .await?;
                Ok(json!({
                    "unit_seq": receipt.record.unit_seq,
                    "source_tx_id": receipt.record.source_tx_id.short(),
                    "usd_value": receipt.record.usd_value.to_cents_string(),
                    "target_amount": self.target_units(receipt.record.target_amount.raw()),
                    "notifications": receipt.notifications.iter().map(|n| n.name()).collect::<Vec<_>>(),
                }))
            }
            ScenarioStep::BatchConvert {
                submitter,
                source_amounts,
                source_tx_ids,
            } => {
                let tx_ids = source_tx_ids
                    .iter()
                    .map(|id| SourceTxId::parse(id))
                    .collect::<Result<Vec<_>>>()?;
                let result = self
                    .service
                    .batch_convert(&AccountId::new(submitter.as_str()), source_amounts, &tx_ids)
                    .await?;
                Ok(json!({
                    "unit_seq": result.unit_seq,
                    "items": result.item_count(),
                    "total_usd": result.total_usd.to_cents_string(),
                    "total_target": self.target_units(result.total_target.raw()),
                }))
            }
            ScenarioStep::Stats { account } => {
                let totals = match account {
                    Some(account) => {
                        let account = AccountId::new(account.as_str());
                        if !account.is_valid() {
                            return Err(ConversionError::invalid_field(
                                "invalid account",
                                "account",
                            ));
                        }
                        self.service.user_conversions(&account)
                    }
                    None => self.service.conversion_stats(),
                };
                let view = self.view(&totals);
                Ok(json!({
                    "total_source": view.total_source,
                    "total_usd": view.total_usd,
                    "total_target": view.total_target,
                    "conversion_count": view.conversion_count,
                }))
            }
        }
    }

    fn source_units(&self, raw: u128) -> String {
        format_fixed(raw, self.service.config().source_asset.decimals)
    }

    fn target_units(&self, raw: u128) -> String {
        format_fixed(raw, self.service.config().target_asset.decimals)
    }

    fn view(&self, totals: &Totals) -> TotalsView {
        TotalsView {
            total_source: self.source_units(totals.total_source),
            total_usd: totals.total_usd.to_cents_string(),
            total_target: self.target_units(totals.total_target.raw()),
            conversion_count: totals.conversion_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgeledger_common::ErrorKind;

    #[tokio::test]
    async fn test_demo_run() {
        let runner = ScenarioRunner::new(ServiceConfig::default()).unwrap();

        let report = runner.run(&Scenario::demo()).await;

        assert_eq!(report.failed_steps(), 1);
        let replay = report.steps.iter().find(|s| !s.ok).unwrap();
        assert_eq!(replay.error_code, Some(ErrorKind::AlreadyUsed.code()));

        assert_eq!(report.stats.conversion_count, 6);
        assert_eq!(report.stats.total_source, "1375.000000");
        // 62 + 155 + 310 + 325.50
        assert_eq!(report.stats.total_usd, "852.50");
        assert_eq!(report.metrics.batches_committed, 1);

        let stats = report.steps.last().unwrap();
        assert_eq!(stats.action, "stats");
        assert_eq!(stats.detail["total_usd"], "852.50");
        assert_eq!(stats.detail["total_source"], "1375.000000");
        assert_eq!(stats.detail["conversion_count"], 6);
    }

    #[tokio::test]
    async fn test_price_overrides() {
        let config = ServiceConfig {
            source_price: Some(Price::new(100_000_000)),
            target_price: Some(Price::new(50_000_000)),
            ..ServiceConfig::default()
        };
        let runner = ScenarioRunner::new(config).unwrap();

        let quote = runner.service().preview_conversion(1_000_000).await.unwrap();

        assert_eq!(quote.target_amount.raw(), 2_000_000_000_000_000_000);
    }

    #[tokio::test]
    async fn test_malformed_tx_id_reported() {
        let runner = ScenarioRunner::new(ServiceConfig::default()).unwrap();
        let scenario = Scenario {
            name: "bad-id".to_string(),
            description: String::new(),
            steps: vec![ScenarioStep::Convert {
                submitter: "alice".to_string(),
                source_amount: 1,
                source_tx_id: "XYZ".to_string(),
            }],
        };

        let report = runner.run(&scenario).await;

        assert_eq!(report.steps[0].error_code, Some("INVALID_REQUEST"));
        assert_eq!(report.stats.conversion_count, 0);
    }
}
