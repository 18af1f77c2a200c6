//! Conversion service: validates requests, guards against replays, prices
//! and computes conversions, and commits them to the ledger as one unit.

use std::sync::Arc;

use bridgeledger_common::{
    AccountId, Clock, ConversionError, ConversionRate, Price, Result, SourceTxId, SystemClock,
    TargetAmount, Timestamp, UsdValue,
};
use bridgeledger_ledger::{
    AccountTotals, CommittedUnit, ConversionRecord, GlobalTotals, Ledger, PendingConversion,
    Totals,
};
use bridgeledger_pricing::{
    conversion_rate, CachedPriceSource, ConversionCalculator, PriceSide, PriceSnapshot,
    PriceSource, PricingError, Quote,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::events::{Notification, Notifier};
use crate::metrics::{Metrics, SharedMetrics};
use crate::state::UnitState;

/// Request to convert a credited source-chain transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Source base units.
    pub source_amount: u64,
    pub source_tx_id: SourceTxId,
}

impl ConversionRequest {
    pub fn new(source_amount: u64, source_tx_id: SourceTxId) -> Self {
        Self {
            source_amount,
            source_tx_id,
        }
    }

    /// Build a request from a hex transaction id.
    pub fn parse(source_amount: u64, source_tx_id: &str) -> Result<Self> {
        Ok(Self::new(source_amount, SourceTxId::parse(source_tx_id)?))
    }
}

/// Outcome of an accepted single conversion.
#[derive(Debug, Clone)]
pub struct ConversionReceipt {
    pub record: ConversionRecord,
    /// `Received` then `Converted`.
    pub notifications: Vec<Notification>,
}

/// Outcome of an accepted batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub unit_seq: u64,
    /// One record per item, in input order.
    pub records: Vec<ConversionRecord>,
    pub total_usd: UsdValue,
    pub total_target: TargetAmount,
    /// Each item's `Received`/`Converted` pair, then one `BatchConverted`.
    pub notifications: Vec<Notification>,
}

impl BatchResult {
    pub fn item_count(&self) -> usize {
        self.records.len()
    }
}

/// The conversion service.
pub struct ConversionService {
    config: ServiceConfig,
    calculator: ConversionCalculator,
    prices: Arc<dyn PriceSource>,
    ledger: Arc<Ledger>,
    notifier: Notifier,
    metrics: SharedMetrics,
    clock: Arc<dyn Clock>,
}

impl ConversionService {
    /// Create a service over an empty ledger.
    ///
    /// The price source is wrapped in a [`CachedPriceSource`] when the
    /// configuration enables caching.
    pub fn new(config: ServiceConfig, prices: Arc<dyn PriceSource>) -> Result<Self> {
        config.validate()?;

        let prices: Arc<dyn PriceSource> = if config.price_cache.enabled {
            Arc::new(CachedPriceSource::new(prices, config.price_cache.clone()))
        } else {
            prices
        };

        Ok(Self {
            calculator: ConversionCalculator::new(
                config.source_asset.clone(),
                config.target_asset.clone(),
            ),
            notifier: Notifier::new(config.notification_capacity),
            config,
            prices,
            ledger: Arc::new(Ledger::new()),
            metrics: Arc::new(Metrics::new()),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to timestamp records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn calculator(&self) -> &ConversionCalculator {
        &self.calculator
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Subscribe to notifications of units committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Convert one credited source transfer.
    #[instrument(
        skip(self, request),
        fields(submitter = %submitter, tx_id = %request.source_tx_id.short())
    )]
    pub async fn convert(
        &self,
        submitter: &AccountId,
        request: ConversionRequest,
    ) -> Result<ConversionReceipt> {
        self.metrics.unit_started();

        let (unit, _) = self
            .run_unit(submitter, std::slice::from_ref(&request))
            .await?;

        let mut notifications = Vec::with_capacity(2);
        for record in &unit.records {
            notifications.extend(Notification::pair_for(record));
        }
        let record = unit
            .records
            .into_iter()
            .next()
            .ok_or_else(|| ConversionError::invalid("unit committed without a record"))?;

        self.notifier.publish(&notifications);
        self.metrics.unit_committed(1, false);

        info!(
            unit_seq = record.unit_seq,
            source_amount = record.source_amount,
            usd = %record.usd_value,
            target = %record.target_amount.format(self.config.target_asset.decimals),
            "Conversion committed"
        );

        Ok(ConversionReceipt {
            record,
            notifications,
        })
    }

    /// Convert several credited transfers as one all-or-nothing unit.
    ///
    /// `source_amounts[i]` pairs with `source_tx_ids[i]`; the slices must
    /// have the same, non-zero length.
    #[instrument(skip(self, source_amounts, source_tx_ids), fields(submitter = %submitter, items = source_amounts.len()))]
    pub async fn batch_convert(
        &self,
        submitter: &AccountId,
        source_amounts: &[u64],
        source_tx_ids: &[SourceTxId],
    ) -> Result<BatchResult> {
        if source_amounts.len() != source_tx_ids.len() {
            self.metrics.unit_started();
            let err = ConversionError::invalid(format!(
                "batch has {} amounts but {} transaction ids",
                source_amounts.len(),
                source_tx_ids.len()
            ));
            self.reject(UnitState::Pending, &err);
            return Err(err);
        }

        let requests: Vec<ConversionRequest> = source_amounts
            .iter()
            .zip(source_tx_ids)
            .map(|(amount, tx_id)| ConversionRequest::new(*amount, *tx_id))
            .collect();

        self.batch_convert_requests(submitter, &requests).await
    }

    /// Same as [`batch_convert`](Self::batch_convert) over paired requests.
    pub async fn batch_convert_requests(
        &self,
        submitter: &AccountId,
        requests: &[ConversionRequest],
    ) -> Result<BatchResult> {
        self.metrics.unit_started();

        if requests.is_empty() {
            let err = ConversionError::invalid("batch is empty");
            self.reject(UnitState::Pending, &err);
            return Err(err);
        }

        if requests.len() > self.config.max_batch_size {
            let err = ConversionError::invalid(format!(
                "batch of {} exceeds maximum {}",
                requests.len(),
                self.config.max_batch_size
            ));
            self.reject(UnitState::Pending, &err);
            return Err(err);
        }

        let (unit, batch_totals) = self.run_unit(submitter, requests).await?;

        let mut notifications = Vec::with_capacity(unit.records.len() * 2 + 1);
        for record in &unit.records {
            notifications.extend(Notification::pair_for(record));
        }
        notifications.push(Notification::BatchConverted {
            submitter: submitter.clone(),
            total_usd: batch_totals.total_usd,
            total_target: batch_totals.total_target,
            item_count: unit.records.len(),
            unit_seq: unit.unit_seq,
        });

        self.notifier.publish(&notifications);
        self.metrics.unit_committed(unit.records.len() as u64, true);

        info!(
            unit_seq = unit.unit_seq,
            items = unit.records.len(),
            total_usd = %batch_totals.total_usd,
            total_target = %batch_totals.total_target.format(self.config.target_asset.decimals),
            "Batch committed"
        );

        Ok(BatchResult {
            unit_seq: unit.unit_seq,
            records: unit.records,
            total_usd: batch_totals.total_usd,
            total_target: batch_totals.total_target,
            notifications,
        })
    }

    /// USD value and target amount `source_amount` would convert to at the
    /// current prices. Validates nothing and changes nothing.
    #[instrument(skip(self))]
    pub async fn preview_conversion(&self, source_amount: u64) -> Result<Quote> {
        self.metrics.preview();
        let prices = self.fetch_prices().await?;
        self.calculator
            .compute(source_amount, prices.source, prices.target)
    }

    /// Totals across every submitter.
    pub fn conversion_stats(&self) -> GlobalTotals {
        self.ledger.global_totals()
    }

    /// Totals of one submitter; zero for an account never seen.
    pub fn user_conversions(&self, account: &AccountId) -> AccountTotals {
        self.ledger.account_totals(account)
    }

    /// Accepted conversions of one submitter, oldest first.
    pub fn conversion_history(&self, account: &AccountId) -> Vec<ConversionRecord> {
        self.ledger.records_for(account)
    }

    pub fn record(&self, tx_id: &SourceTxId) -> Option<ConversionRecord> {
        self.ledger.record(tx_id)
    }

    pub fn is_tx_used(&self, tx_id: &SourceTxId) -> bool {
        self.ledger.is_used(tx_id)
    }

    pub async fn source_price_usd(&self) -> Result<Price> {
        Ok(self.prices.source_price_usd().await?)
    }

    pub async fn target_price_usd(&self) -> Result<Price> {
        Ok(self.prices.target_price_usd().await?)
    }

    /// Target units per whole source unit at the current prices.
    pub async fn conversion_rate(&self) -> Result<ConversionRate> {
        let prices = self.fetch_prices().await?;
        conversion_rate(prices.source, prices.target)
    }

    /// Fetch both prices. A zero source price is a collaborator failure; a
    /// zero target price is left for the calculator to reject.
    async fn fetch_prices(&self) -> Result<PriceSnapshot> {
        let snapshot = self.prices.snapshot().await?;
        if snapshot.source.is_zero() {
            return Err(PricingError::ZeroPrice(PriceSide::Source).into());
        }
        Ok(snapshot)
    }

    fn validate(&self, submitter: &AccountId, request: &ConversionRequest) -> Result<()> {
        if !submitter.is_valid() {
            return Err(ConversionError::invalid_field(
                format!("invalid submitter '{}'", submitter),
                "submitter",
            ));
        }
        if request.source_amount == 0 {
            return Err(ConversionError::invalid_field(
                "source amount must be greater than zero",
                "source_amount",
            ));
        }
        Ok(())
    }

    /// Run `requests` through every step inside one ledger transaction and
    /// commit it. On any failure the transaction is dropped, which discards
    /// every reservation and staged total.
    async fn run_unit(
        &self,
        submitter: &AccountId,
        requests: &[ConversionRequest],
    ) -> Result<(CommittedUnit, Totals)> {
        let mut state = UnitState::Pending;
        match self.stage_and_commit(submitter, requests, &mut state).await {
            Ok(done) => Ok(done),
            Err(err) => {
                self.reject(state, &err);
                Err(err)
            }
        }
    }

    async fn stage_and_commit(
        &self,
        submitter: &AccountId,
        requests: &[ConversionRequest],
        state: &mut UnitState,
    ) -> Result<(CommittedUnit, Totals)> {
        let mut txn = self.ledger.begin().await;
        // Read under the writer gate so the time reflects when the unit ran.
        let timestamp: Timestamp = self.clock.now();
        let mut snapshot: Option<PriceSnapshot> = None;
        let mut batch_totals = Totals::default();

        for request in requests {
            *state = UnitState::Pending;

            self.validate(submitter, request)?;
            step(state, UnitState::Validated);

            txn.reserve(request.source_tx_id)?;
            step(state, UnitState::ReplayChecked);

            let prices = match snapshot {
                Some(prices) => prices,
                None => {
                    let prices = self.fetch_prices().await?;
                    snapshot = Some(prices);
                    prices
                }
            };
            step(state, UnitState::Priced);

            let quote = self
                .calculator
                .compute(request.source_amount, prices.source, prices.target)?;
            step(state, UnitState::Computed);

            batch_totals = batch_totals.checked_add(&Totals::single(
                request.source_amount,
                quote.usd_value,
                quote.target_amount,
            ))?;
            txn.apply(PendingConversion {
                submitter: submitter.clone(),
                source_tx_id: request.source_tx_id,
                source_amount: request.source_amount,
                usd_value: quote.usd_value,
                target_amount: quote.target_amount,
                source_price: prices.source,
                target_price: prices.target,
                timestamp,
            })?;
            step(state, UnitState::Ledgered);
        }

        let unit = txn.commit()?;
        step(state, UnitState::Emitted);
        Ok((unit, batch_totals))
    }

    fn reject(&self, mut state: UnitState, err: &ConversionError) {
        state.advance(UnitState::Rejected(err.kind()));
        self.metrics.unit_rejected(err.kind());
        warn!(
            error_code = err.error_code(),
            retryable = err.is_retryable(),
            state = ?state,
            error = %err,
            "Conversion rejected"
        );
    }
}

fn step(state: &mut UnitState, next: UnitState) {
    let advanced = state.advance(next);
    debug_assert!(advanced, "illegal unit transition to {:?}", next);
}
