//! Metrics collection for conversion monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridgeledger_common::ErrorKind;
use serde::Serialize;

/// Conversion service metrics.
pub struct Metrics {
    /// Units of work started (a batch counts once).
    pub units_total: AtomicU64,
    /// Units committed.
    pub units_committed: AtomicU64,
    /// Units rejected.
    pub units_rejected: AtomicU64,
    /// Individual conversions committed.
    pub conversions_committed: AtomicU64,
    /// Batches committed.
    pub batches_committed: AtomicU64,
    /// Preview requests.
    pub previews_total: AtomicU64,
    /// Rejections by error kind, indexed like `ErrorKind::ALL`.
    rejections: [AtomicU64; 6],
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            units_total: AtomicU64::new(0),
            units_committed: AtomicU64::new(0),
            units_rejected: AtomicU64::new(0),
            conversions_committed: AtomicU64::new(0),
            batches_committed: AtomicU64::new(0),
            previews_total: AtomicU64::new(0),
            rejections: Default::default(),
        }
    }

    pub fn unit_started(&self) {
        self.units_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed unit carrying `conversions` conversions.
    pub fn unit_committed(&self, conversions: u64, batch: bool) {
        self.units_committed.fetch_add(1, Ordering::Relaxed);
        self.conversions_committed
            .fetch_add(conversions, Ordering::Relaxed);
        if batch {
            self.batches_committed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn unit_rejected(&self, kind: ErrorKind) {
        self.units_rejected.fetch_add(1, Ordering::Relaxed);
        self.rejections[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn preview(&self) {
        self.previews_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Rejections of one kind so far.
    pub fn rejections(&self, kind: ErrorKind) -> u64 {
        self.rejections[kind_index(kind)].load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            units_total: self.units_total.load(Ordering::Relaxed),
            units_committed: self.units_committed.load(Ordering::Relaxed),
            units_rejected: self.units_rejected.load(Ordering::Relaxed),
            conversions_committed: self.conversions_committed.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            previews_total: self.previews_total.load(Ordering::Relaxed),
            rejections: ErrorKind::ALL
                .iter()
                .map(|kind| (kind.code(), self.rejections(*kind)))
                .collect(),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP bridgeledger_units_total Total units of work started
# TYPE bridgeledger_units_total counter
bridgeledger_units_total {}

# HELP bridgeledger_units_committed Total units of work committed
# TYPE bridgeledger_units_committed counter
bridgeledger_units_committed {}

# HELP bridgeledger_units_rejected Total units of work rejected
# TYPE bridgeledger_units_rejected counter
bridgeledger_units_rejected {}

# HELP bridgeledger_conversions_committed Total conversions committed
# TYPE bridgeledger_conversions_committed counter
bridgeledger_conversions_committed {}

# HELP bridgeledger_batches_committed Total batches committed
# TYPE bridgeledger_batches_committed counter
bridgeledger_batches_committed {}

# HELP bridgeledger_previews_total Total conversion previews
# TYPE bridgeledger_previews_total counter
bridgeledger_previews_total {}

# HELP bridgeledger_rejections_total Rejected units by error code
# TYPE bridgeledger_rejections_total counter
"#,
            snapshot.units_total,
            snapshot.units_committed,
            snapshot.units_rejected,
            snapshot.conversions_committed,
            snapshot.batches_committed,
            snapshot.previews_total,
        );
        for (code, count) in &snapshot.rejections {
            out.push_str(&format!(
                "bridgeledger_rejections_total{{code=\"{}\"}} {}\n",
                code, count
            ));
        }
        out
    }
}

fn kind_index(kind: ErrorKind) -> usize {
    ErrorKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub units_total: u64,
    pub units_committed: u64,
    pub units_rejected: u64,
    pub conversions_committed: u64,
    pub batches_committed: u64,
    pub previews_total: u64,
    pub rejections: Vec<(&'static str, u64)>,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
