//! BridgeLedger Conversion Service
//!
//! Accepts conversion requests for credited source-chain transfers and
//! commits each request, or each whole batch, to the ledger as a single
//! all-or-nothing unit of work.

pub mod service;
pub mod config;
pub mod events;
pub mod state;
pub mod metrics;
pub mod scenario;
pub mod runner;

pub use service::{BatchResult, ConversionReceipt, ConversionRequest, ConversionService};
pub use config::ServiceConfig;
pub use events::{Notification, Notifier};
pub use state::UnitState;
pub use metrics::{Metrics, MetricsSnapshot};
pub use scenario::{Scenario, ScenarioStep};
pub use runner::{ScenarioReport, ScenarioRunner};
