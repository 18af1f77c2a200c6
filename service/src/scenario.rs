//! Conversion scenarios for the command-line runner.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A scripted sequence of conversion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
///
/// Transaction ids and prices stay strings here so that malformed values
/// reach the service and are reported like any other rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Change the simulated prices (decimal USD strings).
    SetPrices {
        source: Option<String>,
        target: Option<String>,
    },
    /// Take the simulated price feed down or bring it back.
    SetPriceFeed { available: bool },
    /// Preview a conversion.
    Preview { source_amount: u64 },
    /// Convert a single transfer.
    Convert {
        submitter: String,
        source_amount: u64,
        source_tx_id: String,
    },
    /// Convert several transfers as one unit.
    BatchConvert {
        submitter: String,
        source_amounts: Vec<u64>,
        source_tx_ids: Vec<String>,
    },
    /// Report totals, globally or for one account.
    Stats { account: Option<String> },
}

impl ScenarioStep {
    pub fn action(&self) -> &'static str {
        match self {
            ScenarioStep::SetPrices { .. } => "set_prices",
            ScenarioStep::SetPriceFeed { .. } => "set_price_feed",
            ScenarioStep::Preview { .. } => "preview",
            ScenarioStep::Convert { .. } => "convert",
            ScenarioStep::BatchConvert { .. } => "batch_convert",
            ScenarioStep::Stats { .. } => "stats",
        }
    }
}

const DEMO_SUBMITTER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read scenario {}: {}", path.display(), e))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Three single conversions, a replayed transaction and a three-item
    /// batch at $0.62 / $0.045.
    pub fn demo() -> Self {
        let convert = |amount: u64, tx: &str| ScenarioStep::Convert {
            submitter: DEMO_SUBMITTER.to_string(),
            source_amount: amount,
            source_tx_id: tx.to_string(),
        };

        Self {
            name: "demo".to_string(),
            description: "Single and batch conversions with replay protection".to_string(),
            steps: vec![
                ScenarioStep::SetPrices {
                    source: Some("0.62".to_string()),
                    target: Some("0.045".to_string()),
                },
                ScenarioStep::Preview {
                    source_amount: 100_000_000,
                },
                convert(
                    100_000_000,
                    "1A2B3C4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890",
                ),
                convert(
                    250_000_000,
                    "2B3C4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF12345678901A",
                ),
                convert(
                    500_000_000,
                    "3C4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF12345678901A2B",
                ),
                // Replay of the first transfer.
                convert(
                    100_000_000,
                    "1A2B3C4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890",
                ),
                ScenarioStep::BatchConvert {
                    submitter: DEMO_SUBMITTER.to_string(),
                    source_amounts: vec![75_000_000, 150_000_000, 300_000_000],
                    source_tx_ids: vec![
                        "4D5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF12345678901A2B3C"
                            .to_string(),
                        "5E6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF12345678901A2B3C4D"
                            .to_string(),
                        "6F7890ABCDEF1234567890ABCDEF1234567890ABCDEF12345678901A2B3C4D5E"
                            .to_string(),
                    ],
                },
                ScenarioStep::Stats {
                    account: Some(DEMO_SUBMITTER.to_string()),
                },
                ScenarioStep::Stats { account: None },
            ],
        }
    }
}
