//! Typed notifications emitted for accepted conversions.

use bridgeledger_common::{AccountId, Price, SourceTxId, TargetAmount, Timestamp, UsdValue};
use bridgeledger_ledger::ConversionRecord;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Notification about a committed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Source funds were credited to the ledger.
    Received {
        submitter: AccountId,
        source_tx_id: SourceTxId,
        source_amount: u64,
        unit_seq: u64,
    },
    /// One conversion with the prices it used.
    Converted {
        submitter: AccountId,
        source_tx_id: SourceTxId,
        source_amount: u64,
        usd_value: UsdValue,
        target_amount: TargetAmount,
        source_price: Price,
        target_price: Price,
        timestamp: Timestamp,
    },
    /// Aggregate of a committed batch.
    BatchConverted {
        submitter: AccountId,
        total_usd: UsdValue,
        total_target: TargetAmount,
        item_count: usize,
        unit_seq: u64,
    },
}

impl Notification {
    /// The `Received`/`Converted` pair for a committed record.
    pub fn pair_for(record: &ConversionRecord) -> [Notification; 2] {
        [
            Notification::Received {
                submitter: record.submitter.clone(),
                source_tx_id: record.source_tx_id,
                source_amount: record.source_amount,
                unit_seq: record.unit_seq,
            },
            Notification::Converted {
                submitter: record.submitter.clone(),
                source_tx_id: record.source_tx_id,
                source_amount: record.source_amount,
                usd_value: record.usd_value,
                target_amount: record.target_amount,
                source_price: record.source_price,
                target_price: record.target_price,
                timestamp: record.timestamp,
            },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Notification::Received { .. } => "Received",
            Notification::Converted { .. } => "Converted",
            Notification::BatchConverted { .. } => "BatchConverted",
        }
    }
}

/// Fan-out of notifications to any number of subscribers.
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, notifications: &[Notification]) {
        for notification in notifications {
            if self.sender.send(notification.clone()).is_err() {
                debug!(kind = notification.name(), "No notification subscribers");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(seq: u64) -> Notification {
        Notification::Received {
            submitter: AccountId::new("alice"),
            source_tx_id: SourceTxId::from_bytes([7; 32]),
            source_amount: 1,
            unit_seq: seq,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let notifier = Notifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.publish(&[received(1), received(2)]);

        assert_eq!(rx.recv().await.unwrap(), received(1));
        assert_eq!(rx.recv().await.unwrap(), received(2));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new(16);
        notifier.publish(&[received(1)]);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(received(3)).unwrap();
        assert_eq!(json["type"], "Received");
        assert_eq!(json["unit_seq"], 3);
    }
}
