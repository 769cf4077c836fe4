use tracing::{debug, info, warn};

use crate::models::{status::DeliveryStatus, task::TaskOutcome};

/// Receives every task outcome the delivery queues produce.
///
/// Called from the queue worker between deliveries, so implementations must
/// not block.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, outcome: &TaskOutcome);
}

/// Writes outcomes to the `webhook_relay::outcome` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&self, outcome: &TaskOutcome) {
        match outcome.status {
            DeliveryStatus::Succeeded => info!(
                target: "webhook_relay::outcome",
                task = %outcome.task_id,
                destination = %outcome.destination,
                attempts = outcome.attempts,
                message_id = outcome.message_id.as_deref().unwrap_or_default(),
                "Delivery succeeded"
            ),
            DeliveryStatus::Failed | DeliveryStatus::Discarded => warn!(
                target: "webhook_relay::outcome",
                task = %outcome.task_id,
                destination = %outcome.destination,
                attempts = outcome.attempts,
                status = %outcome.status,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Delivery abandoned"
            ),
            _ => debug!(
                target: "webhook_relay::outcome",
                task = %outcome.task_id,
                destination = %outcome.destination,
                attempts = outcome.attempts,
                status = %outcome.status,
                "Delivery in progress"
            ),
        }
    }
}
