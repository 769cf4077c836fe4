use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sending,
    Succeeded,
    RateLimited,
    Failed,
    Discarded,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Succeeded | DeliveryStatus::Failed | DeliveryStatus::Discarded
        )
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sending => write!(f, "sending"),
            DeliveryStatus::Succeeded => write!(f, "succeeded"),
            DeliveryStatus::RateLimited => write!(f, "rate_limited"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Discarded => write!(f, "discarded"),
        }
    }
}
