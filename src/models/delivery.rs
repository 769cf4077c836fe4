use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::DeliveryError;

/// Classification of one exchange with a destination.
#[derive(Debug)]
pub enum DeliveryResponse {
    /// Posted or edited; carries the id of the message now holding the card.
    Success(String),
    /// Throttled; carries the reset instant or why it could not be read.
    RateLimited(Result<DateTime<Utc>, DeliveryError>),
    Rejected(StatusCode),
    Failed(DeliveryError),
}

/// The slice of the destination's message object the relay cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
}
