use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tokio::time::Duration;

use crate::error::DeliveryError;

pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Reads the instant a throttled destination accepts requests again.
///
/// The header holds Unix seconds; a fractional part is honoured.
pub fn rate_limit_reset(headers: &HeaderMap) -> Result<DateTime<Utc>, DeliveryError> {
    let raw = headers
        .get(RATE_LIMIT_RESET_HEADER)
        .ok_or(DeliveryError::MissingRateLimitReset)?;

    let text = raw
        .to_str()
        .map_err(|_| {
            DeliveryError::InvalidRateLimitReset(String::from_utf8_lossy(raw.as_bytes()).into_owned())
        })?
        .trim();

    let seconds: f64 = text
        .parse()
        .map_err(|_| DeliveryError::InvalidRateLimitReset(text.to_string()))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DeliveryError::InvalidRateLimitReset(text.to_string()));
    }

    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1_000_000_000.0) as u32;

    DateTime::from_timestamp(whole, nanos)
        .ok_or_else(|| DeliveryError::InvalidRateLimitReset(text.to_string()))
}

/// Time left until `reset_at`, or `None` once it has passed.
pub fn delay_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (reset_at - now).to_std().ok().filter(|delay| !delay.is_zero())
}

/// Shortens `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut shortened: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}
