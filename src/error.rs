/// Reasons a single delivery attempt ends without a posted message.
///
/// These never reach the caller of `Executor::enqueue`; they end up in the
/// outcome sink and the logs.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request to destination failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to parse response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("cannot build message url from destination '{0}'")]
    InvalidDestination(String),

    #[error("rate limited without an x-ratelimit-reset header")]
    MissingRateLimitReset,

    #[error("rate limited with an unreadable x-ratelimit-reset header '{0}'")]
    InvalidRateLimitReset(String),

    #[error("destination answered with status {0}")]
    Rejected(u16),

    #[error("gave up after {0} attempts")]
    AttemptsExhausted(u32),
}

/// Caller contract violations reported synchronously by `Executor::enqueue`.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("destination url is empty")]
    EmptyDestination,

    #[error("destination url '{url}' is invalid: {reason}")]
    InvalidDestination { url: String, reason: String },

    #[error("executor has been shut down")]
    ShutDown,
}
