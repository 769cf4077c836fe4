use std::time::Duration;

/// Delivery policy shared by every destination queue.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Processing passes a task may take, rate-limit requeues included.
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}
