use serde::Serialize;
use uuid::Uuid;

use crate::models::status::DeliveryStatus;

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub tracking_key: Option<String>,
}

impl EnqueueOptions {
    /// Tags the task so later deliveries under the same key edit the same message.
    /// An empty key leaves the task untracked.
    pub fn with_tracking_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.tracking_key = if key.is_empty() { None } else { Some(key) };
        self
    }
}

#[derive(Debug)]
pub struct DeliveryTask<P> {
    pub id: Uuid,
    pub tracking_key: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub payload: P,
}

impl<P> DeliveryTask<P> {
    pub fn new(payload: P, options: EnqueueOptions, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracking_key: options.tracking_key,
            attempts: 0,
            max_attempts,
            payload,
        }
    }

    pub fn should_track(&self) -> bool {
        self.tracking_key.is_some()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// What happened to a task, reported once per terminal transition and once
/// per rate-limit requeue.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub destination: String,
    pub tracking_key: Option<String>,
    pub attempts: u32,
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn new<P>(task: &DeliveryTask<P>, destination: &str, status: DeliveryStatus) -> Self {
        Self {
            task_id: task.id,
            destination: destination.to_string(),
            tracking_key: task.tracking_key.clone(),
            attempts: task.attempts,
            status,
            message_id: None,
            error: None,
        }
    }

    pub fn with_message_id(mut self, message_id: String) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}
