use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

/// Remembers which message a tracking key was last delivered as, so the next
/// delivery under that key edits it instead of posting a new one.
///
/// Entries live as long as the process; the last successful delivery wins.
#[derive(Debug, Default)]
pub struct MessageTracker {
    message_ids: Mutex<HashMap<String, String>>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_message_id(&self, key: &str, message_id: &str) {
        let mut message_ids = self.message_ids.lock().await;
        message_ids.insert(key.to_string(), message_id.to_string());

        debug!(tracking_key = key, message_id, "Tracked message id");
    }

    pub async fn lookup_message_id(&self, key: &str) -> Option<String> {
        self.message_ids.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.message_ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.message_ids.lock().await.is_empty()
    }
}
