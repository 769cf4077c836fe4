use std::{collections::HashMap, sync::Arc};

use futures_util::future::join_all;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::{
        queue::{DeliveryQueue, QueueContext},
        sink::OutcomeSink,
        webhook::WebhookClient,
    },
    error::EnqueueError,
    models::{
        embed::{Embed, WebhookPayload},
        retry::RetryConfig,
        task::{DeliveryTask, EnqueueOptions},
    },
};

struct Registry<P> {
    queues: HashMap<String, Arc<DeliveryQueue<P>>>,
    closed: bool,
}

/// Entry point for delivering payloads to destinations.
///
/// Each distinct destination gets one [`DeliveryQueue`], created on first
/// use and kept until [`Executor::shutdown`]. Deliveries to one destination
/// run one at a time; different destinations run in parallel.
pub struct Executor<P = WebhookPayload> {
    registry: RwLock<Registry<P>>,
    context: QueueContext,
}

impl<P> Executor<P>
where
    P: Serialize + Send + 'static,
{
    pub fn new(client: WebhookClient, retry_config: RetryConfig, sink: Arc<dyn OutcomeSink>) -> Self {
        info!(
            max_attempts = retry_config.max_attempts,
            "Delivery executor initialized"
        );

        Self {
            registry: RwLock::new(Registry {
                queues: HashMap::new(),
                closed: false,
            }),
            context: QueueContext {
                client,
                retry_config,
                sink,
            },
        }
    }

    /// Hands `payload` to the destination's queue and returns the task id.
    ///
    /// Only caller mistakes are reported here. What happens to the delivery
    /// itself goes to the outcome sink.
    pub async fn enqueue(
        &self,
        destination: &str,
        payload: P,
        options: EnqueueOptions,
    ) -> Result<Uuid, EnqueueError> {
        let queue = self.queue_for(destination).await?;

        let task = DeliveryTask::new(payload, options, self.context.retry_config.max_attempts);
        let task_id = task.id;

        queue.enqueue(task)?;

        Ok(task_id)
    }

    pub async fn active_destinations(&self) -> usize {
        self.registry.read().await.queues.len()
    }

    pub async fn is_shut_down(&self) -> bool {
        self.registry.read().await.closed
    }

    /// Message currently representing `key` at `destination`, if any.
    pub async fn tracked_message_id(&self, destination: &str, key: &str) -> Option<String> {
        let queue = self.registry.read().await.queues.get(destination).cloned()?;
        queue.tracker().lookup_message_id(key).await
    }

    /// Stops every worker and discards whatever is still queued.
    /// Later calls to `enqueue` fail with [`EnqueueError::ShutDown`].
    pub async fn shutdown(&self) {
        let queues: Vec<_> = {
            let mut registry = self.registry.write().await;
            registry.closed = true;
            registry.queues.drain().map(|(_, queue)| queue).collect()
        };

        info!(destinations = queues.len(), "Shutting down delivery executor");

        join_all(queues.iter().map(|queue| queue.shutdown())).await;
    }

    async fn queue_for(&self, destination: &str) -> Result<Arc<DeliveryQueue<P>>, EnqueueError> {
        if destination.is_empty() {
            return Err(EnqueueError::EmptyDestination);
        }

        {
            let registry = self.registry.read().await;
            if registry.closed {
                return Err(EnqueueError::ShutDown);
            }
            if let Some(queue) = registry.queues.get(destination) {
                return Ok(Arc::clone(queue));
            }
        }

        let url = parse_destination(destination)?;

        let mut registry = self.registry.write().await;
        if registry.closed {
            return Err(EnqueueError::ShutDown);
        }
        if let Some(queue) = registry.queues.get(destination) {
            return Ok(Arc::clone(queue));
        }

        let queue = Arc::new(DeliveryQueue::start(url, self.context.clone()));
        registry
            .queues
            .insert(destination.to_string(), Arc::clone(&queue));

        Ok(queue)
    }
}

impl Executor<WebhookPayload> {
    pub async fn enqueue_embed(
        &self,
        destination: &str,
        embed: Embed,
        options: EnqueueOptions,
    ) -> Result<Uuid, EnqueueError> {
        self.enqueue(destination, WebhookPayload::from(embed), options)
            .await
    }
}

fn parse_destination(destination: &str) -> Result<Url, EnqueueError> {
    let invalid = |reason: String| EnqueueError::InvalidDestination {
        url: destination.to_string(),
        reason,
    };

    let url = Url::parse(destination).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    Ok(url)
}
