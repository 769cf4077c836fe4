use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::{Duration, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{sink::OutcomeSink, tracker::MessageTracker, webhook::WebhookClient},
    error::{DeliveryError, EnqueueError},
    models::{
        delivery::DeliveryResponse,
        retry::RetryConfig,
        status::DeliveryStatus,
        task::{DeliveryTask, TaskOutcome},
    },
    utils::delay_until,
};

/// Everything a queue worker needs besides its own channel and tracker.
#[derive(Clone)]
pub struct QueueContext {
    pub client: WebhookClient,
    pub retry_config: RetryConfig,
    pub sink: Arc<dyn OutcomeSink>,
}

/// Serialized delivery for one destination.
///
/// A single worker drains the channel in arrival order, so two deliveries to
/// the same destination never overlap. Rate-limited tasks go to the back.
pub struct DeliveryQueue<P> {
    destination: Url,
    sender: mpsc::UnboundedSender<DeliveryTask<P>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tracker: Arc<MessageTracker>,
}

enum Next<P> {
    Done,
    Requeue(DeliveryTask<P>, Option<Duration>),
}

impl<P> DeliveryQueue<P>
where
    P: Serialize + Send + 'static,
{
    /// Spawns the worker on the current runtime.
    pub fn start(destination: Url, context: QueueContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let tracker = Arc::new(MessageTracker::new());

        let worker = QueueWorker {
            destination: destination.clone(),
            label: destination.to_string(),
            receiver,
            requeue: sender.clone(),
            shutdown: shutdown_rx,
            tracker: Arc::clone(&tracker),
            context,
        };

        let handle = tokio::spawn(worker.run());

        Self {
            destination,
            sender,
            shutdown,
            worker: Mutex::new(Some(handle)),
            tracker,
        }
    }

    pub fn enqueue(&self, task: DeliveryTask<P>) -> Result<(), EnqueueError> {
        let task_id = task.id;

        self.sender.send(task).map_err(|_| EnqueueError::ShutDown)?;

        debug!(
            task = %task_id,
            destination = %self.destination,
            "Enqueued task"
        );

        Ok(())
    }

    pub fn tracker(&self) -> &MessageTracker {
        &self.tracker
    }

    /// Stops the worker and waits for it to exit. Tasks still waiting are
    /// reported as discarded.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(
                    destination = %self.destination,
                    error = %e,
                    "Delivery queue worker ended abnormally"
                );
            }
        }
    }
}

struct QueueWorker<P> {
    destination: Url,
    label: String,
    receiver: mpsc::UnboundedReceiver<DeliveryTask<P>>,
    requeue: mpsc::UnboundedSender<DeliveryTask<P>>,
    shutdown: watch::Receiver<bool>,
    tracker: Arc<MessageTracker>,
    context: QueueContext,
}

impl<P> QueueWorker<P>
where
    P: Serialize + Send + 'static,
{
    async fn run(mut self) {
        info!(destination = %self.label, "Started delivery queue");

        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let Next::Requeue(task, delay) = self.process_task(task).await else {
                continue;
            };

            if let Some(delay) = delay {
                let interrupted = tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => true,
                    _ = sleep(delay) => false,
                };

                if interrupted {
                    self.discard(&task);
                    break;
                }
            }

            if let Err(mpsc::error::SendError(task)) = self.requeue.send(task) {
                self.discard(&task);
                break;
            }
        }

        self.receiver.close();
        while let Ok(task) = self.receiver.try_recv() {
            self.discard(&task);
        }

        info!(destination = %self.label, "Stopped delivery queue");
    }

    async fn process_task(&self, mut task: DeliveryTask<P>) -> Next<P> {
        task.attempts += 1;

        debug!(
            task = %task.id,
            attempt = task.attempts,
            destination = %self.label,
            "Started processing task"
        );

        let body = match serde_json::to_vec(&task.payload) {
            Ok(body) => body,
            Err(e) => {
                self.fail(&task, DeliveryError::Encode(e));
                return Next::Done;
            }
        };

        let tracked_message_id = match &task.tracking_key {
            Some(key) => self.tracker.lookup_message_id(key).await,
            None => None,
        };

        let response = match &tracked_message_id {
            Some(message_id) => {
                self.context
                    .client
                    .update_message(&self.destination, message_id, body)
                    .await
            }
            None => self.context.client.create_message(&self.destination, body).await,
        };

        match response {
            DeliveryResponse::Success(message_id) => {
                if let Some(key) = &task.tracking_key {
                    self.tracker.record_message_id(key, &message_id).await;
                }

                debug!(
                    task = %task.id,
                    attempt = task.attempts,
                    message_id = %message_id,
                    "Successfully processed task"
                );

                self.context.sink.record(
                    &TaskOutcome::new(&task, &self.label, DeliveryStatus::Succeeded)
                        .with_message_id(message_id),
                );
                Next::Done
            }
            DeliveryResponse::RateLimited(Ok(reset_at)) => {
                if task.attempts_exhausted() {
                    self.fail(&task, DeliveryError::AttemptsExhausted(task.attempts));
                    return Next::Done;
                }

                let delay = delay_until(reset_at, Utc::now());

                warn!(
                    task = %task.id,
                    attempt = task.attempts,
                    destination = %self.label,
                    delay_ms = delay.map(|d| d.as_millis() as u64).unwrap_or(0),
                    "Got rate limited, re-queueing"
                );

                self.context.sink.record(&TaskOutcome::new(
                    &task,
                    &self.label,
                    DeliveryStatus::RateLimited,
                ));
                Next::Requeue(task, delay)
            }
            DeliveryResponse::RateLimited(Err(e)) | DeliveryResponse::Failed(e) => {
                self.fail(&task, e);
                Next::Done
            }
            DeliveryResponse::Rejected(status) => {
                self.fail(&task, DeliveryError::Rejected(status.as_u16()));
                Next::Done
            }
        }
    }

    fn fail(&self, task: &DeliveryTask<P>, e: DeliveryError) {
        error!(
            task = %task.id,
            attempt = task.attempts,
            destination = %self.label,
            error = %e,
            "Dropping task"
        );

        self.context.sink.record(
            &TaskOutcome::new(task, &self.label, DeliveryStatus::Failed).with_error(e.to_string()),
        );
    }

    fn discard(&self, task: &DeliveryTask<P>) {
        debug!(task = %task.id, destination = %self.label, "Discarding queued task");

        self.context.sink.record(
            &TaskOutcome::new(task, &self.label, DeliveryStatus::Discarded)
                .with_error("executor shut down".to_string()),
        );
    }
}
