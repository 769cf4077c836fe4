use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use anyhow::Result;
use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{Duration, sleep, timeout},
};
use webhook_relay::{
    clients::{executor::Executor, sink::OutcomeSink, webhook::WebhookClient},
    models::{
        embed::{EmbedBuilder, WebhookPayload},
        retry::RetryConfig,
        task::TaskOutcome,
    },
};

/// Forwards every outcome to a channel the test can await on.
pub struct ChannelSink(UnboundedSender<TaskOutcome>);

impl OutcomeSink for ChannelSink {
    fn record(&self, outcome: &TaskOutcome) {
        let _ = self.0.send(outcome.clone());
    }
}

pub fn test_executor_with<P>(
    retry_config: RetryConfig,
) -> Result<(Executor<P>, UnboundedReceiver<TaskOutcome>)>
where
    P: serde::Serialize + Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    let client = WebhookClient::new(&retry_config)?;
    let executor = Executor::new(client, retry_config, Arc::new(ChannelSink(sender)));

    Ok((executor, receiver))
}

pub fn test_executor() -> Result<(Executor, UnboundedReceiver<TaskOutcome>)> {
    test_executor_with(RetryConfig {
        max_attempts: 3,
        request_timeout: Duration::from_secs(5),
    })
}

pub async fn next_outcome(outcomes: &mut UnboundedReceiver<TaskOutcome>) -> TaskOutcome {
    timeout(Duration::from_secs(15), outcomes.recv())
        .await
        .expect("timed out waiting for a delivery outcome")
        .expect("outcome sink closed")
}

/// Skips requeue notifications and returns the next final outcome.
pub async fn next_terminal(outcomes: &mut UnboundedReceiver<TaskOutcome>) -> TaskOutcome {
    loop {
        let outcome = next_outcome(outcomes).await;
        if outcome.status.is_terminal() {
            return outcome;
        }
    }
}

pub fn card(title: &str) -> WebhookPayload {
    WebhookPayload::from(EmbedBuilder::new().with_title(title).build())
}

pub fn message(id: &str) -> Value {
    json!({ "id": id, "channel_id": "1", "content": "" })
}

pub fn title_of(body: &[u8]) -> String {
    let value: Value = serde_json::from_slice(body).expect("request body is json");
    value["embeds"][0]["title"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// Unix seconds `offset_ms` from now, formatted the way destinations send
/// `x-ratelimit-reset`.
pub fn reset_in(offset_ms: i64) -> String {
    let reset = chrono::Utc::now() + chrono::Duration::milliseconds(offset_ms);
    format!("{:.3}", reset.timestamp_millis() as f64 / 1000.0)
}

#[derive(Default)]
struct FakeState {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    next_id: AtomicU64,
    titles: Mutex<Vec<String>>,
}

/// A destination that answers slowly and records how many requests overlap.
pub struct FakeDestination {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeDestination {
    pub async fn start(delay: Duration) -> Result<Self> {
        let state = Arc::new(FakeState {
            delay,
            ..Default::default()
        });

        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/hook", listener.local_addr()?);

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { url, state })
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn titles(&self) -> Vec<String> {
        self.state.titles.lock().unwrap().clone()
    }
}

async fn receive(State(state): State<Arc<FakeState>>, Json(payload): Json<WebhookPayload>) -> Json<Value> {
    let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

    sleep(state.delay).await;

    let title = payload
        .embeds
        .first()
        .and_then(|embed| embed.title.clone())
        .unwrap_or_default();
    state.titles.lock().unwrap().push(title);

    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    let id = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    Json(message(&id.to_string()))
}
