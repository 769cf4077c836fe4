use anyhow::{Error, Result, anyhow};
use reqwest::{Client, Response, StatusCode, Url, header::CONTENT_TYPE};
use tracing::{debug, info, warn};

use crate::{
    error::DeliveryError,
    models::{
        delivery::{DeliveryResponse, Message},
        retry::RetryConfig,
    },
    utils::{ellipsis, rate_limit_reset},
};

const MAX_LOGGED_BODY_CHARS: usize = 256;

/// Speaks the destination's message protocol: `POST {url}?wait=true` posts a
/// new message, `PATCH {url}/messages/{id}?wait=true` edits one.
#[derive(Clone)]
pub struct WebhookClient {
    http_client: Client,
}

impl WebhookClient {
    pub fn new(retry_config: &RetryConfig) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(retry_config.request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(
            timeout_ms = retry_config.request_timeout.as_millis() as u64,
            "Webhook client initialized"
        );

        Ok(Self { http_client })
    }

    pub async fn create_message(&self, destination: &Url, body: Vec<u8>) -> DeliveryResponse {
        let url = match message_url(destination, None) {
            Ok(url) => url,
            Err(e) => return DeliveryResponse::Failed(e),
        };

        debug!(url = %url, "Posting new message");

        match self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => interpret_response(response, None).await,
            Err(e) => DeliveryResponse::Failed(DeliveryError::Transport(e)),
        }
    }

    pub async fn update_message(
        &self,
        destination: &Url,
        message_id: &str,
        body: Vec<u8>,
    ) -> DeliveryResponse {
        let url = match message_url(destination, Some(message_id)) {
            Ok(url) => url,
            Err(e) => return DeliveryResponse::Failed(e),
        };

        debug!(url = %url, message_id, "Editing tracked message");

        match self
            .http_client
            .patch(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => interpret_response(response, Some(message_id)).await,
            Err(e) => DeliveryResponse::Failed(DeliveryError::Transport(e)),
        }
    }
}

/// Turns a raw response into the outcome the queue acts on.
///
/// `known_message_id` is the message an edit targeted; when absent the
/// response body must name the freshly posted message.
pub async fn interpret_response(
    response: Response,
    known_message_id: Option<&str>,
) -> DeliveryResponse {
    let status = response.status();

    if status.is_success() {
        if let Some(message_id) = known_message_id {
            return DeliveryResponse::Success(message_id.to_string());
        }

        return match response.json::<Message>().await {
            Ok(message) => DeliveryResponse::Success(message.id),
            Err(e) => DeliveryResponse::Failed(DeliveryError::Decode(e)),
        };
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return DeliveryResponse::RateLimited(rate_limit_reset(response.headers()));
    }

    let body = response.text().await.unwrap_or_default();
    warn!(
        status = status.as_u16(),
        body = %ellipsis(&body, MAX_LOGGED_BODY_CHARS),
        "Destination rejected request"
    );

    DeliveryResponse::Rejected(status)
}

fn message_url(destination: &Url, message_id: Option<&str>) -> Result<Url, DeliveryError> {
    let mut url = destination.clone();

    if let Some(message_id) = message_id {
        url.path_segments_mut()
            .map_err(|_| DeliveryError::InvalidDestination(destination.to_string()))?
            .pop_if_empty()
            .push("messages")
            .push(message_id);
    }

    url.query_pairs_mut().append_pair("wait", "true");

    Ok(url)
}
