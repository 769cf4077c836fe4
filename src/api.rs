use std::{future::Future, sync::Arc};

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clients::{executor::Executor, health::HealthChecker},
    error::EnqueueError,
    models::{embed::WebhookPayload, health::HealthStatus, task::EnqueueOptions},
};

pub struct AppState {
    executor: Arc<Executor>,
    health_checker: HealthChecker<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub destination: String,

    #[serde(default)]
    pub tracking_key: Option<String>,

    pub payload: WebhookPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryAccepted {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(executor: Arc<Executor>) -> Router {
    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(Arc::clone(&executor)),
        executor,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/deliveries", post(enqueue_delivery))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(
    listener: TcpListener,
    executor: Arc<Executor>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Error> {
    info!(address = %listener.local_addr()?, "Relay server started");

    axum::serve(listener, router(executor))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn enqueue_delivery(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeliveryRequest>,
) -> impl IntoResponse {
    let mut options = EnqueueOptions::default();
    if let Some(key) = request.tracking_key {
        options = options.with_tracking_key(key);
    }

    match state
        .executor
        .enqueue(&request.destination, request.payload, options)
        .await
    {
        Ok(task_id) => (
            StatusCode::ACCEPTED,
            Json(DeliveryAccepted { task_id }),
        )
            .into_response(),
        Err(e) => {
            warn!(destination = %request.destination, error = %e, "Rejected delivery request");

            let status_code = match e {
                EnqueueError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
                EnqueueError::EmptyDestination | EnqueueError::InvalidDestination { .. } => {
                    StatusCode::BAD_REQUEST
                }
            };

            (
                status_code,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
