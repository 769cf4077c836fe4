use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::{
    clients::executor::Executor,
    models::health::{HealthCheckResponse, HealthStatus},
};

pub struct HealthChecker<P> {
    executor: Arc<Executor<P>>,
}

impl<P> HealthChecker<P>
where
    P: Serialize + Send + 'static,
{
    pub fn new(executor: Arc<Executor<P>>) -> Self {
        Self { executor }
    }

    pub async fn check(&self) -> HealthCheckResponse {
        let status = if self.executor.is_shut_down().await {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };

        HealthCheckResponse {
            status,
            timestamp: Utc::now(),
            active_destinations: self.executor.active_destinations().await,
        }
    }
}
