use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub server_port: u16,

    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_max_delivery_attempts() -> u32 {
    3
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;

        if config.max_delivery_attempts == 0 {
            return Err(anyhow!("MAX_DELIVERY_ATTEMPTS must be at least 1"));
        }

        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_delivery_attempts,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }
}
