use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::LifecycleConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub server_key: String,
    pub webhook_target_url: Option<String>,
    pub webhook_timeout: Duration,
    pub pending_webhook_delay: Duration,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://payment.db?mode=rwc".to_string()),
            server_key: env::var("SERVER_KEY").unwrap_or_default(),
            webhook_target_url: env::var("WEBHOOK_TARGET_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            webhook_timeout: Duration::from_secs(parse_var("WEBHOOK_TIMEOUT_SECS", 30)?),
            pending_webhook_delay: Duration::from_secs(parse_var("PENDING_WEBHOOK_DELAY_SECS", 10)?),
            shutdown_grace: Duration::from_secs(parse_var("SHUTDOWN_GRACE_SECS", 5)?),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            server_key: self.server_key.clone(),
            webhook_target_url: self.webhook_target_url.clone(),
            pending_webhook_delay: self.pending_webhook_delay,
            ..LifecycleConfig::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
