//! Wiring of the lifecycle engine and its background machinery.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::Stores;
use crate::config::Config;
use crate::services::{
    ExpiryScheduler, HttpTransport, LifecycleConfig, RetryPolicy, TaskSupervisor,
    TransactionService, WebhookDispatcher, WebhookTransport,
};

/// The lifecycle service plus the supervisor owning its background tasks.
#[derive(Clone)]
pub struct Engine {
    pub service: TransactionService,
    pub supervisor: TaskSupervisor,
}

impl Engine {
    pub fn new(
        stores: Stores,
        transport: Arc<dyn WebhookTransport>,
        retry_policy: RetryPolicy,
        lifecycle: LifecycleConfig,
    ) -> Self {
        let supervisor = TaskSupervisor::new();
        let dispatcher = WebhookDispatcher::new(transport, retry_policy, supervisor.clone());
        let scheduler = ExpiryScheduler::new(supervisor.clone());
        let service = TransactionService::new(stores, dispatcher, scheduler, lifecycle);
        Self {
            service,
            supervisor,
        }
    }

    /// Builds the engine the server runs with: real HTTP transport and the
    /// default retry schedule.
    pub fn from_config(config: &Config, stores: Stores) -> Result<Self> {
        let transport = HttpTransport::new(config.webhook_timeout)
            .context("building webhook http client")?;
        if config.webhook_target_url.is_none() {
            tracing::warn!("WEBHOOK_TARGET_URL is not set, webhook delivery disabled");
        }
        Ok(Self::new(
            stores,
            Arc::new(transport),
            RetryPolicy::default(),
            config.lifecycle(),
        ))
    }

    pub async fn shutdown(&self, grace: Duration) {
        if self.supervisor.shutdown(grace).await {
            tracing::info!("background tasks stopped");
        }
    }
}
