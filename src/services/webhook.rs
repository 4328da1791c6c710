//! Webhook delivery: status-code driven retries with a fixed backoff table.
//!
//! Delivery is at-least-once and best-effort. A job is retried according to
//! the class of the most recent response and dropped once its cap is reached;
//! nothing here ever fails the business operation that produced the event.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use super::tasks::TaskSupervisor;

const MINUTE: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Pending,
    Settlement,
    Expired,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pending => "pending",
            EventKind::Settlement => "settlement",
            EventKind::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub event: EventKind,
    pub order_id: String,
    pub target_url: String,
    pub body: String,
}

impl WebhookJob {
    pub fn new<T: Serialize>(
        event: EventKind,
        order_id: &str,
        target_url: &str,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event,
            order_id: order_id.to_string(),
            target_url: target_url.to_string(),
            body: serde_json::to_string(payload)?,
        })
    }
}

/// How a single response steers the retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    PermanentFailure,
    Redirect,
    /// Retry while fewer than `cap` retries have been spent.
    Retry { cap: usize },
}

impl ResponseClass {
    pub const DEFAULT_RETRY_CAP: usize = 5;

    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => ResponseClass::Success,
            301 | 302 | 303 => ResponseClass::PermanentFailure,
            307 | 308 => ResponseClass::Redirect,
            400 | 404 => ResponseClass::Retry { cap: 2 },
            500 => ResponseClass::Retry { cap: 1 },
            503 => ResponseClass::Retry { cap: 4 },
            _ => ResponseClass::Retry {
                cap: Self::DEFAULT_RETRY_CAP,
            },
        }
    }

    pub fn network_error() -> Self {
        ResponseClass::Retry {
            cap: Self::DEFAULT_RETRY_CAP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Wait before retry `n` is `delays[n]`.
    pub delays: Vec<Duration>,
    pub max_redirects: usize,
}

impl RetryPolicy {
    /// The wait after failed attempt `attempt` (zero based), or `None` when
    /// the job has to be dropped.
    pub fn next_delay(&self, attempt: usize, class: ResponseClass) -> Option<Duration> {
        match class {
            ResponseClass::Retry { cap } if attempt < cap => self.delays.get(attempt).copied(),
            _ => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: [2, 10, 30, 90, 210]
                .into_iter()
                .map(|minutes| Duration::from_secs(minutes * MINUTE))
                .collect(),
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub location: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// A single HTTP POST. Implementations must not follow redirects.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(TransportResponse {
            status: response.status().as_u16(),
            location,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: usize },
    Rejected { status: u16, attempts: usize },
    Exhausted { attempts: usize, last_error: String },
}

#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryStatsSnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered { .. } => &self.delivered,
            DeliveryOutcome::Rejected { .. } => &self.rejected,
            DeliveryOutcome::Exhausted { .. } => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    policy: Arc<RetryPolicy>,
    stats: Arc<DeliveryStats>,
    supervisor: TaskSupervisor,
}

impl WebhookDispatcher {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        policy: RetryPolicy,
        supervisor: TaskSupervisor,
    ) -> Self {
        Self {
            transport,
            policy: Arc::new(policy),
            stats: Arc::new(DeliveryStats::default()),
            supervisor,
        }
    }

    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Hands the job to a background task that waits `delay` and then runs the
    /// full retry sequence.
    pub fn enqueue(&self, job: WebhookJob, delay: Duration) {
        let dispatcher = self.clone();
        let order_id = job.order_id.clone();
        let event = job.event;
        let started = self.supervisor.spawn("webhook-delivery", async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            dispatcher.deliver(&job).await;
        });
        if !started {
            warn!(order_id = %order_id, event = event.as_str(), "webhook not enqueued, shutting down");
        }
    }

    /// Runs the retry state machine for `job` to completion.
    pub async fn deliver(&self, job: &WebhookJob) -> DeliveryOutcome {
        let mut attempt = 0usize;
        loop {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            let (class, status, detail) =
                match self.send_following_redirects(&job.target_url, &job.body).await {
                    Ok(response) => {
                        // still redirecting after the hop limit
                        let class = match ResponseClass::from_status(response.status) {
                            ResponseClass::Redirect => ResponseClass::network_error(),
                            class => class,
                        };
                        (class, response.status, format!("status {}", response.status))
                    }
                    Err(err) => (ResponseClass::network_error(), 0, err.to_string()),
                };

            let outcome = match class {
                ResponseClass::Success => Some(DeliveryOutcome::Delivered {
                    attempts: attempt + 1,
                }),
                ResponseClass::PermanentFailure => Some(DeliveryOutcome::Rejected {
                    status,
                    attempts: attempt + 1,
                }),
                _ => match self.policy.next_delay(attempt, class) {
                    Some(wait) => {
                        warn!(
                            order_id = %job.order_id,
                            event = job.event.as_str(),
                            attempt = attempt + 1,
                            retry_in_secs = wait.as_secs(),
                            "webhook delivery failed: {}",
                            detail
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        None
                    }
                    None => Some(DeliveryOutcome::Exhausted {
                        attempts: attempt + 1,
                        last_error: detail,
                    }),
                },
            };

            if let Some(outcome) = outcome {
                self.report(job, &outcome);
                return outcome;
            }
        }
    }

    async fn send_following_redirects(
        &self,
        url: &str,
        body: &str,
    ) -> Result<TransportResponse, TransportError> {
        let mut target = url.to_string();
        let mut hops = 0usize;
        loop {
            let response = self.transport.post(&target, body).await?;
            let is_redirect = matches!(
                ResponseClass::from_status(response.status),
                ResponseClass::Redirect
            );
            if !is_redirect || hops >= self.policy.max_redirects {
                return Ok(response);
            }
            let Some(location) = response.location.as_deref() else {
                return Ok(response);
            };
            target = resolve_location(&target, location)?;
            hops += 1;
        }
    }

    fn report(&self, job: &WebhookJob, outcome: &DeliveryOutcome) {
        self.stats.record(outcome);
        match outcome {
            DeliveryOutcome::Delivered { attempts } => info!(
                order_id = %job.order_id,
                event = job.event.as_str(),
                attempts,
                "webhook delivered"
            ),
            DeliveryOutcome::Rejected { status, attempts } => error!(
                order_id = %job.order_id,
                event = job.event.as_str(),
                status,
                attempts,
                "webhook permanently rejected by target"
            ),
            DeliveryOutcome::Exhausted {
                attempts,
                last_error,
            } => error!(
                order_id = %job.order_id,
                event = job.event.as_str(),
                attempts,
                "webhook dropped after exhausting retries: {}",
                last_error
            ),
        }
    }
}

fn resolve_location(base: &str, location: &str) -> Result<String, TransportError> {
    let base = url::Url::parse(base).map_err(|e| TransportError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    base.join(location)
        .map(String::from)
        .map_err(|e| TransportError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(ResponseClass::from_status(200), ResponseClass::Success);
        assert_eq!(ResponseClass::from_status(204), ResponseClass::Success);
        assert_eq!(ResponseClass::from_status(301), ResponseClass::PermanentFailure);
        assert_eq!(ResponseClass::from_status(303), ResponseClass::PermanentFailure);
        assert_eq!(ResponseClass::from_status(307), ResponseClass::Redirect);
        assert_eq!(ResponseClass::from_status(400), ResponseClass::Retry { cap: 2 });
        assert_eq!(ResponseClass::from_status(404), ResponseClass::Retry { cap: 2 });
        assert_eq!(ResponseClass::from_status(500), ResponseClass::Retry { cap: 1 });
        assert_eq!(ResponseClass::from_status(503), ResponseClass::Retry { cap: 4 });
        assert_eq!(ResponseClass::from_status(418), ResponseClass::Retry { cap: 5 });
        assert_eq!(ResponseClass::from_status(304), ResponseClass::Retry { cap: 5 });
    }

    #[test]
    fn next_delay_honours_cap_and_table() {
        let policy = RetryPolicy::default();
        let unavailable = ResponseClass::from_status(503);
        let waits: Vec<_> = (0..6)
            .map(|attempt| policy.next_delay(attempt, unavailable))
            .collect();
        assert_eq!(
            waits,
            vec![
                Some(Duration::from_secs(120)),
                Some(Duration::from_secs(600)),
                Some(Duration::from_secs(1800)),
                Some(Duration::from_secs(5400)),
                None,
                None,
            ]
        );

        assert_eq!(policy.next_delay(0, ResponseClass::Success), None);
        assert_eq!(policy.next_delay(4, ResponseClass::network_error()), Some(Duration::from_secs(12600)));
        assert_eq!(policy.next_delay(5, ResponseClass::network_error()), None);
    }

    #[test]
    fn resolves_relative_locations() {
        assert_eq!(
            resolve_location("http://host/hooks/a", "/hooks/b").unwrap(),
            "http://host/hooks/b"
        );
        assert_eq!(
            resolve_location("http://host/hooks/a", "http://other/x").unwrap(),
            "http://other/x"
        );
        assert!(resolve_location("not a url", "/x").is_err());
    }

    #[test]
    fn stats_count_outcomes() {
        let stats = DeliveryStats::default();
        stats.record(&DeliveryOutcome::Delivered { attempts: 1 });
        stats.record(&DeliveryOutcome::Rejected { status: 301, attempts: 1 });
        stats.record(&DeliveryOutcome::Exhausted {
            attempts: 2,
            last_error: "status 500".to_string(),
        });
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.dropped, 1);
    }
}
