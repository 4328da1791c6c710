mod common;

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use common::fast_retry_policy;
use mock_payment_gateway::services::{
    DeliveryOutcome, EventKind, HttpTransport, RetryPolicy, TaskSupervisor, TransportError,
    TransportResponse, WebhookDispatcher, WebhookJob, WebhookTransport,
};

fn http_dispatcher() -> WebhookDispatcher {
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    WebhookDispatcher::new(Arc::new(transport), fast_retry_policy(), TaskSupervisor::new())
}

fn job(target_url: &str) -> WebhookJob {
    WebhookJob::new(
        EventKind::Settlement,
        "ORDER-1",
        target_url,
        &json!({ "order_id": "ORDER-1", "transaction_status": "settlement" }),
    )
    .unwrap()
}

#[tokio::test]
async fn test_delivery_succeeds_on_first_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::PartialJson(json!({ "order_id": "ORDER-1" })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let dispatcher = http_dispatcher();
    let outcome = dispatcher.deliver(&job(&format!("{}/notify", server.url()))).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    assert_eq!(dispatcher.stats().delivered, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_internal_server_error_retried_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let dispatcher = http_dispatcher();
    let outcome = dispatcher.deliver(&job(&format!("{}/notify", server.url()))).await;

    assert!(matches!(outcome, DeliveryOutcome::Exhausted { attempts: 2, .. }));
    assert_eq!(dispatcher.stats().dropped, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_retried_twice() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .with_status(404)
        .expect(3)
        .create_async()
        .await;

    let outcome = http_dispatcher()
        .deliver(&job(&format!("{}/notify", server.url())))
        .await;

    assert!(matches!(outcome, DeliveryOutcome::Exhausted { attempts: 3, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_moved_permanently_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .with_status(301)
        .with_header("location", "/elsewhere")
        .expect(1)
        .create_async()
        .await;

    let dispatcher = http_dispatcher();
    let outcome = dispatcher.deliver(&job(&format!("{}/notify", server.url()))).await;

    assert_eq!(
        outcome,
        DeliveryOutcome::Rejected {
            status: 301,
            attempts: 1
        }
    );
    assert_eq!(dispatcher.stats().rejected, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_temporary_redirect_is_followed() {
    let mut server = mockito::Server::new_async().await;
    let old = server
        .mock("POST", "/old")
        .with_status(307)
        .with_header("location", "/new")
        .expect(1)
        .create_async()
        .await;
    let new = server
        .mock("POST", "/new")
        .match_body(mockito::Matcher::PartialJson(json!({ "order_id": "ORDER-1" })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let outcome = http_dispatcher()
        .deliver(&job(&format!("{}/old", server.url())))
        .await;

    assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    old.assert_async().await;
    new.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_target_exhausts_default_cap() {
    let dispatcher = http_dispatcher();
    let outcome = dispatcher.deliver(&job("http://127.0.0.1:1/notify")).await;

    assert!(matches!(outcome, DeliveryOutcome::Exhausted { attempts: 6, .. }));
    assert_eq!(dispatcher.stats().attempts, 6);
}

/// Replays a fixed list of statuses and records when each request arrived.
struct ScriptedTransport {
    statuses: Mutex<VecDeque<u16>>,
    sent_at: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    fn new(statuses: &[u16]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            sent_at: Mutex::new(Vec::new()),
        }
    }

    fn gaps(&self) -> Vec<Duration> {
        let sent_at = self.sent_at.lock().unwrap();
        sent_at.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post(&self, _url: &str, _body: &str) -> Result<TransportResponse, TransportError> {
        self.sent_at.lock().unwrap().push(Instant::now());
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        Ok(TransportResponse {
            status,
            location: None,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_service_unavailable_follows_backoff_table() {
    let transport = Arc::new(ScriptedTransport::new(&[503; 10]));
    let dispatcher = WebhookDispatcher::new(
        transport.clone(),
        RetryPolicy::default(),
        TaskSupervisor::new(),
    );

    let outcome = dispatcher.deliver(&job("http://merchant.test/notify")).await;

    assert!(matches!(outcome, DeliveryOutcome::Exhausted { attempts: 5, .. }));
    let minutes: Vec<u64> = transport.gaps().iter().map(|gap| gap.as_secs() / 60).collect();
    assert_eq!(minutes, vec![2, 10, 30, 90]);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failure() {
    let transport = Arc::new(ScriptedTransport::new(&[503, 502, 200]));
    let dispatcher = WebhookDispatcher::new(
        transport.clone(),
        RetryPolicy::default(),
        TaskSupervisor::new(),
    );

    let outcome = dispatcher.deliver(&job("http://merchant.test/notify")).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
    let minutes: Vec<u64> = transport.gaps().iter().map(|gap| gap.as_secs() / 60).collect();
    assert_eq!(minutes, vec![2, 10]);
}

#[tokio::test(start_paused = true)]
async fn test_enqueued_job_waits_for_initial_delay() {
    let transport = Arc::new(ScriptedTransport::new(&[]));
    let supervisor = TaskSupervisor::new();
    let dispatcher = WebhookDispatcher::new(transport.clone(), RetryPolicy::default(), supervisor.clone());

    let started = Instant::now();
    dispatcher.enqueue(job("http://merchant.test/notify"), Duration::from_secs(10));

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(transport.sent_at.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let sent_at = transport.sent_at.lock().unwrap().clone();
    assert_eq!(sent_at.len(), 1);
    assert_eq!((sent_at[0] - started).as_secs(), 10);
    assert_eq!(dispatcher.stats().delivered, 1);

    assert!(supervisor.shutdown(Duration::from_secs(1)).await);
}
