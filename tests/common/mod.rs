#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mock_payment_gateway::adapters::Stores;
use mock_payment_gateway::domain::ChargeRequest;
use mock_payment_gateway::schemas::ChargeTransactionRequest;
use mock_payment_gateway::services::{
    LifecycleConfig, RetryPolicy, TransportError, TransportResponse, WebhookTransport,
};
use mock_payment_gateway::startup::Engine;

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const WEBHOOK_URL: &str = "http://merchant.test/notify";

/// Accepts every webhook and keeps the bodies for inspection.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Polls until a notification with `status` arrives for `order_id`.
    pub async fn wait_for(&self, order_id: &str, status: &str) -> Value {
        for _ in 0..200 {
            let found = self.sent().into_iter().map(|(_, body)| body).find(|body| {
                body["order_id"] == order_id && body["transaction_status"] == status
            });
            if let Some(body) = found {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {} notification for {}", status, order_id);
    }

    pub fn count_for(&self, order_id: &str, status: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(_, body)| body["order_id"] == order_id && body["transaction_status"] == status)
            .count()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post(&self, url: &str, body: &str) -> Result<TransportResponse, TransportError> {
        let value: Value = serde_json::from_str(body).map_err(|e| TransportError::Other(e.to_string()))?;
        self.sent.lock().unwrap().push((url.to_string(), value));
        Ok(TransportResponse {
            status: 200,
            location: None,
        })
    }
}

pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        delays: vec![Duration::from_millis(1); 5],
        max_redirects: 5,
    }
}

pub fn test_lifecycle_config() -> LifecycleConfig {
    LifecycleConfig {
        server_key: SERVER_KEY.to_string(),
        webhook_target_url: Some(WEBHOOK_URL.to_string()),
        pending_webhook_delay: Duration::ZERO,
        ..LifecycleConfig::default()
    }
}

pub fn test_engine(config: LifecycleConfig) -> (Engine, Arc<RecordingTransport>) {
    test_engine_with_stores(Stores::in_memory(), config)
}

pub fn test_engine_with_stores(
    stores: Stores,
    config: LifecycleConfig,
) -> (Engine, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let engine = Engine::new(stores, transport.clone(), fast_retry_policy(), config);
    (engine, transport)
}

/// A well-formed charge body: two items of 25 000 for a total of 50 000.
pub fn charge_body(order_id: &str, payment_type: &str, email: &str) -> Value {
    json!({
        "payment_type": payment_type,
        "transaction_details": {
            "order_id": order_id,
            "gross_amount": 50000,
            "currency": "IDR"
        },
        "customer_details": {
            "first_name": "Budi",
            "last_name": "Santoso",
            "email": email,
            "phone_number": "+6281234567",
            "billing_address": {
                "first_name": "Budi",
                "last_name": "Santoso",
                "email": email,
                "phone": "+6281234567",
                "address": "Jl. Merdeka 1",
                "postal_code": "10110",
                "country_code": "62"
            }
        },
        "seller": {
            "first_name": "Toko",
            "last_name": "Maju",
            "email": "toko@example.com",
            "phone_number": "+6287654321",
            "address": "Jl. Sudirman 2"
        },
        "item_details": [
            { "id": "SKU-1", "price": 25000, "quantity": 2, "name": "Kopi", "category": "beverage" }
        ]
    })
}

pub fn charge_request(body: Value) -> ChargeRequest {
    serde_json::from_value::<ChargeTransactionRequest>(body)
        .unwrap()
        .into_domain()
}
