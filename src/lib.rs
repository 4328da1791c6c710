pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod schemas;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Instant;

use crate::services::TransactionService;

#[derive(Clone)]
pub struct AppState {
    pub service: TransactionService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: TransactionService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let external = Router::new()
        .route("/charge", post(handlers::transactions::charge))
        .route("/:order_id/status", get(handlers::transactions::status))
        .route("/:order_id/cancel", post(handlers::transactions::cancel))
        .route("/:order_id/expire", post(handlers::transactions::expire))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::server_key_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/internal/mark-as-paid", post(handlers::internal::mark_as_paid))
        .route(
            "/internal/transaction-detail",
            get(handlers::internal::transaction_detail),
        )
        .merge(external)
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
