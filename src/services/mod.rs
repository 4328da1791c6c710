pub mod expiry;
pub mod lifecycle;
pub mod notification;
pub mod order_locks;
pub mod registry;
pub mod signature;
pub mod tasks;
pub mod webhook;

pub use expiry::ExpiryScheduler;
pub use lifecycle::{LifecycleConfig, LifecycleResult, TransactionService};
pub use registry::InstrumentRegistry;
pub use signature::sign;
pub use tasks::TaskSupervisor;
pub use webhook::{
    DeliveryOutcome, DeliveryStatsSnapshot, EventKind, HttpTransport, ResponseClass, RetryPolicy,
    TransportError, TransportResponse, WebhookDispatcher, WebhookJob, WebhookTransport,
};
