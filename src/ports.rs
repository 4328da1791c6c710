//! Persistence ports consumed by the lifecycle engine.
//!
//! The engine only talks to these traits; `adapters` provides an in-memory
//! and a SQLite implementation of each.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{EMoneyEntry, PaymentType, Transaction, TransactionStatus, VirtualAccountEntry};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record expired: {0}")]
    Expired(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: String,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_transaction(self) -> Transaction {
        Transaction {
            order_id: self.order_id,
            amount: self.amount,
            payment_type: self.payment_type,
            status: self.status,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails with `Duplicate` when the order id is already taken.
    async fn create(&self, params: NewTransaction) -> RepositoryResult<()>;
    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<Transaction>;
    async fn update_status(&self, order_id: &str, status: TransactionStatus) -> RepositoryResult<()>;
}

#[async_trait]
pub trait VirtualAccountStore: Send + Sync {
    /// Returns the number already assigned to `customer_key`, allocating a
    /// fresh one on first use. Two keys never share a number.
    async fn create_or_get_number(&self, customer_key: &str) -> RepositoryResult<String>;

    /// Books a charge against `number` and binds the number to `order_id`.
    async fn create_charge(
        &self,
        number: &str,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<VirtualAccountEntry>;

    /// Resolves the charge the number is currently bound to.
    async fn get_by_number(&self, number: &str) -> RepositoryResult<VirtualAccountEntry>;

    /// Clears the number's active-order binding so it can be charged again.
    async fn deduct_charge(&self, number: &str) -> RepositoryResult<()>;
}

#[async_trait]
pub trait EMoneyStore: Send + Sync {
    /// Mints a new e-money id for the charge and returns it.
    async fn create_charge(
        &self,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<String>;

    /// Fails with `Expired` once the charge has been retired or has lapsed.
    async fn get_by_id(&self, id: &str) -> RepositoryResult<EMoneyEntry>;

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<EMoneyEntry>;

    /// Retires the charge id.
    async fn deduct_charge(&self, id: &str) -> RepositoryResult<()>;
}
