//! In-memory implementations of the persistence ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::instrument::generate_virtual_account_number;
use crate::domain::{EMoneyEntry, Transaction, TransactionStatus, VirtualAccountEntry};
use crate::ports::{
    EMoneyStore, NewTransaction, RepositoryError, RepositoryResult, TransactionStore,
    VirtualAccountStore,
};

const MAX_NUMBER_ATTEMPTS: usize = 16;

/// A thread-safe in-memory transaction log keyed by order id.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, params: NewTransaction) -> RepositoryResult<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&params.order_id) {
            return Err(RepositoryError::Duplicate(params.order_id));
        }
        transactions.insert(params.order_id.clone(), params.into_transaction());
        Ok(())
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(order_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))
    }

    async fn update_status(&self, order_id: &str, status: TransactionStatus) -> RepositoryResult<()> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(order_id)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))?;
        tx.status = status;
        Ok(())
    }
}

#[derive(Default)]
struct VirtualAccountState {
    /// customer key -> number
    numbers_by_customer: HashMap<String, String>,
    /// number -> currently bound order id
    bindings: HashMap<String, Option<String>>,
    /// order id -> charge
    entries: HashMap<String, VirtualAccountEntry>,
}

/// Virtual-account table, binding table and charge entries behind one lock so
/// allocation and binding stay consistent.
#[derive(Default, Clone)]
pub struct InMemoryVirtualAccountStore {
    state: Arc<RwLock<VirtualAccountState>>,
}

impl InMemoryVirtualAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VirtualAccountStore for InMemoryVirtualAccountStore {
    async fn create_or_get_number(&self, customer_key: &str) -> RepositoryResult<String> {
        if customer_key.is_empty() {
            return Err(RepositoryError::InvalidArgument("customer key is empty".to_string()));
        }

        let mut state = self.state.write().await;
        if let Some(number) = state.numbers_by_customer.get(customer_key) {
            return Ok(number.clone());
        }

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = generate_virtual_account_number(Utc::now(), &mut rng);
            if state.bindings.contains_key(&candidate) {
                continue;
            }
            state.bindings.insert(candidate.clone(), None);
            state
                .numbers_by_customer
                .insert(customer_key.to_string(), candidate.clone());
            return Ok(candidate);
        }

        Err(RepositoryError::Duplicate(format!(
            "no free virtual account number for {}",
            customer_key
        )))
    }

    async fn create_charge(
        &self,
        number: &str,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        if order_id.is_empty() {
            return Err(RepositoryError::InvalidArgument("order id is empty".to_string()));
        }

        let mut state = self.state.write().await;
        if !state.bindings.contains_key(number) {
            return Err(RepositoryError::NotFound(number.to_string()));
        }
        if state.entries.contains_key(order_id) {
            return Err(RepositoryError::Duplicate(order_id.to_string()));
        }

        state.entries.insert(
            order_id.to_string(),
            VirtualAccountEntry {
                virtual_account_number: number.to_string(),
                order_id: order_id.to_string(),
                charged_amount: amount,
                expires_at,
            },
        );
        state
            .bindings
            .insert(number.to_string(), Some(order_id.to_string()));
        Ok(())
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<VirtualAccountEntry> {
        let state = self.state.read().await;
        state
            .entries
            .get(order_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))
    }

    async fn get_by_number(&self, number: &str) -> RepositoryResult<VirtualAccountEntry> {
        let state = self.state.read().await;
        let order_id = state
            .bindings
            .get(number)
            .and_then(|binding| binding.as_ref())
            .ok_or_else(|| RepositoryError::NotFound(number.to_string()))?;
        state
            .entries
            .get(order_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(order_id.clone()))
    }

    async fn deduct_charge(&self, number: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let binding = state
            .bindings
            .get_mut(number)
            .ok_or_else(|| RepositoryError::NotFound(number.to_string()))?;
        *binding = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct EMoneyRecord {
    entry: EMoneyEntry,
    retired: bool,
}

#[derive(Default)]
struct EMoneyState {
    by_id: HashMap<String, EMoneyRecord>,
    id_by_order: HashMap<String, String>,
}

#[derive(Default, Clone)]
pub struct InMemoryEMoneyStore {
    state: Arc<RwLock<EMoneyState>>,
}

impl InMemoryEMoneyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EMoneyStore for InMemoryEMoneyStore {
    async fn create_charge(
        &self,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<String> {
        if order_id.is_empty() {
            return Err(RepositoryError::InvalidArgument("order id is empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state.id_by_order.contains_key(order_id) {
            return Err(RepositoryError::Duplicate(order_id.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        state.by_id.insert(
            id.clone(),
            EMoneyRecord {
                entry: EMoneyEntry {
                    emoney_id: id.clone(),
                    order_id: order_id.to_string(),
                    charged_amount: amount,
                    expires_at,
                },
                retired: false,
            },
        );
        state.id_by_order.insert(order_id.to_string(), id.clone());
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<EMoneyEntry> {
        let state = self.state.read().await;
        let record = state
            .by_id
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if record.retired || record.entry.expires_at < Utc::now() {
            return Err(RepositoryError::Expired(id.to_string()));
        }
        Ok(record.entry.clone())
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<EMoneyEntry> {
        let state = self.state.read().await;
        state
            .id_by_order
            .get(order_id)
            .and_then(|id| state.by_id.get(id))
            .map(|record| record.entry.clone())
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))
    }

    async fn deduct_charge(&self, id: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .by_id
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        record.retired = true;
        Ok(())
    }
}
