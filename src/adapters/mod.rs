//! Adapters implementing the persistence ports.

pub mod memory;
pub mod sqlite;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::ports::{EMoneyStore, TransactionStore, VirtualAccountStore};

pub use memory::{InMemoryEMoneyStore, InMemoryTransactionStore, InMemoryVirtualAccountStore};
pub use sqlite::{SqliteEMoneyStore, SqliteTransactionStore, SqliteVirtualAccountStore};

/// The three stores the lifecycle engine needs, behind their ports.
#[derive(Clone)]
pub struct Stores {
    pub transactions: Arc<dyn TransactionStore>,
    pub virtual_accounts: Arc<dyn VirtualAccountStore>,
    pub emoney: Arc<dyn EMoneyStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            transactions: Arc::new(InMemoryTransactionStore::new()),
            virtual_accounts: Arc::new(InMemoryVirtualAccountStore::new()),
            emoney: Arc::new(InMemoryEMoneyStore::new()),
        }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            transactions: Arc::new(SqliteTransactionStore::new(pool.clone())),
            virtual_accounts: Arc::new(SqliteVirtualAccountStore::new(pool.clone())),
            emoney: Arc::new(SqliteEMoneyStore::new(pool)),
        }
    }
}
