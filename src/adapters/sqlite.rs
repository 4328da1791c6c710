//! SQLite implementations of the persistence ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::instrument::generate_virtual_account_number;
use crate::domain::{EMoneyEntry, Transaction, TransactionStatus, VirtualAccountEntry};
use crate::ports::{
    EMoneyStore, NewTransaction, RepositoryError, RepositoryResult, TransactionStore,
    VirtualAccountStore,
};

const MAX_NUMBER_ATTEMPTS: usize = 16;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        order_id     TEXT PRIMARY KEY NOT NULL,
        amount       INTEGER NOT NULL,
        payment_type TEXT NOT NULL,
        status       TEXT NOT NULL,
        created_at   TEXT NOT NULL,
        expires_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS virtual_accounts (
        number          TEXT PRIMARY KEY NOT NULL,
        customer_key    TEXT NOT NULL UNIQUE,
        active_order_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS virtual_account_entries (
        order_id       TEXT PRIMARY KEY NOT NULL,
        number         TEXT NOT NULL REFERENCES virtual_accounts(number),
        charged_amount INTEGER NOT NULL,
        expires_at     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS emoney_entries (
        emoney_id      TEXT PRIMARY KEY NOT NULL,
        order_id       TEXT NOT NULL UNIQUE,
        charged_amount INTEGER NOT NULL,
        expires_at     TEXT NOT NULL,
        retired        BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
];

/// Opens a pool for `database_url`. In-memory databases live as long as their
/// single connection, so that connection is never recycled.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
    }
}

/// Creates the gateway tables if they do not exist yet.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn create(&self, params: NewTransaction) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (order_id, amount, payment_type, status, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&params.order_id)
        .bind(params.amount)
        .bind(params.payment_type.as_str())
        .bind(params.status.as_str())
        .bind(params.created_at)
        .bind(params.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepositoryError::Duplicate(params.order_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT order_id, amount, payment_type, status, created_at, expires_at FROM transactions WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))?
            .into_domain()
    }

    async fn update_status(&self, order_id: &str, status: TransactionStatus) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE transactions SET status = ?1 WHERE order_id = ?2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(order_id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    order_id: String,
    amount: i64,
    payment_type: String,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let payment_type = self
            .payment_type
            .parse()
            .map_err(|e: crate::domain::UnknownVariant| RepositoryError::Corrupt(e.to_string()))?;
        let status = self
            .status
            .parse()
            .map_err(|e: crate::domain::UnknownVariant| RepositoryError::Corrupt(e.to_string()))?;

        Ok(Transaction {
            order_id: self.order_id,
            amount: self.amount,
            payment_type,
            status,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct SqliteVirtualAccountStore {
    pool: SqlitePool,
}

impl SqliteVirtualAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn number_for_customer(&self, customer_key: &str) -> RepositoryResult<Option<String>> {
        let number = sqlx::query_scalar::<_, String>(
            "SELECT number FROM virtual_accounts WHERE customer_key = ?1",
        )
        .bind(customer_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(number)
    }
}

#[async_trait]
impl VirtualAccountStore for SqliteVirtualAccountStore {
    async fn create_or_get_number(&self, customer_key: &str) -> RepositoryResult<String> {
        if customer_key.is_empty() {
            return Err(RepositoryError::InvalidArgument("customer key is empty".to_string()));
        }
        if let Some(number) = self.number_for_customer(customer_key).await? {
            return Ok(number);
        }

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = generate_virtual_account_number(Utc::now(), &mut rand::thread_rng());
            let result = sqlx::query(
                "INSERT INTO virtual_accounts (number, customer_key, active_order_id) VALUES (?1, ?2, NULL)",
            )
            .bind(&candidate)
            .bind(customer_key)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => return Ok(candidate),
                Err(err) if is_unique_violation(&err) => {
                    // Either the number collided or a concurrent call registered this customer.
                    if let Some(number) = self.number_for_customer(customer_key).await? {
                        return Ok(number);
                    }
                }
                Err(err) => return Err(err.into()),
            }
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

        let mut tx = self.pool.begin().await?;

        let bound = sqlx::query("UPDATE virtual_accounts SET active_order_id = ?1 WHERE number = ?2")
            .bind(order_id)
            .bind(number)
            .execute(&mut *tx)
            .await?;
        if bound.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(number.to_string()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO virtual_account_entries (order_id, number, charged_amount, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(order_id)
        .bind(number)
        .bind(amount)
        .bind(expires_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepositoryError::Duplicate(order_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<VirtualAccountEntry> {
        let row = sqlx::query_as::<_, VirtualAccountRow>(
            "SELECT order_id, number, charged_amount, expires_at FROM virtual_account_entries WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VirtualAccountRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))
    }

    async fn get_by_number(&self, number: &str) -> RepositoryResult<VirtualAccountEntry> {
        let row = sqlx::query_as::<_, VirtualAccountRow>(
            r#"
            SELECT e.order_id, e.number, e.charged_amount, e.expires_at
            FROM virtual_accounts va
            JOIN virtual_account_entries e ON e.order_id = va.active_order_id
            WHERE va.number = ?1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VirtualAccountRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(number.to_string()))
    }

    async fn deduct_charge(&self, number: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE virtual_accounts SET active_order_id = NULL WHERE number = ?1")
            .bind(number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(number.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VirtualAccountRow {
    order_id: String,
    number: String,
    charged_amount: i64,
    expires_at: DateTime<Utc>,
}

impl VirtualAccountRow {
    fn into_domain(self) -> VirtualAccountEntry {
        VirtualAccountEntry {
            virtual_account_number: self.number,
            order_id: self.order_id,
            charged_amount: self.charged_amount,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct SqliteEMoneyStore {
    pool: SqlitePool,
}

impl SqliteEMoneyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EMoneyStore for SqliteEMoneyStore {
    async fn create_charge(
        &self,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<String> {
        if order_id.is_empty() {
            return Err(RepositoryError::InvalidArgument("order id is empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO emoney_entries (emoney_id, order_id, charged_amount, expires_at, retired)
            VALUES (?1, ?2, ?3, ?4, FALSE)
            "#,
        )
        .bind(&id)
        .bind(order_id)
        .bind(amount)
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(err) if is_unique_violation(&err) => Err(RepositoryError::Duplicate(order_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<EMoneyEntry> {
        let row = sqlx::query_as::<_, EMoneyRow>(
            "SELECT emoney_id, order_id, charged_amount, expires_at, retired FROM emoney_entries WHERE emoney_id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if row.retired || row.expires_at < Utc::now() {
            return Err(RepositoryError::Expired(id.to_string()));
        }
        Ok(row.into_domain())
    }

    async fn get_by_order_id(&self, order_id: &str) -> RepositoryResult<EMoneyEntry> {
        let row = sqlx::query_as::<_, EMoneyRow>(
            "SELECT emoney_id, order_id, charged_amount, expires_at, retired FROM emoney_entries WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EMoneyRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))
    }

    async fn deduct_charge(&self, id: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE emoney_entries SET retired = TRUE WHERE emoney_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EMoneyRow {
    emoney_id: String,
    order_id: String,
    charged_amount: i64,
    expires_at: DateTime<Utc>,
    retired: bool,
}

impl EMoneyRow {
    fn into_domain(self) -> EMoneyEntry {
        EMoneyEntry {
            emoney_id: self.emoney_id,
            order_id: self.order_id,
            charged_amount: self.charged_amount,
            expires_at: self.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentType;
    use chrono::Duration;

    async fn setup_pool() -> SqlitePool {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    fn new_tx(order_id: &str, payment_type: PaymentType) -> NewTransaction {
        let now = Utc::now();
        NewTransaction {
            order_id: order_id.to_string(),
            amount: 50_000,
            payment_type,
            status: TransactionStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = setup_pool().await;
        migrate(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("gateway.db").display());

        let pool = connect(&url).await.unwrap();
        migrate(&pool).await.unwrap();
        SqliteTransactionStore::new(pool.clone())
            .create(new_tx("O-PERSIST", PaymentType::EMoneyGopay))
            .await
            .unwrap();
        pool.close().await;

        let pool = connect(&url).await.unwrap();
        migrate(&pool).await.unwrap();
        let tx = SqliteTransactionStore::new(pool)
            .get_by_order_id("O-PERSIST")
            .await
            .unwrap();
        assert_eq!(tx.payment_type, PaymentType::EMoneyGopay);
    }

    #[tokio::test]
    async fn test_transaction_round_trip_and_duplicate() {
        let store = SqliteTransactionStore::new(setup_pool().await);
        store
            .create(new_tx("O1", PaymentType::VirtualAccountBni))
            .await
            .unwrap();

        let tx = store.get_by_order_id("O1").await.unwrap();
        assert_eq!(tx.amount, 50_000);
        assert_eq!(tx.payment_type, PaymentType::VirtualAccountBni);
        assert_eq!(tx.status, TransactionStatus::Pending);

        let err = store
            .create(new_tx("O1", PaymentType::EMoneyQris))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
        assert_eq!(
            store.get_by_order_id("O1").await.unwrap().payment_type,
            PaymentType::VirtualAccountBni
        );
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let store = SqliteTransactionStore::new(setup_pool().await);
        let err = store
            .update_status("missing", TransactionStatus::Canceled)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));

        assert!(matches!(
            store.get_by_order_id("missing").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_virtual_account_reuse_and_binding() {
        let store = SqliteVirtualAccountStore::new(setup_pool().await);
        let number = store.create_or_get_number("alice@example.com").await.unwrap();
        assert_eq!(
            store.create_or_get_number("alice@example.com").await.unwrap(),
            number
        );
        assert_ne!(
            store.create_or_get_number("bob@example.com").await.unwrap(),
            number
        );

        let expires_at = Utc::now() + Duration::hours(24);
        store.create_charge(&number, "O1", 10_000, expires_at).await.unwrap();
        store.create_charge(&number, "O2", 20_000, expires_at).await.unwrap();

        let bound = store.get_by_number(&number).await.unwrap();
        assert_eq!(bound.order_id, "O2");
        assert_eq!(bound.charged_amount, 20_000);
        assert_eq!(store.get_by_order_id("O1").await.unwrap().charged_amount, 10_000);

        store.deduct_charge(&number).await.unwrap();
        assert!(matches!(
            store.get_by_number(&number).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_virtual_account_charge_on_unknown_number() {
        let store = SqliteVirtualAccountStore::new(setup_pool().await);
        let err = store
            .create_charge("000000000000000", "O1", 1, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_emoney_retire_and_expiry() {
        let store = SqliteEMoneyStore::new(setup_pool().await);
        let live = store
            .create_charge("O1", 5_000, Utc::now() + Duration::hours(3))
            .await
            .unwrap();
        let lapsed = store
            .create_charge("O2", 5_000, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(store.get_by_id(&live).await.unwrap().order_id, "O1");
        assert!(matches!(
            store.get_by_id(&lapsed).await,
            Err(RepositoryError::Expired(_))
        ));

        store.deduct_charge(&live).await.unwrap();
        assert!(matches!(
            store.get_by_id(&live).await,
            Err(RepositoryError::Expired(_))
        ));
        assert_eq!(store.get_by_order_id("O1").await.unwrap().emoney_id, live);

        let err = store
            .create_charge("O1", 5_000, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }
}
