//! Transaction lifecycle: charge, settle, cancel and expire.
//!
//! Every status transition runs under the order's lock and re-reads the
//! transaction first, so concurrent callers on one order see exactly one
//! winner and `CannotModifyStatus` for everyone else.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::expiry::ExpiryScheduler;
use super::notification::build_notification;
use super::order_locks::OrderLocks;
use super::registry::InstrumentRegistry;
use super::webhook::{DeliveryStatsSnapshot, EventKind, WebhookDispatcher, WebhookJob};
use crate::adapters::Stores;
use crate::domain::{
    ChargeRequest, ChargeResult, EMoneyAction, InstrumentAction, InstrumentKind, PaymentDetail,
    PaymentInstrument, PaymentType, Transaction, TransactionStatus, TransactionSummary,
};
use crate::error::LifecycleError;
use crate::ports::{NewTransaction, RepositoryError, TransactionStore};
use crate::validation::validate_charge_request;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub server_key: String,
    /// `None` disables webhook delivery.
    pub webhook_target_url: Option<String>,
    pub virtual_account_window: chrono::Duration,
    pub emoney_window: chrono::Duration,
    pub pending_webhook_delay: Duration,
}

impl LifecycleConfig {
    pub fn expiry_window(&self, kind: InstrumentKind) -> chrono::Duration {
        match kind {
            InstrumentKind::VirtualAccount => self.virtual_account_window,
            InstrumentKind::EMoney => self.emoney_window,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            webhook_target_url: None,
            virtual_account_window: chrono::Duration::hours(24),
            emoney_window: chrono::Duration::hours(3),
            pending_webhook_delay: Duration::from_secs(10),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Clone)]
pub struct TransactionService {
    inner: Arc<Inner>,
}

struct Inner {
    transactions: Arc<dyn TransactionStore>,
    registry: InstrumentRegistry,
    dispatcher: WebhookDispatcher,
    scheduler: ExpiryScheduler,
    locks: OrderLocks,
    config: LifecycleConfig,
}

impl TransactionService {
    pub fn new(
        stores: Stores,
        dispatcher: WebhookDispatcher,
        scheduler: ExpiryScheduler,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transactions: stores.transactions,
                registry: InstrumentRegistry::new(stores.virtual_accounts, stores.emoney),
                dispatcher,
                scheduler,
                locks: OrderLocks::default(),
                config,
            }),
        }
    }

    pub fn server_key(&self) -> &str {
        &self.inner.config.server_key
    }

    pub fn delivery_stats(&self) -> DeliveryStatsSnapshot {
        self.inner.dispatcher.stats()
    }

    pub fn armed_timers(&self) -> usize {
        self.inner.scheduler.armed()
    }

    pub async fn charge(&self, request: ChargeRequest) -> LifecycleResult<ChargeResult> {
        validate_charge_request(&request).map_err(LifecycleError::ValidationFailed)?;
        let payment_type = request
            .payment_type
            .ok_or(LifecycleError::UnsupportedPaymentType)?;
        if request.items_total() != Some(request.amount) {
            return Err(LifecycleError::AmountMismatch);
        }

        let order_id = request.order_id.clone();
        let _guard = self.inner.locks.lock(&order_id).await;

        let now = Utc::now();
        let expires_at = now + self.inner.config.expiry_window(payment_type.instrument_kind());

        self.inner
            .transactions
            .create(NewTransaction {
                order_id: order_id.clone(),
                amount: request.amount,
                payment_type,
                status: TransactionStatus::Pending,
                created_at: now,
                expires_at,
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Duplicate(_) => LifecycleError::DuplicateOrderId,
                other => LifecycleError::Storage {
                    context: "creating transaction",
                    source: other,
                },
            })?;

        let instrument = match self
            .inner
            .registry
            .provision(
                payment_type,
                request.customer_key(),
                &order_id,
                request.amount,
                expires_at,
            )
            .await
        {
            Ok(instrument) => instrument,
            Err(err) => {
                error!(order_id = %order_id, error = %err, "provisioning payment instrument failed");
                if let Err(deny_err) = self
                    .inner
                    .transactions
                    .update_status(&order_id, TransactionStatus::Denied)
                    .await
                {
                    error!(order_id = %order_id, error = %deny_err, "marking transaction denied failed");
                }
                return Err(LifecycleError::provisioning("provisioning payment instrument")(err));
            }
        };

        let tx = Transaction {
            order_id: order_id.clone(),
            amount: request.amount,
            payment_type,
            status: TransactionStatus::Pending,
            created_at: now,
            expires_at,
        };

        let service = self.clone();
        let timer_order_id = order_id.clone();
        self.inner.scheduler.schedule(&order_id, expires_at, async move {
            service.expire_on_schedule(&timer_order_id).await;
        });

        self.notify(
            EventKind::Pending,
            &tx,
            payment_type,
            &instrument,
            now,
            self.inner.config.pending_webhook_delay,
        );

        info!(
            order_id = %order_id,
            payment_type = %payment_type,
            amount = request.amount,
            "charge created"
        );

        let action = match &instrument {
            PaymentInstrument::VirtualAccount(entry) => InstrumentAction::VirtualAccount {
                bank: payment_type.bank().unwrap_or_default(),
                virtual_account_number: entry.virtual_account_number.clone(),
            },
            PaymentInstrument::EMoney(entry) => InstrumentAction::EMoney {
                emoney_id: entry.emoney_id.clone(),
                actions: EMoneyAction::for_charge(&entry.emoney_id),
            },
        };

        Ok(ChargeResult {
            order_id,
            amount: request.amount,
            payment_type,
            status: TransactionStatus::Pending,
            transaction_time: now,
            expires_at,
            action,
        })
    }

    /// Settles a pending transaction, then deducts its instrument.
    /// `payment_method` only shapes the settlement notification and defaults
    /// to the transaction's own type.
    pub async fn mark_as_paid(
        &self,
        order_id: &str,
        payment_method: Option<PaymentType>,
    ) -> LifecycleResult<()> {
        let _guard = self.inner.locks.lock(order_id).await;
        let now = Utc::now();

        let mut tx = self.load(order_id).await?;
        if tx.is_expired_at(now) || tx.status != TransactionStatus::Pending {
            return Err(LifecycleError::CannotModifyStatus);
        }

        let instrument = self
            .inner
            .registry
            .for_transaction(&tx)
            .await
            .map_err(LifecycleError::storage("reading payment instrument"))?;

        self.transition(&mut tx, TransactionStatus::Settled).await?;
        if let Err(err) = self.inner.registry.deduct(&tx, &instrument).await {
            error!(order_id, error = %err, "deducting payment instrument failed");
        }

        let payment_type = payment_method.unwrap_or(tx.payment_type);
        self.notify(EventKind::Settlement, &tx, payment_type, &instrument, now, Duration::ZERO);

        info!(order_id, payment_type = %payment_type, "transaction settled");
        Ok(())
    }

    pub async fn cancel(&self, order_id: &str) -> LifecycleResult<TransactionSummary> {
        let _guard = self.inner.locks.lock(order_id).await;

        let mut tx = self.load(order_id).await?;
        if tx.status.is_terminal() {
            return Err(LifecycleError::CannotModifyStatus);
        }

        self.transition(&mut tx, TransactionStatus::Canceled).await?;
        self.release_instrument(&tx).await;

        info!(order_id, "transaction canceled");
        Ok(TransactionSummary::from(&tx))
    }

    pub async fn get_status(&self, order_id: &str) -> LifecycleResult<TransactionSummary> {
        let tx = self.load(order_id).await?;
        Ok(TransactionSummary::from(&tx))
    }

    /// Expires a pending transaction and emits the "expired" notification.
    pub async fn expire(&self, order_id: &str) -> LifecycleResult<TransactionSummary> {
        let _guard = self.inner.locks.lock(order_id).await;

        let mut tx = self.load(order_id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(LifecycleError::CannotModifyStatus);
        }

        self.transition(&mut tx, TransactionStatus::Expired).await?;

        let instrument = self.release_instrument(&tx).await;
        match instrument {
            Some(instrument) => self.notify(
                EventKind::Expired,
                &tx,
                tx.payment_type,
                &instrument,
                Utc::now(),
                Duration::ZERO,
            ),
            None => warn!(order_id, "expired notification skipped, instrument unavailable"),
        }

        info!(order_id, "transaction expired");
        Ok(TransactionSummary::from(&tx))
    }

    /// Timer entry point: a transaction that already left Pending is not an
    /// error here.
    pub async fn expire_on_schedule(&self, order_id: &str) {
        match self.expire(order_id).await {
            Ok(_) => {}
            Err(LifecycleError::CannotModifyStatus) => {
                debug!(order_id, "expiry timer lapsed, transaction no longer pending");
            }
            Err(err) => error!(order_id, error = %err, "scheduled expiry failed"),
        }
    }

    /// Looks up a charge by virtual-account number or e-money id.
    pub async fn payment_detail(&self, identifier: &str) -> LifecycleResult<PaymentDetail> {
        let instrument = self
            .inner
            .registry
            .resolve(identifier, Utc::now())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound(_) | RepositoryError::Expired(_) => {
                    LifecycleError::TransactionNotFound
                }
                other => LifecycleError::Storage {
                    context: "resolving payment instrument",
                    source: other,
                },
            })?;

        let tx = self.load(instrument.order_id()).await?;
        let (virtual_account_number, emoney_id) = match &instrument {
            PaymentInstrument::VirtualAccount(entry) => {
                (Some(entry.virtual_account_number.clone()), None)
            }
            PaymentInstrument::EMoney(entry) => (None, Some(entry.emoney_id.clone())),
        };

        Ok(PaymentDetail {
            order_id: tx.order_id,
            charged_amount: instrument.charged_amount(),
            status: tx.status,
            payment_type: tx.payment_type,
            virtual_account_number,
            emoney_id,
        })
    }

    async fn load(&self, order_id: &str) -> LifecycleResult<Transaction> {
        self.inner
            .transactions
            .get_by_order_id(order_id)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound(_) => LifecycleError::TransactionNotFound,
                other => LifecycleError::Storage {
                    context: "reading transaction",
                    source: other,
                },
            })
    }

    async fn transition(&self, tx: &mut Transaction, status: TransactionStatus) -> LifecycleResult<()> {
        self.inner
            .transactions
            .update_status(&tx.order_id, status)
            .await
            .map_err(LifecycleError::storage("updating transaction status"))?;
        tx.status = status;
        Ok(())
    }

    /// Frees the instrument after a cancel or expiry. Failures are logged; the
    /// status change already happened.
    async fn release_instrument(&self, tx: &Transaction) -> Option<PaymentInstrument> {
        let instrument = match self.inner.registry.for_transaction(tx).await {
            Ok(instrument) => instrument,
            Err(err) => {
                warn!(order_id = %tx.order_id, error = %err, "payment instrument lookup failed");
                return None;
            }
        };
        if let Err(err) = self.inner.registry.deduct(tx, &instrument).await {
            warn!(order_id = %tx.order_id, error = %err, "releasing payment instrument failed");
        }
        Some(instrument)
    }

    fn notify(
        &self,
        event: EventKind,
        tx: &Transaction,
        payment_type: PaymentType,
        instrument: &PaymentInstrument,
        now: DateTime<Utc>,
        delay: Duration,
    ) {
        let Some(target_url) = self.inner.config.webhook_target_url.as_deref() else {
            debug!(order_id = %tx.order_id, event = event.as_str(), "no webhook target configured");
            return;
        };

        let virtual_account_number = match instrument {
            PaymentInstrument::VirtualAccount(entry) => Some(entry.virtual_account_number.as_str()),
            PaymentInstrument::EMoney(_) => None,
        };
        let payload = build_notification(
            event,
            tx,
            payment_type,
            virtual_account_number,
            &self.inner.config.server_key,
            now,
        );

        match WebhookJob::new(event, &tx.order_id, target_url, &payload) {
            Ok(job) => self.inner.dispatcher.enqueue(job, delay),
            Err(err) => error!(order_id = %tx.order_id, error = %err, "encoding notification failed"),
        }
    }
}
