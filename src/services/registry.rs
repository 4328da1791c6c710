//! Payment instrument registry: issues, settles and resolves the virtual
//! account or e-money charge attached to each transaction.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{
    EMoneyEntry, InstrumentKind, PaymentInstrument, PaymentType, Transaction, VirtualAccountEntry,
};
use crate::ports::{EMoneyStore, RepositoryError, RepositoryResult, VirtualAccountStore};

#[derive(Clone)]
pub struct InstrumentRegistry {
    virtual_accounts: Arc<dyn VirtualAccountStore>,
    emoney: Arc<dyn EMoneyStore>,
}

impl InstrumentRegistry {
    pub fn new(virtual_accounts: Arc<dyn VirtualAccountStore>, emoney: Arc<dyn EMoneyStore>) -> Self {
        Self {
            virtual_accounts,
            emoney,
        }
    }

    /// Creates the instrument for a new charge. Virtual-account numbers are
    /// reused per customer key and rebound to the new order.
    pub async fn provision(
        &self,
        payment_type: PaymentType,
        customer_key: &str,
        order_id: &str,
        amount: i64,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<PaymentInstrument> {
        match payment_type.instrument_kind() {
            InstrumentKind::VirtualAccount => {
                let number = self.virtual_accounts.create_or_get_number(customer_key).await?;
                self.virtual_accounts
                    .create_charge(&number, order_id, amount, expires_at)
                    .await?;
                Ok(PaymentInstrument::VirtualAccount(VirtualAccountEntry {
                    virtual_account_number: number,
                    order_id: order_id.to_string(),
                    charged_amount: amount,
                    expires_at,
                }))
            }
            InstrumentKind::EMoney => {
                let emoney_id = self.emoney.create_charge(order_id, amount, expires_at).await?;
                Ok(PaymentInstrument::EMoney(EMoneyEntry {
                    emoney_id,
                    order_id: order_id.to_string(),
                    charged_amount: amount,
                    expires_at,
                }))
            }
        }
    }

    pub async fn for_transaction(&self, tx: &Transaction) -> RepositoryResult<PaymentInstrument> {
        match tx.payment_type.instrument_kind() {
            InstrumentKind::VirtualAccount => self
                .virtual_accounts
                .get_by_order_id(&tx.order_id)
                .await
                .map(PaymentInstrument::VirtualAccount),
            InstrumentKind::EMoney => self
                .emoney
                .get_by_order_id(&tx.order_id)
                .await
                .map(PaymentInstrument::EMoney),
        }
    }

    /// Deducts the charge of `tx`: clears the number's binding or retires
    /// the e-money id. A virtual-account number already rebound to another
    /// order is left alone.
    pub async fn deduct(&self, tx: &Transaction, instrument: &PaymentInstrument) -> RepositoryResult<()> {
        match instrument {
            PaymentInstrument::VirtualAccount(entry) => {
                let number = &entry.virtual_account_number;
                match self.virtual_accounts.get_by_number(number).await {
                    Ok(bound) if bound.order_id == tx.order_id => {
                        self.virtual_accounts.deduct_charge(number).await
                    }
                    Ok(_) | Err(RepositoryError::NotFound(_)) => Ok(()),
                    Err(err) => Err(err),
                }
            }
            PaymentInstrument::EMoney(entry) => self.emoney.deduct_charge(&entry.emoney_id).await,
        }
    }

    /// Resolves a virtual-account number (through its active binding) or an
    /// e-money id.
    pub async fn resolve(&self, identifier: &str, now: DateTime<Utc>) -> RepositoryResult<PaymentInstrument> {
        match self.virtual_accounts.get_by_number(identifier).await {
            Ok(entry) if entry.expires_at < now => {
                return Err(RepositoryError::Expired(identifier.to_string()))
            }
            Ok(entry) => return Ok(PaymentInstrument::VirtualAccount(entry)),
            Err(RepositoryError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        self.emoney
            .get_by_id(identifier)
            .await
            .map(PaymentInstrument::EMoney)
    }
}
