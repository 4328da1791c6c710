//! Charge requests and the results the lifecycle operations hand back.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::transaction::{Currency, PaymentType, Transaction, TransactionStatus};

#[derive(Debug, Clone, Default)]
pub struct ProductItem {
    pub id: String,
    pub price: i64,
    pub quantity: i64,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Default)]
pub struct BillingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub billing_address: BillingAddress,
}

#[derive(Debug, Clone, Default)]
pub struct Seller {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

/// Input of the Charge operation. `payment_type` and `currency` are `None`
/// when the caller sent a value the gateway does not recognise; validation
/// reports those as field issues.
#[derive(Debug, Clone, Default)]
pub struct ChargeRequest {
    pub payment_type: Option<PaymentType>,
    pub order_id: String,
    pub amount: i64,
    pub currency: Option<Currency>,
    pub customer: Customer,
    pub seller: Seller,
    pub items: Vec<ProductItem>,
}

impl ChargeRequest {
    /// `sum(price * quantity)` over all items, `None` on overflow.
    pub fn items_total(&self) -> Option<i64> {
        self.items.iter().try_fold(0i64, |total, item| {
            item.price
                .checked_mul(item.quantity)
                .and_then(|line| total.checked_add(line))
        })
    }

    /// Key virtual-account numbers are allocated against.
    pub fn customer_key(&self) -> &str {
        &self.customer.email
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EMoneyActionKind {
    GenerateQrCode,
    #[serde(rename = "get-status")]
    Status,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EMoneyAction {
    pub name: EMoneyActionKind,
    pub method: &'static str,
    pub url: String,
}

impl EMoneyAction {
    pub fn for_charge(emoney_id: &str) -> Vec<EMoneyAction> {
        vec![
            EMoneyAction {
                name: EMoneyActionKind::GenerateQrCode,
                method: "GET",
                url: format!("/e-money/{}/pay", emoney_id),
            },
            EMoneyAction {
                name: EMoneyActionKind::Status,
                method: "GET",
                url: format!("/e-money/{}/status", emoney_id),
            },
            EMoneyAction {
                name: EMoneyActionKind::Cancel,
                method: "POST",
                url: format!("/e-money/{}/cancel", emoney_id),
            },
        ]
    }
}

/// Instrument-specific metadata returned from a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentAction {
    VirtualAccount {
        bank: &'static str,
        virtual_account_number: String,
    },
    EMoney {
        emoney_id: String,
        actions: Vec<EMoneyAction>,
    },
}

#[derive(Debug, Clone)]
pub struct ChargeResult {
    pub order_id: String,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub transaction_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub action: InstrumentAction,
}

/// Read projection returned by GetStatus, Cancel and Expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub order_id: String,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub transaction_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionSummary {
    fn from(tx: &Transaction) -> Self {
        Self {
            order_id: tx.order_id.clone(),
            amount: tx.amount,
            payment_type: tx.payment_type,
            status: tx.status,
            transaction_time: tx.created_at,
            expires_at: tx.expires_at,
        }
    }
}

/// Payment detail resolved from an instrument identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetail {
    pub order_id: String,
    pub charged_amount: i64,
    pub status: TransactionStatus,
    pub payment_type: PaymentType,
    pub virtual_account_number: Option<String>,
    pub emoney_id: Option<String>,
}
