//! Notification bodies in the upstream provider's webhook format.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::signature::sign;
use super::webhook::EventKind;
use crate::domain::{PaymentType, Transaction};

pub const NOTIFICATION_STATUS_CODE: u16 = 200;
pub const NOTIFICATION_STATUS_MESSAGE: &str = "midtrans payment notification";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentAmount {
    pub paid_at: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub status_code: String,
    pub status_message: String,
    pub transaction_id: String,
    pub order_id: String,
    pub gross_amount: String,
    pub payment_type: String,
    pub transaction_time: String,
    pub transaction_status: String,
    pub fraud_status: String,
    pub signature_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub va_numbers: Option<Vec<VaNumber>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permata_va_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquirer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amounts: Option<Vec<PaymentAmount>>,
}

pub fn transaction_status_label(event: EventKind) -> &'static str {
    match event {
        EventKind::Pending => "pending",
        EventKind::Settlement => "settlement",
        EventKind::Expired => "expire",
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Builds the notification for `tx`. `payment_type` decides the instrument
/// specific fields; it is the transaction's own type except on settlement,
/// where the caller may report a different payment method.
pub fn build_notification(
    event: EventKind,
    tx: &Transaction,
    payment_type: PaymentType,
    virtual_account_number: Option<&str>,
    server_key: &str,
    now: DateTime<Utc>,
) -> NotificationPayload {
    let gross_amount = tx.amount.to_string();
    let settled = event == EventKind::Settlement;

    let mut payload = NotificationPayload {
        status_code: NOTIFICATION_STATUS_CODE.to_string(),
        status_message: NOTIFICATION_STATUS_MESSAGE.to_string(),
        transaction_id: tx.order_id.clone(),
        order_id: tx.order_id.clone(),
        gross_amount: gross_amount.clone(),
        payment_type: payment_type.payment_method().to_string(),
        transaction_time: format_timestamp(tx.created_at),
        transaction_status: transaction_status_label(event).to_string(),
        fraud_status: "accept".to_string(),
        signature_key: sign(&tx.order_id, NOTIFICATION_STATUS_CODE, tx.amount, server_key),
        va_numbers: None,
        permata_va_number: None,
        currency: None,
        acquirer: None,
        settlement_time: None,
        payment_amounts: None,
    };

    match payment_type {
        PaymentType::VirtualAccountPermata => {
            payload.permata_va_number = virtual_account_number.map(str::to_string);
        }
        PaymentType::VirtualAccountBca
        | PaymentType::VirtualAccountBni
        | PaymentType::VirtualAccountBri => {
            if let (Some(bank), Some(number)) = (payment_type.bank(), virtual_account_number) {
                payload.va_numbers = Some(vec![VaNumber {
                    bank: bank.to_string(),
                    va_number: number.to_string(),
                }]);
            }
            if settled && payment_type == PaymentType::VirtualAccountBni {
                payload.payment_amounts = Some(vec![PaymentAmount {
                    paid_at: format_timestamp(now),
                    amount: gross_amount,
                }]);
            }
        }
        PaymentType::EMoneyQris => {
            payload.currency = Some("IDR".to_string());
            payload.acquirer = Some("nobu".to_string());
            if settled {
                payload.settlement_time = Some(format_timestamp(now));
            }
        }
        PaymentType::EMoneyShopeePay => {
            payload.currency = Some("IDR".to_string());
            if settled {
                payload.settlement_time = Some(format_timestamp(now));
            }
        }
        PaymentType::EMoneyGopay => {}
    }

    payload
}
