//! Wire shapes of the HTTP surface, in the upstream provider's format.

use serde::{Deserialize, Serialize};

use crate::domain::{
    BillingAddress, ChargeRequest, ChargeResult, Customer, EMoneyAction, InstrumentAction,
    PaymentDetail, ProductItem, Seller, TransactionSummary,
};
use crate::services::notification::{format_timestamp, VaNumber};
use crate::services::sign;
use crate::services::webhook::DeliveryStatsSnapshot;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
    pub currency: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BillingAddressDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub billing_address: BillingAddressDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SellerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemDetails {
    pub id: String,
    pub price: i64,
    pub quantity: i64,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChargeTransactionRequest {
    pub payment_type: String,
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub seller: SellerDetails,
    pub item_details: Vec<ItemDetails>,
}

impl ChargeTransactionRequest {
    /// Unknown payment types and currencies become `None`; validation reports
    /// them alongside any other issue.
    pub fn into_domain(self) -> ChargeRequest {
        let customer = self.customer_details;
        let billing = customer.billing_address;
        ChargeRequest {
            payment_type: self.payment_type.parse().ok(),
            order_id: self.transaction_details.order_id,
            amount: self.transaction_details.gross_amount,
            currency: self.transaction_details.currency.parse().ok(),
            customer: Customer {
                first_name: customer.first_name,
                last_name: customer.last_name,
                email: customer.email,
                phone_number: customer.phone_number,
                billing_address: BillingAddress {
                    first_name: billing.first_name,
                    last_name: billing.last_name,
                    email: billing.email,
                    phone: billing.phone,
                    address: billing.address,
                    postal_code: billing.postal_code,
                    country_code: billing.country_code,
                },
            },
            seller: Seller {
                first_name: self.seller.first_name,
                last_name: self.seller.last_name,
                email: self.seller.email,
                phone_number: self.seller.phone_number,
                address: self.seller.address,
            },
            items: self
                .item_details
                .into_iter()
                .map(|item| ProductItem {
                    id: item.id,
                    price: item.price,
                    quantity: item.quantity,
                    name: item.name,
                    category: item.category,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeTransactionResponse {
    pub status_code: String,
    pub status_message: String,
    pub transaction_id: String,
    pub order_id: String,
    pub gross_amount: String,
    pub payment_type: String,
    pub transaction_time: String,
    pub transaction_status: String,
    pub expiry_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub va_numbers: Option<Vec<VaNumber>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permata_va_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<EMoneyAction>>,
}

impl From<ChargeResult> for ChargeTransactionResponse {
    fn from(result: ChargeResult) -> Self {
        let (va_numbers, permata_va_number, actions) = match result.action {
            InstrumentAction::VirtualAccount {
                bank: "permata",
                virtual_account_number,
            } => (None, Some(virtual_account_number), None),
            InstrumentAction::VirtualAccount {
                bank,
                virtual_account_number,
            } => (
                Some(vec![VaNumber {
                    bank: bank.to_string(),
                    va_number: virtual_account_number,
                }]),
                None,
                None,
            ),
            InstrumentAction::EMoney { actions, .. } => (None, None, Some(actions)),
        };

        Self {
            status_code: "201".to_string(),
            status_message: "The transaction is created successfully".to_string(),
            transaction_id: result.order_id.clone(),
            order_id: result.order_id,
            gross_amount: result.amount.to_string(),
            payment_type: result.payment_type.payment_method().to_string(),
            transaction_time: format_timestamp(result.transaction_time),
            transaction_status: result.status.as_str().to_string(),
            expiry_time: format_timestamp(result.expires_at),
            va_numbers,
            permata_va_number,
            actions,
        }
    }
}

/// Body of the status, cancel and expire routes.
#[derive(Debug, Serialize)]
pub struct TransactionStatusResponse {
    pub status_code: String,
    pub status_message: String,
    pub transaction_id: String,
    pub order_id: String,
    pub gross_amount: String,
    pub payment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    pub transaction_time: String,
    pub transaction_status: String,
    pub expiry_time: String,
    pub fraud_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_key: Option<String>,
}

impl TransactionStatusResponse {
    /// Signs the body when `server_key` is given.
    pub fn new(summary: &TransactionSummary, status_message: &str, server_key: Option<&str>) -> Self {
        Self {
            status_code: "200".to_string(),
            status_message: status_message.to_string(),
            transaction_id: summary.order_id.clone(),
            order_id: summary.order_id.clone(),
            gross_amount: summary.amount.to_string(),
            payment_type: summary.payment_type.payment_method().to_string(),
            bank: summary.payment_type.bank().map(str::to_string),
            transaction_time: format_timestamp(summary.transaction_time),
            transaction_status: summary.status.as_str().to_string(),
            expiry_time: format_timestamp(summary.expires_at),
            fraud_status: "accept".to_string(),
            signature_key: server_key.map(|key| sign(&summary.order_id, 200, summary.amount, key)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkAsPaidRequest {
    pub order_id: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionDetailQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetailResponse {
    pub order_id: String,
    pub charged_amount: i64,
    pub transaction_status: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_money_id: Option<String>,
}

impl From<PaymentDetail> for TransactionDetailResponse {
    fn from(detail: PaymentDetail) -> Self {
        Self {
            order_id: detail.order_id,
            charged_amount: detail.charged_amount,
            transaction_status: detail.status.as_str().to_string(),
            payment_method: detail.payment_type.payment_method().to_string(),
            bank: detail.payment_type.bank().map(str::to_string),
            virtual_account_number: detail.virtual_account_number,
            e_money_id: detail.emoney_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub armed_expiry_timers: usize,
    pub webhook_delivery: DeliveryStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, PaymentType, TransactionStatus};
    use chrono::{TimeZone, Utc};

    #[test]
    fn charge_request_maps_unknown_enums_to_none() {
        let request: ChargeTransactionRequest = serde_json::from_value(serde_json::json!({
            "payment_type": "CREDIT_CARD",
            "transaction_details": { "order_id": "O1", "gross_amount": 1000, "currency": "EUR" }
        }))
        .unwrap();
        let domain = request.into_domain();
        assert_eq!(domain.payment_type, None);
        assert_eq!(domain.currency, None);
        assert_eq!(domain.order_id, "O1");
        assert!(domain.items.is_empty());
    }

    #[test]
    fn charge_request_maps_known_enums() {
        let request: ChargeTransactionRequest = serde_json::from_value(serde_json::json!({
            "payment_type": "VIRTUAL_ACCOUNT_BCA",
            "transaction_details": { "order_id": "O1", "gross_amount": 1000, "currency": "IDR" },
            "item_details": [{ "id": "1", "price": 500, "quantity": 2, "name": "a", "category": "b" }]
        }))
        .unwrap();
        let domain = request.into_domain();
        assert_eq!(domain.payment_type, Some(PaymentType::VirtualAccountBca));
        assert_eq!(domain.currency, Some(Currency::Idr));
        assert_eq!(domain.items_total(), Some(1000));
    }

    #[test]
    fn permata_charge_response_uses_dedicated_field() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let response = ChargeTransactionResponse::from(ChargeResult {
            order_id: "O1".to_string(),
            amount: 1000,
            payment_type: PaymentType::VirtualAccountPermata,
            status: TransactionStatus::Pending,
            transaction_time: at,
            expires_at: at,
            action: InstrumentAction::VirtualAccount {
                bank: "permata",
                virtual_account_number: "123".to_string(),
            },
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["permata_va_number"], "123");
        assert!(json.get("va_numbers").is_none());
        assert_eq!(json["transaction_time"], "2024-01-02 03:04:05");
        assert_eq!(json["payment_type"], "bank_transfer");
    }

    #[test]
    fn status_response_signature() {
        let at = Utc::now();
        let summary = TransactionSummary {
            order_id: "O1".to_string(),
            amount: 50_000,
            payment_type: PaymentType::EMoneyQris,
            status: TransactionStatus::Settled,
            transaction_time: at,
            expires_at: at,
        };
        let response = TransactionStatusResponse::new(&summary, "ok", Some("KEY"));
        assert_eq!(response.signature_key, Some(sign("O1", 200, 50_000, "KEY")));
        assert_eq!(response.transaction_status, "settled");
        assert_eq!(response.bank, None);
    }
}
