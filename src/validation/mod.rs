//! Charge request validation. Every violated rule is reported, not just the
//! first one.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

use crate::domain::ChargeRequest;

pub const NAME_MAX_LEN: usize = 255;
pub const ADDRESS_MAX_LEN: usize = 500;
pub const POSTAL_CODE_MAX_LEN: usize = 10;
pub const COUNTRY_CODE_MAX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    InvalidValue,
    TooLong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: IssueCode,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\w+@\w+(\.\w+)+$").expect("email pattern compiles"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+\d+$").expect("phone pattern compiles"))
}

/// Accumulates issues for one request.
#[derive(Debug, Default)]
pub struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: impl Into<String>, code: IssueCode, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            field: field.into(),
            code,
            message: message.into(),
        });
    }

    /// Empty check plus length check; returns whether the value was present.
    fn required(&mut self, field: &str, value: &str, max_len: usize) -> bool {
        if value.is_empty() {
            self.push(field, IssueCode::Required, "can not be empty");
            return false;
        }
        self.max_len(field, value, max_len);
        true
    }

    fn max_len(&mut self, field: &str, value: &str, max_len: usize) {
        if value.len() > max_len {
            self.push(
                field,
                IssueCode::TooLong,
                format!("maximum of {} characters length", max_len),
            );
        }
    }

    fn pattern(&mut self, field: &str, value: &str, pattern: &Regex, message: &str) {
        if !pattern.is_match(value) {
            self.push(field, IssueCode::InvalidValue, message);
        }
    }

    fn digits(&mut self, field: &str, value: &str, message: &str) {
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            self.push(field, IssueCode::InvalidValue, message);
        }
    }

    fn positive(&mut self, field: &str, value: i64) {
        if value <= 0 {
            self.push(field, IssueCode::InvalidValue, "must be greater than 0");
        }
    }

    fn email(&mut self, field: &str, value: &str) {
        if self.required(field, value, NAME_MAX_LEN) {
            self.pattern(field, value, email_pattern(), "must be a valid email");
        }
    }

    fn phone(&mut self, field: &str, value: &str) {
        if self.required(field, value, NAME_MAX_LEN) {
            self.pattern(field, value, phone_pattern(), "must be a valid phone number");
        }
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationIssue>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

pub fn validate_charge_request(request: &ChargeRequest) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Issues::default();

    if request.payment_type.is_none() {
        issues.push("payment_type", IssueCode::InvalidValue, "must be a valid value");
    }
    issues.required("order_id", &request.order_id, NAME_MAX_LEN);
    issues.positive("amount", request.amount);
    if request.currency.is_none() {
        issues.push("currency", IssueCode::InvalidValue, "must be a valid value");
    }

    let customer = &request.customer;
    issues.required("customer.first_name", &customer.first_name, NAME_MAX_LEN);
    issues.max_len("customer.last_name", &customer.last_name, NAME_MAX_LEN);
    issues.email("customer.email", &customer.email);
    issues.phone("customer.phone_number", &customer.phone_number);

    let billing = &customer.billing_address;
    issues.required("customer.billing_address.first_name", &billing.first_name, NAME_MAX_LEN);
    issues.max_len("customer.billing_address.last_name", &billing.last_name, NAME_MAX_LEN);
    issues.email("customer.billing_address.email", &billing.email);
    issues.phone("customer.billing_address.phone", &billing.phone);
    issues.required("customer.billing_address.address", &billing.address, ADDRESS_MAX_LEN);
    if issues.required(
        "customer.billing_address.postal_code",
        &billing.postal_code,
        POSTAL_CODE_MAX_LEN,
    ) {
        issues.digits(
            "customer.billing_address.postal_code",
            &billing.postal_code,
            "must be a valid postal code",
        );
    }
    if issues.required(
        "customer.billing_address.country_code",
        &billing.country_code,
        COUNTRY_CODE_MAX_LEN,
    ) {
        issues.digits(
            "customer.billing_address.country_code",
            &billing.country_code,
            "must be a valid country code",
        );
    }

    let seller = &request.seller;
    issues.required("seller.first_name", &seller.first_name, NAME_MAX_LEN);
    issues.max_len("seller.last_name", &seller.last_name, NAME_MAX_LEN);
    issues.email("seller.email", &seller.email);
    issues.phone("seller.phone_number", &seller.phone_number);
    issues.required("seller.address", &seller.address, ADDRESS_MAX_LEN);

    if request.items.is_empty() {
        issues.push("items", IssueCode::Required, "can not be empty");
    }
    for (index, item) in request.items.iter().enumerate() {
        issues.required(&format!("items[{}].id", index), &item.id, NAME_MAX_LEN);
        issues.positive(&format!("items[{}].price", index), item.price);
        issues.positive(&format!("items[{}].quantity", index), item.quantity);
        issues.required(&format!("items[{}].name", index), &item.name, NAME_MAX_LEN);
        issues.required(&format!("items[{}].category", index), &item.category, NAME_MAX_LEN);
    }

    issues.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BillingAddress, Currency, Customer, PaymentType, ProductItem, Seller};

    pub(crate) fn valid_request() -> ChargeRequest {
        ChargeRequest {
            payment_type: Some(PaymentType::EMoneyQris),
            order_id: "O1".to_string(),
            amount: 50_000,
            currency: Some(Currency::Idr),
            customer: Customer {
                first_name: "Budi".to_string(),
                last_name: "Santoso".to_string(),
                email: "budi@example.com".to_string(),
                phone_number: "+6281234567".to_string(),
                billing_address: BillingAddress {
                    first_name: "Budi".to_string(),
                    last_name: "Santoso".to_string(),
                    email: "budi@example.com".to_string(),
                    phone: "+6281234567".to_string(),
                    address: "Jl. Merdeka 1".to_string(),
                    postal_code: "10110".to_string(),
                    country_code: "62".to_string(),
                },
            },
            seller: Seller {
                first_name: "Toko".to_string(),
                last_name: "Maju".to_string(),
                email: "toko@example.com".to_string(),
                phone_number: "+6287654321".to_string(),
                address: "Jl. Sudirman 2".to_string(),
            },
            items: vec![ProductItem {
                id: "SKU-1".to_string(),
                price: 25_000,
                quantity: 2,
                name: "Kopi".to_string(),
                category: "beverage".to_string(),
            }],
        }
    }

    fn fields(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_charge_request(&valid_request()).is_ok());
    }

    #[test]
    fn test_reports_every_issue() {
        let mut request = valid_request();
        request.payment_type = None;
        request.order_id.clear();
        request.amount = 0;
        request.customer.email = "not-an-email".to_string();
        request.seller.phone_number = "0812".to_string();
        request.items[0].quantity = 0;

        let issues = validate_charge_request(&request).unwrap_err();
        assert_eq!(
            fields(&issues),
            vec![
                "payment_type",
                "order_id",
                "amount",
                "customer.email",
                "seller.phone_number",
                "items[0].quantity",
            ]
        );
        assert_eq!(issues[1].code, IssueCode::Required);
        assert_eq!(issues[3].code, IssueCode::InvalidValue);
    }

    #[test]
    fn test_length_limits() {
        let mut request = valid_request();
        request.customer.last_name = "x".repeat(NAME_MAX_LEN + 1);
        request.seller.address = "x".repeat(ADDRESS_MAX_LEN + 1);
        request.customer.billing_address.address = "x".repeat(ADDRESS_MAX_LEN);

        let issues = validate_charge_request(&request).unwrap_err();
        assert_eq!(fields(&issues), vec!["customer.last_name", "seller.address"]);
        assert!(issues.iter().all(|issue| issue.code == IssueCode::TooLong));
    }

    #[test]
    fn test_postal_and_country_codes() {
        let mut request = valid_request();
        request.customer.billing_address.postal_code = "12AB5".to_string();
        request.customer.billing_address.country_code = "123456".to_string();

        let issues = validate_charge_request(&request).unwrap_err();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "customer.billing_address.postal_code");
        assert_eq!(issues[0].code, IssueCode::InvalidValue);
        assert_eq!(issues[1].field, "customer.billing_address.country_code");
        assert_eq!(issues[1].code, IssueCode::TooLong);
    }

    #[test]
    fn test_empty_items_required() {
        let mut request = valid_request();
        request.items.clear();
        let issues = validate_charge_request(&request).unwrap_err();
        assert_eq!(fields(&issues), vec!["items"]);
    }

    #[test]
    fn test_issue_serializes_snake_case_code() {
        let issue = ValidationIssue {
            field: "amount".to_string(),
            code: IssueCode::InvalidValue,
            message: "must be greater than 0".to_string(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "invalid_value");
    }
}
