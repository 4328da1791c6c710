//! Transaction domain entity.
//! Framework-agnostic representation of a gateway transaction and its status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a wire string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The family of payment instrument a payment type settles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    VirtualAccount,
    EMoney,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    VirtualAccountBca,
    VirtualAccountPermata,
    VirtualAccountBri,
    VirtualAccountBni,
    EMoneyQris,
    EMoneyGopay,
    EMoneyShopeePay,
}

impl PaymentType {
    pub const ALL: [PaymentType; 7] = [
        PaymentType::VirtualAccountBca,
        PaymentType::VirtualAccountPermata,
        PaymentType::VirtualAccountBri,
        PaymentType::VirtualAccountBni,
        PaymentType::EMoneyQris,
        PaymentType::EMoneyGopay,
        PaymentType::EMoneyShopeePay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::VirtualAccountBca => "VIRTUAL_ACCOUNT_BCA",
            PaymentType::VirtualAccountPermata => "VIRTUAL_ACCOUNT_PERMATA",
            PaymentType::VirtualAccountBri => "VIRTUAL_ACCOUNT_BRI",
            PaymentType::VirtualAccountBni => "VIRTUAL_ACCOUNT_BNI",
            PaymentType::EMoneyQris => "E_MONEY_QRIS",
            PaymentType::EMoneyGopay => "E_MONEY_GOPAY",
            PaymentType::EMoneyShopeePay => "E_MONEY_SHOPEE_PAY",
        }
    }

    pub fn instrument_kind(&self) -> InstrumentKind {
        match self {
            PaymentType::VirtualAccountBca
            | PaymentType::VirtualAccountPermata
            | PaymentType::VirtualAccountBri
            | PaymentType::VirtualAccountBni => InstrumentKind::VirtualAccount,
            PaymentType::EMoneyQris | PaymentType::EMoneyGopay | PaymentType::EMoneyShopeePay => {
                InstrumentKind::EMoney
            }
        }
    }

    /// Lowercase bank code for virtual-account payment types.
    pub fn bank(&self) -> Option<&'static str> {
        match self {
            PaymentType::VirtualAccountBca => Some("bca"),
            PaymentType::VirtualAccountPermata => Some("permata"),
            PaymentType::VirtualAccountBri => Some("bri"),
            PaymentType::VirtualAccountBni => Some("bni"),
            _ => None,
        }
    }

    /// The provider's `payment_type` notation used in settlement notifications.
    pub fn payment_method(&self) -> &'static str {
        match self.instrument_kind() {
            InstrumentKind::VirtualAccount => "bank_transfer",
            InstrumentKind::EMoney => match self {
                PaymentType::EMoneyQris => "qris",
                PaymentType::EMoneyGopay => "gopay",
                _ => "shopeepay",
            },
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("payment type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Idr,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Idr => "IDR",
            Currency::Usd => "USD",
        }
    }
}

impl FromStr for Currency {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDR" => Ok(Currency::Idr),
            "USD" => Ok(Currency::Usd),
            other => Err(UnknownVariant::new("currency", other)),
        }
    }
}

/// Lifecycle status. `Pending` is the only state a transaction can leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Settled,
    Denied,
    Expired,
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Denied => "denied",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "settled" => Ok(TransactionStatus::Settled),
            "denied" => Ok(TransactionStatus::Denied),
            "expired" => Ok(TransactionStatus::Expired),
            "canceled" => Ok(TransactionStatus::Canceled),
            other => Err(UnknownVariant::new("transaction status", other)),
        }
    }
}

/// Domain entity representing a charged transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub order_id: String,
    /// Minor currency units.
    pub amount: i64,
    pub payment_type: PaymentType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn payment_type_round_trips_through_wire_name() {
        for payment_type in PaymentType::ALL {
            assert_eq!(payment_type.as_str().parse::<PaymentType>(), Ok(payment_type));
        }
        assert!("VIRTUAL_ACCOUNT_MANDIRI".parse::<PaymentType>().is_err());
    }

    #[test]
    fn serde_names_match_wire_names() {
        let json = serde_json::to_string(&PaymentType::EMoneyShopeePay).unwrap();
        assert_eq!(json, "\"E_MONEY_SHOPEE_PAY\"");
        let json = serde_json::to_string(&TransactionStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        for status in [
            TransactionStatus::Settled,
            TransactionStatus::Denied,
            TransactionStatus::Expired,
            TransactionStatus::Canceled,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn instrument_kind_and_bank() {
        assert_eq!(
            PaymentType::VirtualAccountBni.instrument_kind(),
            InstrumentKind::VirtualAccount
        );
        assert_eq!(PaymentType::VirtualAccountBni.bank(), Some("bni"));
        assert_eq!(PaymentType::EMoneyGopay.instrument_kind(), InstrumentKind::EMoney);
        assert_eq!(PaymentType::EMoneyGopay.bank(), None);
        assert_eq!(PaymentType::VirtualAccountBca.payment_method(), "bank_transfer");
        assert_eq!(PaymentType::EMoneyQris.payment_method(), "qris");
    }

    #[test]
    fn expiry_check_is_strictly_after() {
        let now = Utc::now();
        let tx = Transaction {
            order_id: "O1".to_string(),
            amount: 1,
            payment_type: PaymentType::EMoneyQris,
            status: TransactionStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(1),
        };
        assert!(!tx.is_expired_at(now));
        assert!(!tx.is_expired_at(tx.expires_at));
        assert!(tx.is_expired_at(now + Duration::hours(2)));
    }
}
