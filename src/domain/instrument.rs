//! Payment instruments bound to a transaction: virtual-account charges and
//! e-money charges.

use chrono::{DateTime, Utc};
use rand::Rng;

/// A charge booked against a (possibly reused) virtual-account number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualAccountEntry {
    pub virtual_account_number: String,
    pub order_id: String,
    pub charged_amount: i64,
    pub expires_at: DateTime<Utc>,
}

/// A wallet charge; the id is minted per charge and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EMoneyEntry {
    pub emoney_id: String,
    pub order_id: String,
    pub charged_amount: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInstrument {
    VirtualAccount(VirtualAccountEntry),
    EMoney(EMoneyEntry),
}

impl PaymentInstrument {
    pub fn order_id(&self) -> &str {
        match self {
            PaymentInstrument::VirtualAccount(entry) => &entry.order_id,
            PaymentInstrument::EMoney(entry) => &entry.order_id,
        }
    }

    pub fn charged_amount(&self) -> i64 {
        match self {
            PaymentInstrument::VirtualAccount(entry) => entry.charged_amount,
            PaymentInstrument::EMoney(entry) => entry.charged_amount,
        }
    }

    /// Virtual-account number or e-money id.
    pub fn identifier(&self) -> &str {
        match self {
            PaymentInstrument::VirtualAccount(entry) => &entry.virtual_account_number,
            PaymentInstrument::EMoney(entry) => &entry.emoney_id,
        }
    }
}

pub const VIRTUAL_ACCOUNT_NUMBER_LEN: usize = 15;

/// Builds a 15-digit virtual-account number: date and time components
/// interleaved with random digits. Real numbers are 11-12 digits long, so a
/// generated one can never route to an actual bank account.
pub fn generate_virtual_account_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let mut number = String::with_capacity(VIRTUAL_ACCOUNT_NUMBER_LEN);
    for part in ["%y", "%d", "%m", "%H", "%M"] {
        number.push_str(&now.format(part).to_string());
        number.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    number
}
