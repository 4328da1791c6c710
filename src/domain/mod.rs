pub mod charge;
pub mod instrument;
pub mod transaction;

pub use charge::{
    BillingAddress, ChargeRequest, ChargeResult, Customer, EMoneyAction, EMoneyActionKind,
    InstrumentAction, PaymentDetail, ProductItem, Seller, TransactionSummary,
};
pub use instrument::{EMoneyEntry, PaymentInstrument, VirtualAccountEntry};
pub use transaction::{
    Currency, InstrumentKind, PaymentType, Transaction, TransactionStatus, UnknownVariant,
};
