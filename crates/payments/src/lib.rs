//! `docmint-payments`
//!
//! **Responsibility:** the payment gateway adapter.
//!
//! - `ledger`: the remote payment-service protocol (`PaymentLedger`)
//! - `masumi`: HTTP implementation of the ledger
//! - `in_memory`: ledger for tests/dev, with manual confirmation
//! - `monitor`: one polling task per watched payment, delivering a one-shot confirmation
//! - `gateway`: `PaymentGateway`, the contract the orchestrator consumes

pub mod error;
pub mod gateway;
pub mod hash;
pub mod in_memory;
pub mod ledger;
pub mod masumi;
pub mod monitor;
pub mod types;

pub use error::GatewayError;
pub use gateway::{LedgerGateway, PaymentGateway};
pub use in_memory::InMemoryLedger;
pub use ledger::PaymentLedger;
pub use masumi::{MasumiConfig, MasumiLedger};
pub use monitor::{PaymentConfirmation, PaymentMonitor, PaymentWatch};
pub use types::{
    Amount, CONFIRMED_STATE, PENDING_STATE, PaymentReceipt, PaymentRequest, PaymentWindows,
};
