//! Payment request/receipt types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docmint_core::{JobInput, PaymentId};

/// Ledger state meaning the buyer's funds are locked for us (payment confirmed).
pub const CONFIRMED_STATE: &str = "FundsLocked";

/// Reported while the ledger has no on-chain state for the payment yet.
pub const PENDING_STATE: &str = "pending";

/// A payment to create on the ledger for one job.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub agent_identifier: String,
    pub purchaser_identifier: String,
    pub input: JobInput,
}

/// What the ledger returned for a created payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub pay_by_time: String,
    pub submit_result_time: String,
    pub unlock_time: String,
    pub external_dispute_unlock_time: String,
    pub input_hash: String,
}

/// Advertised price (reported to callers, not sent to the ledger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub amount: String,
    pub unit: String,
}

impl Default for Amount {
    fn default() -> Self {
        Self {
            amount: "10000000".to_string(),
            unit: "lovelace".to_string(),
        }
    }
}

/// Deadlines of a payment, as offsets from submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentWindows {
    /// Buyer must pay within this window
    pub pay_by: Duration,
    /// We must submit a result within this window
    pub submit_result: Duration,
    /// Funds unlock for us after this window
    pub unlock: Duration,
    /// Disputes close after this window
    pub external_dispute_unlock: Duration,
}

impl Default for PaymentWindows {
    fn default() -> Self {
        Self {
            pay_by: Duration::from_secs(12 * 3600),
            submit_result: Duration::from_secs(24 * 3600),
            unlock: Duration::from_secs(48 * 3600),
            external_dispute_unlock: Duration::from_secs(72 * 3600),
        }
    }
}

/// Absolute deadlines, as epoch-millisecond strings (the ledger's wire format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDeadlines {
    pub pay_by_time: String,
    pub submit_result_time: String,
    pub unlock_time: String,
    pub external_dispute_unlock_time: String,
}

impl PaymentWindows {
    pub fn deadlines_from(&self, now: DateTime<Utc>) -> PaymentDeadlines {
        let at = |offset: Duration| {
            let delta = chrono::Duration::from_std(offset).unwrap_or_default();
            (now + delta).timestamp_millis().to_string()
        };
        PaymentDeadlines {
            pay_by_time: at(self.pay_by),
            submit_result_time: at(self.submit_result),
            unlock_time: at(self.unlock),
            external_dispute_unlock_time: at(self.external_dispute_unlock),
        }
    }
}
