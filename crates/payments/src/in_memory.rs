//! In-memory ledger for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use docmint_core::PaymentId;

use crate::error::GatewayError;
use crate::hash;
use crate::ledger::PaymentLedger;
use crate::types::{CONFIRMED_STATE, PENDING_STATE, PaymentReceipt, PaymentRequest, PaymentWindows};

#[derive(Debug, Default)]
struct LedgerState {
    next_seq: u64,
    payments: HashMap<PaymentId, String>,
    submissions: Vec<(PaymentId, String)>,
    refunds: Vec<PaymentId>,
    reject_next_create: Option<GatewayError>,
    unavailable: bool,
}

/// Ledger kept in process memory.
///
/// Payments start out `pending` and only change state through [`confirm`](Self::confirm)
/// or [`set_state`](Self::set_state), which is how tests and the dev profile
/// simulate a buyer paying.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark a payment as paid (funds locked).
    pub fn confirm(&self, payment_id: &PaymentId) -> bool {
        self.set_state(payment_id, CONFIRMED_STATE)
    }

    /// Force the on-chain state of a payment. Returns `false` for unknown payments.
    pub fn set_state(&self, payment_id: &PaymentId, state: &str) -> bool {
        match self.lock().payments.get_mut(payment_id) {
            Some(current) => {
                *current = state.to_string();
                true
            }
            None => false,
        }
    }

    /// Result hashes submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<(PaymentId, String)> {
        self.lock().submissions.clone()
    }

    /// Payments for which a refund was authorized.
    pub fn refunds(&self) -> Vec<PaymentId> {
        self.lock().refunds.clone()
    }

    /// IDs of every payment created so far.
    pub fn payment_ids(&self) -> Vec<PaymentId> {
        self.lock().payments.keys().cloned().collect()
    }

    /// Fail the next `create_payment` call with `error`.
    pub fn reject_next_create(&self, error: GatewayError) {
        self.lock().reject_next_create = Some(error);
    }

    /// Make every call fail with [`GatewayError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn check_available(state: &LedgerState) -> Result<(), GatewayError> {
        if state.unavailable {
            return Err(GatewayError::Unavailable("ledger offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentLedger for InMemoryLedger {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, GatewayError> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        if let Some(err) = state.reject_next_create.take() {
            return Err(err);
        }

        state.next_seq += 1;
        let payment_id = PaymentId::new(format!("mem-payment-{}", state.next_seq));
        state
            .payments
            .insert(payment_id.clone(), PENDING_STATE.to_string());

        let deadlines = PaymentWindows::default().deadlines_from(Utc::now());
        Ok(PaymentReceipt {
            payment_id,
            pay_by_time: deadlines.pay_by_time,
            submit_result_time: deadlines.submit_result_time,
            unlock_time: deadlines.unlock_time,
            external_dispute_unlock_time: deadlines.external_dispute_unlock_time,
            input_hash: hash::input_hash(&request.purchaser_identifier, &request.input),
        })
    }

    async fn payment_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError> {
        let state = self.lock();
        Self::check_available(&state)?;
        state
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(payment_id.clone()))
    }

    async fn submit_result(
        &self,
        payment_id: &PaymentId,
        result_hash: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        if !state.payments.contains_key(payment_id) {
            return Err(GatewayError::NotFound(payment_id.clone()));
        }
        state
            .submissions
            .push((payment_id.clone(), result_hash.to_string()));
        state
            .payments
            .insert(payment_id.clone(), "ResultSubmitted".to_string());
        Ok(())
    }

    async fn authorize_refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        if !state.payments.contains_key(payment_id) {
            return Err(GatewayError::NotFound(payment_id.clone()));
        }
        state.refunds.push(payment_id.clone());
        state
            .payments
            .insert(payment_id.clone(), "RefundRequested".to_string());
        Ok(())
    }
}
