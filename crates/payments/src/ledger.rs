use std::sync::Arc;

use async_trait::async_trait;

use docmint_core::PaymentId;

use crate::error::GatewayError;
use crate::types::{PaymentReceipt, PaymentRequest};

/// Remote payment-service protocol.
///
/// Implementations talk to the ledger; they hold no per-job state.
#[async_trait]
pub trait PaymentLedger: Send + Sync + 'static {
    /// Create a payment request for one job.
    async fn create_payment(&self, request: &PaymentRequest)
    -> Result<PaymentReceipt, GatewayError>;

    /// Current on-chain state of a payment.
    async fn payment_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError>;

    /// Submit the hash of the delivered result, settling the payment.
    async fn submit_result(
        &self,
        payment_id: &PaymentId,
        result_hash: &str,
    ) -> Result<(), GatewayError>;

    /// Authorize returning the locked funds to the buyer.
    async fn authorize_refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError>;
}

#[async_trait]
impl<L: PaymentLedger> PaymentLedger for Arc<L> {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, GatewayError> {
        (**self).create_payment(request).await
    }

    async fn payment_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError> {
        (**self).payment_status(payment_id).await
    }

    async fn submit_result(
        &self,
        payment_id: &PaymentId,
        result_hash: &str,
    ) -> Result<(), GatewayError> {
        (**self).submit_result(payment_id, result_hash).await
    }

    async fn authorize_refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError> {
        (**self).authorize_refund(payment_id).await
    }
}
