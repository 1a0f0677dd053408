//! Payment gateway consumed by the job orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};

use docmint_core::PaymentId;

use crate::error::GatewayError;
use crate::hash;
use crate::ledger::PaymentLedger;
use crate::monitor::{PaymentMonitor, PaymentWatch};
use crate::types::{PaymentReceipt, PaymentRequest};

/// Payment operations for one job's lifecycle.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a payment request on the ledger.
    async fn create_request(&self, request: &PaymentRequest)
    -> Result<PaymentReceipt, GatewayError>;

    /// Begin watching a payment; the watch resolves once it is confirmed.
    fn start_monitoring(&self, payment_id: &PaymentId) -> PaymentWatch;

    /// Cancel a watch. Returns `Ok(false)` when no binding was active.
    fn stop_monitoring(&self, payment_id: &PaymentId) -> Result<bool, GatewayError>;

    fn is_monitoring(&self, payment_id: &PaymentId) -> bool;

    /// Live payment state from the ledger.
    async fn check_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError>;

    /// Submit the delivered result, settling the payment. At most once per payment.
    async fn complete(
        &self,
        payment_id: &PaymentId,
        result: &serde_json::Value,
    ) -> Result<(), GatewayError>;

    /// Authorize a refund of the buyer's funds. At most once per payment.
    async fn refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError>;
}

/// [`PaymentGateway`] over a [`PaymentLedger`] with a polling monitor.
pub struct LedgerGateway<L: PaymentLedger> {
    ledger: Arc<L>,
    monitor: PaymentMonitor,
    settled: Mutex<HashSet<PaymentId>>,
}

impl<L: PaymentLedger> LedgerGateway<L> {
    pub fn new(ledger: Arc<L>, poll_interval: Duration) -> Self {
        let monitor = PaymentMonitor::new(ledger.clone(), poll_interval);
        Self {
            ledger,
            monitor,
            settled: Mutex::new(HashSet::new()),
        }
    }

    /// Stop watching payments that stay unconfirmed for longer than `limit`.
    pub fn with_watch_limit(mut self, limit: Duration) -> Self {
        self.monitor = self.monitor.with_watch_limit(limit);
        self
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    fn settled(&self) -> MutexGuard<'_, HashSet<PaymentId>> {
        self.settled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve the single settlement slot of a payment.
    fn reserve_settlement(&self, payment_id: &PaymentId) -> Result<(), GatewayError> {
        if !self.settled().insert(payment_id.clone()) {
            return Err(GatewayError::AlreadySettled(payment_id.clone()));
        }
        Ok(())
    }

    /// Release a reservation whose ledger call failed, so it can be retried.
    fn release_settlement(&self, payment_id: &PaymentId) {
        self.settled().remove(payment_id);
    }
}

#[async_trait]
impl<L: PaymentLedger> PaymentGateway for LedgerGateway<L> {
    async fn create_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, GatewayError> {
        let receipt = self.ledger.create_payment(request).await?;
        info!(
            payment_id = %receipt.payment_id,
            purchaser = %request.purchaser_identifier,
            "payment request created"
        );
        Ok(receipt)
    }

    fn start_monitoring(&self, payment_id: &PaymentId) -> PaymentWatch {
        self.monitor.watch(payment_id.clone())
    }

    fn stop_monitoring(&self, payment_id: &PaymentId) -> Result<bool, GatewayError> {
        Ok(self.monitor.stop(payment_id))
    }

    fn is_monitoring(&self, payment_id: &PaymentId) -> bool {
        self.monitor.is_active(payment_id)
    }

    async fn check_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError> {
        self.ledger.payment_status(payment_id).await
    }

    #[instrument(skip(self, result), fields(payment_id = %payment_id))]
    async fn complete(
        &self,
        payment_id: &PaymentId,
        result: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.reserve_settlement(payment_id)?;
        let result_hash = hash::result_hash(result);
        match self.ledger.submit_result(payment_id, &result_hash).await {
            Ok(()) => {
                info!(%result_hash, "result submitted to ledger");
                Ok(())
            }
            Err(e) => {
                self.release_settlement(payment_id);
                Err(e)
            }
        }
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError> {
        self.reserve_settlement(payment_id)?;
        match self.ledger.authorize_refund(payment_id).await {
            Ok(()) => {
                info!("refund authorized");
                Ok(())
            }
            Err(e) => {
                self.release_settlement(payment_id);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryLedger;
    use docmint_core::JobInput;
    use serde_json::json;

    fn gateway() -> LedgerGateway<InMemoryLedger> {
        LedgerGateway::new(InMemoryLedger::arc(), Duration::from_millis(10))
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            agent_identifier: "agent".into(),
            purchaser_identifier: "buyer".into(),
            input: [("text", "hello")].into_iter().collect::<JobInput>(),
        }
    }

    #[tokio::test]
    async fn complete_submits_result_hash_once() {
        let gateway = gateway();
        let receipt = gateway.create_request(&request()).await.unwrap();
        let result = json!({"status": "completed"});

        gateway.complete(&receipt.payment_id, &result).await.unwrap();
        let second = gateway.complete(&receipt.payment_id, &result).await;

        assert!(matches!(second, Err(GatewayError::AlreadySettled(_))));
        let submissions = gateway.ledger().submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].1, hash::result_hash(&result));
    }

    #[tokio::test]
    async fn failed_completion_can_be_retried() {
        let gateway = gateway();
        let receipt = gateway.create_request(&request()).await.unwrap();

        gateway.ledger().set_unavailable(true);
        assert!(gateway.complete(&receipt.payment_id, &json!({})).await.is_err());

        gateway.ledger().set_unavailable(false);
        assert!(gateway.complete(&receipt.payment_id, &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn refund_excludes_completion() {
        let gateway = gateway();
        let receipt = gateway.create_request(&request()).await.unwrap();

        gateway.refund(&receipt.payment_id).await.unwrap();
        assert!(gateway.complete(&receipt.payment_id, &json!({})).await.is_err());
        assert_eq!(gateway.ledger().refunds(), vec![receipt.payment_id]);
    }

    #[tokio::test]
    async fn monitoring_binding_lifecycle() {
        let gateway = gateway();
        let receipt = gateway.create_request(&request()).await.unwrap();
        let id = &receipt.payment_id;

        assert!(!gateway.is_monitoring(id));
        let _watch = gateway.start_monitoring(id);
        assert!(gateway.is_monitoring(id));

        assert!(gateway.stop_monitoring(id).unwrap());
        assert!(!gateway.stop_monitoring(id).unwrap());
        assert!(!gateway.is_monitoring(id));
    }
}
