//! Status read path.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use docmint_core::{JobId, JobStatus};
use docmint_payments::{GatewayError, PaymentGateway};

use super::registry::{JobRegistry, RegistryError};

/// Mirrored payment state when the ledger no longer knows the payment.
pub const PAYMENT_UNKNOWN: &str = "unknown";
/// Mirrored payment state when the live check failed.
pub const PAYMENT_CHECK_FAILED: &str = "error";

/// What callers see of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub payment_status: String,
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads job state, refreshing the payment mirror while the job is still watched.
pub struct StatusQueryService<R: JobRegistry> {
    registry: Arc<R>,
    gateway: Arc<dyn PaymentGateway>,
}

impl<R: JobRegistry> StatusQueryService<R> {
    pub fn new(registry: Arc<R>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { registry, gateway }
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobSnapshot, RegistryError> {
        let mut job = self.registry.get(job_id)?;

        if self.gateway.is_monitoring(&job.payment_id) {
            let live = match self.gateway.check_status(&job.payment_id).await {
                Ok(state) => state,
                Err(GatewayError::NotFound(_)) => PAYMENT_UNKNOWN.to_string(),
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        payment_id = %job.payment_id,
                        error = %e,
                        "live payment check failed"
                    );
                    PAYMENT_CHECK_FAILED.to_string()
                }
            };
            // Once the job is terminal its payment status belongs to the orchestrator.
            job = self.registry.update(job_id, |job| {
                if !job.status.is_terminal() {
                    job.set_payment_status(live);
                }
                Ok(())
            })?;
        }

        Ok(JobSnapshot {
            job_id: job.id,
            status: job.status,
            payment_status: job.payment_status,
            result: job.result,
            error: job.error,
        })
    }
}
