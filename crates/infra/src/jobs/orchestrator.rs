//! Job orchestrator: binds payment confirmations to pipeline runs.
//!
//! Each submitted job gets one task that waits on its payment watch. When the
//! watch fires the task moves the job to `running`, runs the pipeline in a
//! separate task (so a panic surfaces as a `JoinError`), records the outcome,
//! settles the payment and tears the watch down.

use core::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use tracing::{Instrument, debug, error, info, info_span, warn};

use docmint_core::{InputError, Job, JobId, JobInput, JobStatus, PaymentId};
use docmint_payments::{
    CONFIRMED_STATE, GatewayError, PaymentGateway, PaymentReceipt, PaymentRequest, PaymentWatch,
};
use docmint_pipeline::PipelineExecutor;

use super::registry::{JobRegistry, RegistryError};

/// `payment_status` after the result was submitted to the ledger.
pub const PAYMENT_COMPLETED: &str = "completed";
/// `payment_status` after a refund was authorized.
pub const PAYMENT_REFUND_REQUESTED: &str = "refund_requested";
/// `payment_status` when settling the payment failed.
pub const PAYMENT_ERROR: &str = "error";
/// `payment_status` of a job whose payment was not confirmed before its watch ended.
pub const PAYMENT_EXPIRED: &str = "expired";

const LOG_PREVIEW_CHARS: usize = 100;

/// What to do with a confirmed payment whose pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureSettlement {
    /// Leave the payment unsettled; the ledger's unlock window returns the funds.
    #[default]
    Withhold,
    /// Authorize a refund right away.
    Refund,
}

impl FromStr for FailureSettlement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "withhold" => Ok(FailureSettlement::Withhold),
            "refund" => Ok(FailureSettlement::Refund),
            other => Err(format!("unknown failure settlement `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Agent identifier registered with the payment service
    pub agent_identifier: String,
    pub failure_settlement: FailureSettlement,
}

impl OrchestratorConfig {
    pub fn new(agent_identifier: impl Into<String>) -> Self {
        Self {
            agent_identifier: agent_identifier.into(),
            failure_settlement: FailureSettlement::default(),
        }
    }

    pub fn with_failure_settlement(mut self, settlement: FailureSettlement) -> Self {
        self.failure_settlement = settlement;
        self
    }
}

/// A job submission.
#[derive(Debug, Clone)]
pub struct SubmitJob {
    pub purchaser_identifier: String,
    pub input: JobInput,
}

#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: JobId,
    pub receipt: PaymentReceipt,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The submission was malformed; nothing was created.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Drives jobs from submission to a settled outcome.
pub struct JobOrchestrator<R: JobRegistry> {
    registry: Arc<R>,
    gateway: Arc<dyn PaymentGateway>,
    pipeline: Arc<PipelineExecutor>,
    config: OrchestratorConfig,
}

impl<R: JobRegistry> JobOrchestrator<R> {
    pub fn new(
        registry: Arc<R>,
        gateway: Arc<dyn PaymentGateway>,
        pipeline: Arc<PipelineExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            pipeline,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Create the job's payment, record the job and start waiting for payment.
    ///
    /// Returns once the job is visible in the registry; the pipeline runs later,
    /// on its own task.
    pub async fn submit(
        self: &Arc<Self>,
        request: SubmitJob,
    ) -> Result<SubmittedJob, OrchestratorError> {
        if request.purchaser_identifier.trim().is_empty() {
            return Err(InputError::MissingPurchaser.into());
        }
        request.input.validate()?;

        let job_id = JobId::new();
        info!(
            job_id = %job_id,
            purchaser = %request.purchaser_identifier,
            text = %request.input.text_preview(LOG_PREVIEW_CHARS),
            "job submitted"
        );

        let receipt = self
            .gateway
            .create_request(&PaymentRequest {
                agent_identifier: self.config.agent_identifier.clone(),
                purchaser_identifier: request.purchaser_identifier.clone(),
                input: request.input.clone(),
            })
            .await
            .inspect_err(|e| warn!(job_id = %job_id, error = %e, "payment request failed"))?;

        let payment_id = receipt.payment_id.clone();
        let job = Job::new(
            job_id,
            payment_id.clone(),
            request.input,
            request.purchaser_identifier,
        );
        self.registry.insert(job)?;

        let watch = self.gateway.start_monitoring(&payment_id);
        let span = info_span!("job", job_id = %job_id, payment_id = %watch.payment_id());
        tokio::spawn(Arc::clone(self).await_payment(job_id, watch).instrument(span));

        info!(job_id = %job_id, payment_id = %payment_id, "awaiting payment");
        Ok(SubmittedJob { job_id, receipt })
    }

    async fn await_payment(self: Arc<Self>, job_id: JobId, watch: PaymentWatch) {
        match watch.confirmed().await {
            Some(confirmation) => {
                debug!(state = %confirmation.state, "payment confirmation received");
                if let Err(e) = self.handle_confirmation(job_id).await {
                    error!(error = %e, "confirmation handling failed");
                }
            }
            None => {
                let expired = self.registry.update(job_id, |job| {
                    if job.status == JobStatus::AwaitingPayment {
                        job.set_payment_status(PAYMENT_EXPIRED);
                    }
                    Ok(())
                });
                match expired {
                    Ok(job) if job.payment_status == PAYMENT_EXPIRED => {
                        info!("payment watch ended without confirmation");
                    }
                    Ok(_) => debug!("payment watch ended without confirmation"),
                    Err(e) => error!(error = %e, "failed to record expired payment"),
                }
            }
        }
    }

    /// React to a confirmed payment: run the pipeline once and settle.
    ///
    /// A job that is no longer `awaiting_payment` is left alone, so a repeated
    /// confirmation never starts a second run. Returns the job's final status.
    pub async fn handle_confirmation(&self, job_id: JobId) -> Result<JobStatus, OrchestratorError> {
        let job = match self.registry.update(job_id, |job| {
            job.mark_running()?;
            job.set_payment_status(CONFIRMED_STATE);
            Ok(())
        }) {
            Ok(job) => job,
            Err(RegistryError::Transition(e)) => {
                warn!(job_id = %job_id, error = %e, "confirmation ignored");
                return Ok(self.registry.get(job_id)?.status);
            }
            Err(e) => return Err(e.into()),
        };
        let payment_id = job.payment_id.clone();
        info!(job_id = %job_id, payment_id = %payment_id, "payment confirmed, running pipeline");

        let pipeline = Arc::clone(&self.pipeline);
        let input = job.input.clone();
        let outcome = tokio::spawn(async move { pipeline.run(&input).await }).await;

        let status = match outcome {
            Ok(Ok(result)) => self.finish_success(job_id, &payment_id, result).await?,
            Ok(Err(failure)) => {
                let diagnostics = json!({
                    "failed_step": failure.step,
                    "partial": failure.partial,
                });
                self.finish_failure(job_id, &payment_id, failure.to_string(), Some(diagnostics))
                    .await?
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "pipeline panicked".to_string()
                } else {
                    format!("pipeline task aborted: {join_error}")
                };
                self.finish_failure(job_id, &payment_id, message, None).await?
            }
        };

        self.stop_monitoring(job_id, &payment_id);
        Ok(status)
    }

    async fn finish_success(
        &self,
        job_id: JobId,
        payment_id: &PaymentId,
        result: serde_json::Value,
    ) -> Result<JobStatus, OrchestratorError> {
        let committed = result.clone();
        self.registry
            .update(job_id, move |job| job.mark_completed(committed))?;
        info!(job_id = %job_id, "job completed");

        let payment_status = match self.gateway.complete(payment_id, &result).await {
            Ok(()) => PAYMENT_COMPLETED,
            Err(e) => {
                error!(
                    job_id = %job_id,
                    payment_id = %payment_id,
                    error = %e,
                    "payment completion failed"
                );
                PAYMENT_ERROR
            }
        };
        self.set_payment_status(job_id, payment_status)?;
        Ok(JobStatus::Completed)
    }

    async fn finish_failure(
        &self,
        job_id: JobId,
        payment_id: &PaymentId,
        message: String,
        diagnostics: Option<serde_json::Value>,
    ) -> Result<JobStatus, OrchestratorError> {
        error!(job_id = %job_id, error = %message, "job failed");
        self.registry
            .update(job_id, |job| job.mark_failed(message, diagnostics))?;

        match self.config.failure_settlement {
            FailureSettlement::Withhold => {
                info!(job_id = %job_id, payment_id = %payment_id, "payment withheld after failure");
            }
            FailureSettlement::Refund => {
                let payment_status = match self.gateway.refund(payment_id).await {
                    Ok(()) => PAYMENT_REFUND_REQUESTED,
                    Err(e) => {
                        error!(
                            job_id = %job_id,
                            payment_id = %payment_id,
                            error = %e,
                            "refund failed"
                        );
                        PAYMENT_ERROR
                    }
                };
                self.set_payment_status(job_id, payment_status)?;
            }
        }
        Ok(JobStatus::Failed)
    }

    fn set_payment_status(&self, job_id: JobId, status: &str) -> Result<(), RegistryError> {
        self.registry.update(job_id, |job| {
            job.set_payment_status(status);
            Ok(())
        })?;
        Ok(())
    }

    fn stop_monitoring(&self, job_id: JobId, payment_id: &PaymentId) {
        match self.gateway.stop_monitoring(payment_id) {
            Ok(true) => debug!(job_id = %job_id, "payment monitoring stopped"),
            Ok(false) => debug!(job_id = %job_id, "no payment monitoring to stop"),
            Err(e) => warn!(job_id = %job_id, error = %e, "failed to stop payment monitoring"),
        }
    }
}
