//! Job record and its forward-only state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};
use crate::id::{JobId, PaymentId};
use crate::input::JobInput;

/// Payment status mirrored at creation, before the ledger was asked.
pub const INITIAL_PAYMENT_STATUS: &str = "pending";

/// Job lifecycle status.
///
/// `AwaitingPayment → Running → {Completed | Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Payment requested, waiting for ledger confirmation
    AwaitingPayment,
    /// Payment confirmed, pipeline executing
    Running,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::AwaitingPayment => "awaiting_payment",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `next` is the immediate successor of `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::AwaitingPayment, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a job's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

/// A paid content-generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Last-known payment state as reported by the gateway
    pub payment_status: String,
    /// Ledger identifier of this job's payment
    pub payment_id: PaymentId,
    /// Caller input
    pub input: JobInput,
    /// Pipeline output, present only once completed
    pub result: Option<serde_json::Value>,
    /// Failure description, present only once failed
    pub error: Option<String>,
    /// Partial step outputs captured on failure
    pub diagnostics: Option<serde_json::Value>,
    /// Caller-supplied correlation token
    pub purchaser_identifier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Every status the job has been in, oldest first
    pub history: Vec<StatusTransition>,
}

impl Job {
    /// Create a job in `AwaitingPayment` for an already-created payment.
    pub fn new(
        id: JobId,
        payment_id: PaymentId,
        input: JobInput,
        purchaser_identifier: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::AwaitingPayment,
            payment_status: INITIAL_PAYMENT_STATUS.to_string(),
            payment_id,
            input,
            result: None,
            error: None,
            diagnostics: None,
            purchaser_identifier: purchaser_identifier.into(),
            created_at: now,
            updated_at: now,
            history: vec![StatusTransition {
                status: JobStatus::AwaitingPayment,
                at: now,
            }],
        }
    }

    /// Mark job as running (payment confirmed).
    pub fn mark_running(&mut self) -> JobResult<()> {
        self.transition(JobStatus::Running)
    }

    /// Mark job as completed with its pipeline result.
    pub fn mark_completed(&mut self, result: serde_json::Value) -> JobResult<()> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// Mark job as failed.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        diagnostics: Option<serde_json::Value>,
    ) -> JobResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.diagnostics = diagnostics;
        Ok(())
    }

    pub fn set_payment_status(&mut self, status: impl Into<String>) {
        self.payment_status = status.into();
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, next: JobStatus) -> JobResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::invalid_transition(self.status, next));
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        self.history.push(StatusTransition { status: next, at: now });
        Ok(())
    }
}
