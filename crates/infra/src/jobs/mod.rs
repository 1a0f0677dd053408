//! Paid job lifecycle.
//!
//! ## Components
//!
//! - `JobRegistry`: the shared table of job records (in-memory)
//! - `JobOrchestrator`: payment confirmation → pipeline run → settlement
//! - `StatusQueryService`: job snapshots with a live payment check while watched

pub mod orchestrator;
pub mod registry;
pub mod status;

pub use orchestrator::{
    FailureSettlement, JobOrchestrator, OrchestratorConfig, OrchestratorError, SubmitJob,
    SubmittedJob,
};
pub use registry::{InMemoryJobRegistry, JobRegistry, RegistryError};
pub use status::{JobSnapshot, StatusQueryService};
