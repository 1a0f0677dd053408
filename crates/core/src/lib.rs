//! `docmint-core`: domain building blocks shared by every other crate.
//!
//! This crate contains **pure domain** primitives (no IO, no async runtime):
//! identifiers, the job record and its forward-only state machine, and the
//! caller input model.

pub mod error;
pub mod id;
pub mod input;
pub mod job;

pub use error::{JobError, JobResult};
pub use id::{JobId, PaymentId};
pub use input::{InputError, JobInput};
pub use job::{Job, JobStatus, StatusTransition};
