//! `docmint-pipeline`
//!
//! **Responsibility:** the paid job's content pipeline.
//!
//! - `document`: in-process HTML document generation
//! - `client`: remote tool server and pinning service clients
//! - `parse`: narrow scrapers for loosely-structured tool replies
//! - `steps`: the `generate → convert → publish → mint` steps
//! - `executor`: runs the configured steps in order, stopping at the first failure
//! - `in_memory`: tool/pinning backends for tests/dev

pub mod client;
pub mod document;
pub mod error;
pub mod executor;
pub mod in_memory;
pub mod parse;
pub mod steps;

pub use client::{
    ContentStore, PinningClient, PinningConfig, ToolBackend, ToolClient, ToolClientConfig,
    ToolReply,
};
pub use document::{Document, FALLBACK_DISPLAY_NAME, generate_document, short_token_name};
pub use error::{PipelineFailure, StepError};
pub use executor::{PipelineConfig, PipelineExecutor};
pub use in_memory::{InMemoryContentStore, InMemoryTools};
pub use parse::{Locator, extract_locator};
pub use steps::{PipelineStep, StepContext};
