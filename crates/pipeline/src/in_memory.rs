//! In-process tool and pinning backends for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{ContentStore, ToolBackend, ToolReply};
use crate::error::StepError;

#[derive(Debug, Default)]
struct ToolState {
    scripted: HashMap<String, Result<ToolReply, StepError>>,
    calls: Vec<(String, Value)>,
    minted: u64,
}

/// Tool server stand-in.
///
/// Unscripted `html_to_pdf` calls answer with a URL derived from the
/// `filename` argument and unscripted `mint_nft` calls with fresh transaction
/// ids. Other tools fail as rejected.
#[derive(Debug, Default)]
pub struct InMemoryTools {
    state: Mutex<ToolState>,
}

impl InMemoryTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, ToolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer every call to `tool` with `reply`.
    pub fn reply_with(&self, tool: &str, reply: ToolReply) {
        self.lock().scripted.insert(tool.to_string(), Ok(reply));
    }

    /// Fail every call to `tool` with `error`.
    pub fn fail_with(&self, tool: &str, error: StepError) {
        self.lock().scripted.insert(tool.to_string(), Err(error));
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.lock().calls.iter().filter(|(name, _)| name == tool).count()
    }
}

#[async_trait]
impl ToolBackend for InMemoryTools {
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolReply, StepError> {
        let mut state = self.lock();
        state.calls.push((tool.to_string(), arguments.clone()));

        if let Some(scripted) = state.scripted.get(tool) {
            return scripted.clone();
        }

        match tool {
            "html_to_pdf" => {
                let filename = arguments
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or("document.pdf");
                Ok(ToolReply::Json(json!({
                    "url": format!("https://files.docmint.test/{filename}")
                })))
            }
            "mint_nft" => {
                state.minted += 1;
                Ok(ToolReply::Json(json!({
                    "tx_id": format!("tx-{}", state.minted),
                    "policy_id": "policy-test",
                })))
            }
            other => Err(StepError::Rejected {
                status: 404,
                body: format!("unknown tool {other}"),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    pinned: Vec<(String, String, Value)>,
    failure: Option<StepError>,
}

/// Content store kept in memory; CIDs are sequential.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    state: Mutex<StoreState>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_with(&self, error: StepError) {
        self.lock().failure = Some(error);
    }

    /// `(cid, name, document)` of every pinned document.
    pub fn pinned(&self) -> Vec<(String, String, Value)> {
        self.lock().pinned.clone()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn pin_json(&self, name: &str, document: &Value) -> Result<String, StepError> {
        let mut state = self.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        let cid = format!("bafymem{}", state.pinned.len() + 1);
        state
            .pinned
            .push((cid.clone(), name.to_string(), document.clone()));
        Ok(cid)
    }
}
