//! Pipeline steps and the context they share.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::{ContentStore, ToolBackend, ToolReply};
use crate::document::{generate_document, short_token_name};
use crate::error::StepError;
use crate::parse::{Locator, extract_locator};

pub const CONVERT_TOOL: &str = "html_to_pdf";
pub const MINT_TOOL: &str = "mint_nft";

/// State threaded through the steps of one run.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub text: String,
    pub display_name: Option<String>,
    pub token_name: Option<String>,
    pub html: Option<String>,
    /// URL of the converted document
    pub locator: Option<String>,
    /// `ipfs://` URI of the pinned metadata
    pub metadata_uri: Option<String>,
}

impl StepContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

fn missing(what: &str) -> StepError {
    StepError::Unusable(format!("no {what} from an earlier step"))
}

/// One stage of the pipeline.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the step, returning its output for the job result.
    async fn run(&self, ctx: &mut StepContext) -> Result<Value, StepError>;
}

/// Renders the input text into an HTML document.
#[derive(Debug, Default)]
pub struct GenerateStep;

#[async_trait]
impl PipelineStep for GenerateStep {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<Value, StepError> {
        let document = generate_document(&ctx.text);
        let output = json!({
            "html_length": document.html.len(),
            "display_name": document.display_name,
        });

        ctx.token_name = Some(short_token_name(&document.display_name));
        ctx.display_name = Some(document.display_name);
        ctx.html = Some(document.html);
        Ok(output)
    }
}

/// Converts the HTML document to PDF on the tool server.
pub struct ConvertStep {
    tools: Arc<dyn ToolBackend>,
    filename: String,
}

impl ConvertStep {
    pub fn new(tools: Arc<dyn ToolBackend>, filename: impl Into<String>) -> Self {
        Self {
            tools,
            filename: filename.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for ConvertStep {
    fn name(&self) -> &'static str {
        "convert"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<Value, StepError> {
        let html = ctx.html.as_deref().ok_or_else(|| missing("document"))?;
        let reply = self
            .tools
            .call(CONVERT_TOOL, json!({ "html": html, "filename": self.filename }))
            .await?;

        let raw = reply.to_text();
        let url = match extract_locator(&raw) {
            Locator::Found(url) => url,
            Locator::Unparseable(raw) => {
                return Err(StepError::Unusable(format!("no document URL in reply: {raw}")));
            }
        };
        debug!(%url, "document converted");

        ctx.locator = Some(url.clone());
        Ok(json!({ "pdf_result": raw, "pdf_url": url }))
    }
}

/// Pins NFT metadata describing the converted document.
pub struct PublishStep {
    store: Arc<dyn ContentStore>,
}

impl PublishStep {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

/// Metadata document for a converted document.
pub fn metadata_document(token_name: &str, display_name: &str, locator: &str) -> Value {
    json!({
        "name": token_name,
        "description": format!("{display_name} document"),
        "mediaType": "application/pdf",
        "files": [{
            "name": format!("{token_name}.pdf"),
            "mediaType": "application/pdf",
            "src": locator,
        }],
    })
}

#[async_trait]
impl PipelineStep for PublishStep {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<Value, StepError> {
        let locator = ctx.locator.as_deref().ok_or_else(|| missing("document URL"))?;
        let token_name = ctx.token_name.as_deref().ok_or_else(|| missing("token name"))?;
        let display_name = ctx.display_name.as_deref().unwrap_or(token_name);

        let document = metadata_document(token_name, display_name, locator);
        let cid = self
            .store
            .pin_json(&format!("{token_name}.json"), &document)
            .await?;
        let uri = format!("ipfs://{cid}");

        ctx.metadata_uri = Some(uri.clone());
        Ok(json!({ "ipfs_cid": cid, "metadata_uri": uri }))
    }
}

/// Mints an NFT pointing at the metadata (or the document when nothing was published).
pub struct MintStep {
    tools: Arc<dyn ToolBackend>,
}

impl MintStep {
    pub fn new(tools: Arc<dyn ToolBackend>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl PipelineStep for MintStep {
    fn name(&self) -> &'static str {
        "mint"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<Value, StepError> {
        let url = ctx
            .metadata_uri
            .as_deref()
            .or(ctx.locator.as_deref())
            .ok_or_else(|| missing("asset URL"))?;
        let token_name = ctx.token_name.as_deref().ok_or_else(|| missing("token name"))?;

        let reply = self
            .tools
            .call(MINT_TOOL, json!({ "url": url, "token_name": token_name }))
            .await?;

        // A reply that is not JSON still reports a mint; keep its text as the result.
        if let ToolReply::Raw(text) = &reply {
            warn!(reply = %text, "mint reply is not JSON, keeping raw text");
            return Ok(json!({
                "tx_id": null,
                "policy_id": null,
                "token_name": token_name,
                "nft_result": text,
            }));
        }

        let tx_id = reply
            .field("tx_id")
            .ok_or_else(|| StepError::Unusable(format!("no tx_id in reply: {}", reply.to_text())))?;

        Ok(json!({
            "tx_id": tx_id,
            "policy_id": reply.field("policy_id"),
            "token_name": token_name,
            "nft_result": reply.to_text(),
        }))
    }
}
