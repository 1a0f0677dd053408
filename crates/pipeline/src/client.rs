//! Remote collaborators of the pipeline.
//!
//! The tool server hosts `html_to_pdf` and `mint_nft`. Each call is a
//! `POST {base}/tools/{name}` with `{"arguments": {...}}`; replies follow the
//! tool-call result shape `{"content":[{"type":"text","text":...}], "isError":bool}`.
//! Pinning goes to a Pinata-compatible `pinJSONToIPFS` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::StepError;

/// Decoded tool reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReply {
    Json(Value),
    /// Reply text that is not JSON
    Raw(String),
}

impl ToolReply {
    /// Classify reply text: JSON when it parses, raw otherwise.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => ToolReply::Json(value),
            Err(_) => ToolReply::Raw(text.to_string()),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            ToolReply::Json(value) => value.to_string(),
            ToolReply::Raw(text) => text.clone(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            ToolReply::Json(value) => value.get(key).and_then(Value::as_str),
            ToolReply::Raw(_) => None,
        }
    }
}

/// Invokes a named remote tool.
#[async_trait]
pub trait ToolBackend: Send + Sync + 'static {
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolReply, StepError>;
}

#[async_trait]
impl<T: ToolBackend> ToolBackend for Arc<T> {
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolReply, StepError> {
        (**self).call(tool, arguments).await
    }
}

/// Pins JSON documents to a content-addressed store.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Pin `document` under `name`, returning its content identifier.
    async fn pin_json(&self, name: &str, document: &Value) -> Result<String, StepError>;
}

#[async_trait]
impl<S: ContentStore> ContentStore for Arc<S> {
    async fn pin_json(&self, name: &str, document: &Value) -> Result<String, StepError> {
        (**self).pin_json(name, document).await
    }
}

fn build_client(timeout: Duration) -> Result<Client, StepError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StepError::Transport(format!("failed to build HTTP client: {e}")))
}

fn with_bearer(request: RequestBuilder, token: &str) -> RequestBuilder {
    if token.is_empty() {
        request
    } else {
        request.header(header::AUTHORIZATION, format!("Bearer {token}"))
    }
}

async fn send(request: RequestBuilder, timeout: Duration) -> Result<Response, StepError> {
    let response = request.send().await.map_err(|e| {
        error!(error = %e, "remote call failed");
        if e.is_timeout() {
            StepError::Timeout(timeout)
        } else {
            StepError::Transport(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), %body, "remote call returned an error status");
        return Err(StepError::from_status(status.as_u16(), body));
    }
    Ok(response)
}

#[derive(Debug, Clone)]
pub struct ToolClientConfig {
    pub base_url: String,
    /// Sent as a bearer token when non-empty
    pub api_key: String,
    pub timeout: Duration,
}

impl ToolClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP tool-server client.
#[derive(Debug, Clone)]
pub struct ToolClient {
    client: Client,
    config: ToolClientConfig,
}

impl ToolClient {
    pub fn new(config: ToolClientConfig) -> Result<Self, StepError> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }
}

/// Unwrap a tool-call envelope into the reply it carries.
fn decode_envelope(body: &str) -> Result<ToolReply, StepError> {
    let envelope = match ToolReply::from_text(body) {
        ToolReply::Json(value) => value,
        raw => return Ok(raw),
    };

    let text = envelope
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| items.iter().find_map(|item| item.get("text")))
        .and_then(Value::as_str);

    if envelope.get("isError").and_then(Value::as_bool) == Some(true) {
        let message = text.map(str::to_string).unwrap_or_else(|| envelope.to_string());
        return Err(StepError::Logical(message));
    }

    let reply = match text {
        Some(text) => ToolReply::from_text(text),
        None if envelope.get("content").is_some() => {
            return Err(StepError::Unusable("tool returned no content".to_string()));
        }
        None => ToolReply::Json(envelope),
    };

    if let ToolReply::Json(value) = &reply {
        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(StepError::Logical(message));
        }
    }
    Ok(reply)
}

#[async_trait]
impl ToolBackend for ToolClient {
    async fn call(&self, tool: &str, arguments: Value) -> Result<ToolReply, StepError> {
        let url = format!("{}/tools/{}", self.config.base_url.trim_end_matches('/'), tool);
        debug!(%url, tool, "calling tool");

        let request = with_bearer(self.client.post(&url), &self.config.api_key)
            .json(&json!({ "arguments": arguments }));
        let response = send(request, self.config.timeout).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;

        decode_envelope(&body)
    }
}

#[derive(Debug, Clone)]
pub struct PinningConfig {
    /// e.g. `https://api.pinata.cloud`
    pub base_url: String,
    pub jwt: String,
    pub timeout: Duration,
}

impl PinningConfig {
    pub fn new(base_url: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            jwt: jwt.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Pinata `pinJSONToIPFS` client.
#[derive(Debug, Clone)]
pub struct PinningClient {
    client: Client,
    config: PinningConfig,
}

impl PinningClient {
    pub fn new(config: PinningConfig) -> Result<Self, StepError> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }
}

#[async_trait]
impl ContentStore for PinningClient {
    async fn pin_json(&self, name: &str, document: &Value) -> Result<String, StepError> {
        let url = format!(
            "{}/pinning/pinJSONToIPFS",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(%url, name, "pinning document");

        let body = json!({
            "pinataContent": document,
            "pinataMetadata": { "name": name },
        });
        let request = with_bearer(self.client.post(&url), &self.config.jwt).json(&body);
        let response = send(request, self.config.timeout).await?;

        let text = response
            .text()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        ToolReply::from_text(&text)
            .field("IpfsHash")
            .map(str::to_string)
            .ok_or_else(|| StepError::Unusable(format!("pinning reply without IpfsHash: {text}")))
    }
}
