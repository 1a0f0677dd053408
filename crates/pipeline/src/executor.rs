//! Runs the configured steps for one job.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{error, info};

use docmint_core::JobInput;

use crate::client::{ContentStore, ToolBackend};
use crate::error::{PipelineFailure, StepError};
use crate::steps::{ConvertStep, GenerateStep, MintStep, PipelineStep, PublishStep, StepContext};

/// Which optional steps run, and how long each may take.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub publish_enabled: bool,
    pub mint_enabled: bool,
    /// Upper bound for a single step, on top of each client's own timeout
    pub step_timeout: Duration,
    /// File name passed to the converter
    pub document_filename: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            publish_enabled: true,
            mint_enabled: true,
            step_timeout: Duration::from_secs(60),
            document_filename: "resume.pdf".to_string(),
        }
    }
}

/// Sequential pipeline executor.
///
/// Steps run in order; the first failure aborts the run and reports what
/// the earlier steps produced.
pub struct PipelineExecutor {
    steps: Vec<Box<dyn PipelineStep>>,
    step_timeout: Duration,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("steps", &self.step_names())
            .field("step_timeout", &self.step_timeout)
            .finish()
    }
}

impl PipelineExecutor {
    pub fn new(steps: Vec<Box<dyn PipelineStep>>, step_timeout: Duration) -> Self {
        Self {
            steps,
            step_timeout,
        }
    }

    /// Standard `generate → convert → [publish] → [mint]` pipeline.
    pub fn from_backends(
        tools: Arc<dyn ToolBackend>,
        store: Arc<dyn ContentStore>,
        config: &PipelineConfig,
    ) -> Self {
        let mut steps: Vec<Box<dyn PipelineStep>> = vec![
            Box::new(GenerateStep),
            Box::new(ConvertStep::new(tools.clone(), config.document_filename.clone())),
        ];
        if config.publish_enabled {
            steps.push(Box::new(PublishStep::new(store)));
        }
        if config.mint_enabled {
            steps.push(Box::new(MintStep::new(tools)));
        }
        Self::new(steps, config.step_timeout)
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on the job's input.
    ///
    /// Returns `{"status": "completed", <step>: <output>, ...}`.
    pub async fn run(&self, input: &JobInput) -> Result<Value, PipelineFailure> {
        let mut ctx = StepContext::new(input.text());
        let mut outputs = Map::new();

        for step in &self.steps {
            let name = step.name();
            info!(step = name, "pipeline step started");

            let outcome = match tokio::time::timeout(self.step_timeout, step.run(&mut ctx)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(StepError::Timeout(self.step_timeout)),
            };

            match outcome {
                Ok(output) => {
                    info!(step = name, "pipeline step completed");
                    outputs.insert(name.to_string(), output);
                }
                Err(error) => {
                    error!(step = name, error = %error, "pipeline step failed");
                    return Err(PipelineFailure {
                        step: name,
                        error,
                        partial: Value::Object(outputs),
                    });
                }
            }
        }

        let mut result = Map::new();
        result.insert("status".to_string(), Value::from("completed"));
        result.extend(outputs);
        Ok(Value::Object(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ToolReply;
    use crate::in_memory::{InMemoryContentStore, InMemoryTools};
    use crate::steps::{CONVERT_TOOL, MINT_TOOL};
    use async_trait::async_trait;

    fn input(text: &str) -> JobInput {
        [("text", text)].into_iter().collect()
    }

    fn executor(
        tools: Arc<InMemoryTools>,
        store: Arc<InMemoryContentStore>,
        config: PipelineConfig,
    ) -> PipelineExecutor {
        PipelineExecutor::from_backends(tools, store, &config)
    }

    #[tokio::test]
    async fn full_pipeline_result_shape() {
        let tools = InMemoryTools::arc();
        let store = InMemoryContentStore::arc();
        let exec = executor(tools.clone(), store.clone(), PipelineConfig::default());

        let result = exec.run(&input("Name: Alex Chen\nSkills: Rust")).await.unwrap();

        assert_eq!(result["status"], "completed");
        assert_eq!(result["generate"]["display_name"], "Alex Chen");
        assert_eq!(result["convert"]["pdf_url"], "https://files.docmint.test/resume.pdf");
        assert_eq!(result["publish"]["ipfs_cid"], "bafymem1");
        assert_eq!(result["mint"]["tx_id"], "tx-1");
        assert_eq!(tools.calls_to(MINT_TOOL), 1);
        assert_eq!(store.pinned().len(), 1);
    }

    #[tokio::test]
    async fn raw_mint_reply_still_completes() {
        let tools = InMemoryTools::arc();
        tools.reply_with(
            MINT_TOOL,
            ToolReply::Raw("NFT minted: tx abc123 on preprod".into()),
        );
        let exec = executor(tools, InMemoryContentStore::arc(), PipelineConfig::default());

        let result = exec.run(&input("Name: Alex Chen")).await.unwrap();

        assert_eq!(result["status"], "completed");
        assert!(result["mint"]["tx_id"].is_null());
        assert_eq!(result["mint"]["nft_result"], "NFT minted: tx abc123 on preprod");
    }

    #[tokio::test]
    async fn failure_aborts_remaining_steps() {
        let tools = InMemoryTools::arc();
        tools.fail_with(
            CONVERT_TOOL,
            StepError::Upstream {
                status: 502,
                body: "renderer down".into(),
            },
        );
        let store = InMemoryContentStore::arc();
        let exec = executor(tools.clone(), store.clone(), PipelineConfig::default());

        let failure = exec.run(&input("Name: Bo")).await.unwrap_err();

        assert_eq!(failure.step, "convert");
        assert!(failure.partial.get("generate").is_some());
        assert!(failure.partial.get("convert").is_none());
        assert_eq!(tools.calls_to(MINT_TOOL), 0);
        assert!(store.pinned().is_empty());
    }

    #[tokio::test]
    async fn optional_steps_can_be_disabled() {
        let tools = InMemoryTools::arc();
        let store = InMemoryContentStore::arc();
        let config = PipelineConfig {
            publish_enabled: false,
            ..Default::default()
        };
        let exec = executor(tools.clone(), store.clone(), config);

        assert_eq!(exec.step_names(), vec!["generate", "convert", "mint"]);
        let result = exec.run(&input("Name: Bo")).await.unwrap();

        assert!(result.get("publish").is_none());
        // minted straight from the document URL
        let mint_call = tools.calls().into_iter().find(|(t, _)| t == MINT_TOOL).unwrap();
        assert_eq!(mint_call.1["url"], "https://files.docmint.test/resume.pdf");
    }

    struct SlowStep;

    #[async_trait]
    impl PipelineStep for SlowStep {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _ctx: &mut StepContext) -> Result<Value, StepError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn step_timeout_is_enforced() {
        let exec = PipelineExecutor::new(
            vec![Box::new(GenerateStep), Box::new(SlowStep)],
            Duration::from_millis(20),
        );

        let failure = exec.run(&input("Name: Bo")).await.unwrap_err();
        assert_eq!(failure.step, "slow");
        assert_eq!(failure.error, StepError::Timeout(Duration::from_millis(20)));
    }
}
