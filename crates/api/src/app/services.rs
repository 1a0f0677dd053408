//! Service wiring: ledger, pipeline backends, orchestrator and status reads.

use std::sync::Arc;

use docmint_infra::AppConfig;
use docmint_infra::jobs::{
    InMemoryJobRegistry, JobOrchestrator, OrchestratorConfig, StatusQueryService,
};
use docmint_payments::{Amount, LedgerGateway, MasumiConfig, MasumiLedger, PaymentGateway};
use docmint_pipeline::{
    PinningClient, PinningConfig, PipelineConfig, PipelineExecutor, ToolClient, ToolClientConfig,
};

/// Details echoed back to buyers in job receipts.
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub agent_identifier: String,
    pub seller_vkey: String,
    pub amount: Amount,
}

/// Everything the handlers need.
pub struct AppServices {
    pub orchestrator: Arc<JobOrchestrator<InMemoryJobRegistry>>,
    pub status: StatusQueryService<InMemoryJobRegistry>,
    pub agent: AgentInfo,
}

impl AppServices {
    /// Wire services around an existing gateway and pipeline.
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        pipeline: PipelineExecutor,
        orchestrator_config: OrchestratorConfig,
        agent: AgentInfo,
    ) -> Self {
        let registry = InMemoryJobRegistry::arc();
        let orchestrator = Arc::new(JobOrchestrator::new(
            registry.clone(),
            gateway.clone(),
            Arc::new(pipeline),
            orchestrator_config,
        ));
        let status = StatusQueryService::new(registry, gateway);

        Self {
            orchestrator,
            status,
            agent,
        }
    }
}

/// Production wiring from configuration.
pub fn build_services(config: &AppConfig) -> anyhow::Result<Arc<AppServices>> {
    let ledger = MasumiLedger::new(
        MasumiConfig::new(
            config.payment_service_url.clone(),
            config.payment_api_key.clone(),
            config.network.clone(),
        )
        .with_timeout(config.request_timeout),
    )?;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        LedgerGateway::new(Arc::new(ledger), config.payment_poll_interval)
            .with_watch_limit(config.payment_watch_limit),
    );

    let tools = ToolClient::new(
        ToolClientConfig::new(
            config.tool_server_url.clone(),
            config.tool_server_api_key.clone(),
        )
        .with_timeout(config.request_timeout),
    )?;
    let pinning = PinningClient::new(
        PinningConfig::new(config.pinata_api_url.clone(), config.pinata_jwt.clone())
            .with_timeout(config.request_timeout),
    )?;
    let pipeline = PipelineExecutor::from_backends(
        Arc::new(tools),
        Arc::new(pinning),
        &PipelineConfig {
            publish_enabled: config.publish_enabled,
            mint_enabled: config.mint_enabled,
            step_timeout: config.step_timeout,
            ..Default::default()
        },
    );
    tracing::info!(steps = ?pipeline.step_names(), "pipeline configured");

    let orchestrator_config = OrchestratorConfig::new(config.agent_identifier.clone())
        .with_failure_settlement(config.failure_settlement);
    let agent = AgentInfo {
        agent_identifier: config.agent_identifier.clone(),
        seller_vkey: config.seller_vkey.clone(),
        amount: config.amount.clone(),
    };

    Ok(Arc::new(AppServices::new(
        gateway,
        pipeline,
        orchestrator_config,
        agent,
    )))
}
