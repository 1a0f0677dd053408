use anyhow::Context;

use docmint_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    docmint_observability::init_with(config.log_format);

    let services = docmint_api::app::services::build_services(&config)
        .context("failed to wire services")?;
    let app = docmint_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        agent = %config.agent_identifier,
        network = %config.network,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
