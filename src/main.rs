pub mod collector;
pub mod compute;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod util;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::{BuildInfoCollector, QuotaCollector};
use crate::compute::ComputeClient;
use crate::credential::TokenSource;
use crate::credential::metadata::MetadataServer;
use crate::credential::types::CredentialsFile;
use crate::metrics::Registry;

#[tokio::main]
async fn main() {
    logging::init_tracing();

    if let Err(e) = run().await {
        tracing::error!("启动失败: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = config::Config::load()?;
    cfg.validate()?;

    let creds = CredentialsFile::load(&cfg.credentials_path).await?;
    let metadata = MetadataServer::new(&cfg.metadata_host, Duration::from_millis(cfg.http_timeout_ms))?;

    let (identity, source) = identity::resolve(&cfg.project_id, creds.as_ref(), &metadata)
        .await
        .context("解析项目 ID 失败")?;
    tracing::info!("监控项目: {identity}（来源: {source:?}）");

    let tokens = Arc::new(TokenSource::from_config(&cfg, creds.as_ref(), metadata)?);
    tracing::info!("access token 来源: {}", tokens.describe());

    let client = ComputeClient::new(&cfg, tokens).context("初始化 ComputeClient 失败")?;

    let mut registry = Registry::new();
    registry.register(Arc::new(QuotaCollector::new(
        client,
        identity.clone(),
        cfg.log_level(),
    )))?;
    registry.register(Arc::new(BuildInfoCollector::new()))?;

    let state = Arc::new(gateway::AppState {
        registry: Arc::new(registry),
        metrics_path: cfg.metrics_path.trim().to_string(),
        project: identity.to_string(),
    });
    let app = gateway::router(state);

    let addr = cfg.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("绑定监听端口失败")?;

    tracing::info!(
        "Server listening on http://{addr}{}",
        cfg.metrics_path.trim()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务异常退出")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("收到退出信号，准备关闭服务...");
}
