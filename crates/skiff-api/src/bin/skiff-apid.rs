use std::sync::Arc;

use tracing::info;

use skiff_api::HttpApi;
use skiff_engine::TaskExecutor;
use skiff_kube::KubeStore;
use skiff_observe::{LoggerConfig, logger_init};

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    logger_init(&LoggerConfig::default())?;
    info!("logger initialized");

    // 2) Cluster store
    let namespace =
        std::env::var("SKIFF_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
    let store = KubeStore::try_default(&namespace).await?;
    info!("connected to cluster, namespace={namespace}");

    // 3) Executor + router
    let executor = Arc::new(TaskExecutor::new(Arc::new(store)));
    let router = HttpApi::new(executor).router();

    // 4) Serve
    let port: u16 = match std::env::var("SKIFF_API_PORT") {
        Ok(v) => v.parse()?,
        Err(_) => DEFAULT_PORT,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on 0.0.0.0:{port}");

    axum::serve(listener, router).await?;
    Ok(())
}
