use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use stackforge_core::events::TunnelMap;
use stackforge_llm::openai::{OpenAiBackend, OpenAiConfig};
use stackforge_runtime::{MemoryStore, OrchestratorConfig, OrchestratorRegistry};
use stackforge_sandbox::LocalProvisioner;
use stackforge_server::{AppState, ServerConfig, router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    std::fs::create_dir_all(&config.workspace_dir).expect("failed to create workspace directory");

    let backend = Arc::new(OpenAiBackend::new(OpenAiConfig {
        api_key: config.openai_api_key.clone(),
        base_url: config.openai_base_url.clone(),
        model: config.model.clone(),
        fast_model: config.fast_model.clone(),
    }));
    let orchestrator_config = OrchestratorConfig::default();
    let preview_port = orchestrator_config.preview_port;
    let provisioner = Arc::new(LocalProvisioner::new(
        &config.workspace_dir,
        TunnelMap::from([(preview_port, format!("http://localhost:{preview_port}"))]),
    ));
    let registry = OrchestratorRegistry::new(
        Arc::new(MemoryStore::new()),
        backend,
        provisioner,
        orchestrator_config,
    );
    let _sweeper = registry.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs));

    let state = AppState::new(Arc::clone(&registry), config.stack_prompt.clone());
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    tracing::info!(%addr, "stackforge server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl+c");
            tracing::info!("shutting down");
            registry.shutdown().await;
        })
        .await
        .expect("server failed");
}
