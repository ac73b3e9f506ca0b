use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use cqrelay_agent::compose::Composer;
use cqrelay_agent::history::{ConversationStore, HistoryLimits};
use cqrelay_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use cqrelay_agent::runtime::AgentRuntime;
use cqrelay_core::config::{validate_api_key, OpenAiProviderConfig, RelayConfig};
use cqrelay_onebot::OneBotSender;

mod app;
mod dispatch;
mod http;

/// Relay private QQ messages from a OneBot gateway to an OpenAI-compatible
/// completion service.
#[derive(Debug, Parser)]
#[command(name = "cqrelay-gateway", version)]
struct Cli {
    /// Config file (defaults to $CQRELAY_CONFIG, then ~/.cqrelay/cqrelay.toml).
    #[arg(long)]
    config: Option<String>,

    /// Override `gateway.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cqrelay_gateway=info,cqrelay_agent=info,cqrelay_onebot=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > CQRELAY_CONFIG env > ~/.cqrelay/cqrelay.toml
    let config_path = cli.config.or_else(|| std::env::var("CQRELAY_CONFIG").ok());
    let mut config = RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        RelayConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let provider = build_provider(&config);
    let agent = AgentRuntime::new(
        provider,
        Composer::new(config.agent.clone()),
        Duration::from_secs(config.workers.call_timeout_secs),
    );
    let history = ConversationStore::new(HistoryLimits::from(&config.history));
    let sender = OneBotSender::new(config.onebot.base_url.clone())?;
    info!(onebot = %config.onebot.base_url, "OneBot messenger ready");

    let (queue_tx, queue_rx) = tokio::sync::mpsc::channel(config.workers.queue_capacity.max(1));
    let state = Arc::new(app::AppState::new(agent, history, sender, queue_tx));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers = dispatch::spawn_workers(
        Arc::clone(&state),
        queue_rx,
        config.workers.count,
        shutdown_rx,
    );

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!("cqrelay gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Workers share the state that owns the queue sender, so the queue never
    // closes on its own. Signal them, then let in-flight messages finish
    // (completion plus delivery, each bounded by the call timeout).
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(config.workers.call_timeout_secs.saturating_mul(2));
    let drain = async {
        for worker in workers {
            let _ = worker.await;
        }
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "workers still busy at shutdown");
    }
    info!("cqrelay gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Build the completion provider from config, reading `OPENAI_API_KEY` as
/// the fallback key.
fn build_provider(config: &RelayConfig) -> Box<dyn LlmProvider> {
    select_provider(
        config.providers.openai.as_ref(),
        std::env::var("OPENAI_API_KEY").ok(),
    )
}

/// Pick the completion provider.
///
/// The key comes from `providers.openai.api_key`, else from `env_key`. A
/// missing or malformed key yields a `NullProvider`, so the relay still
/// starts and every completion attempt fails with a logged error.
fn select_provider(
    openai: Option<&OpenAiProviderConfig>,
    env_key: Option<String>,
) -> Box<dyn LlmProvider> {
    let api_key = match openai.and_then(|o| o.api_key.clone()) {
        Some(key) => key,
        None => match env_key {
            Some(key) => {
                info!("OpenAI API key taken from env");
                key
            }
            None => {
                tracing::warn!("No LLM provider configured; completions will fail");
                return Box::new(NullProvider);
            }
        },
    };

    if let Err(e) = validate_api_key(&api_key) {
        tracing::warn!(
            code = e.code(),
            error = %e,
            "OpenAI API key rejected; completions will fail"
        );
        return Box::new(NullProvider);
    }

    let base_url = openai.map(|o| o.base_url.clone());
    let proxy = openai.and_then(|o| o.proxy.clone());
    let endpoint = base_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com".to_string());
    match cqrelay_agent::openai::OpenAiProvider::new(api_key, base_url, proxy.as_deref()) {
        Ok(provider) => {
            info!(
                base_url = %endpoint,
                proxy = proxy.as_deref().unwrap_or("none"),
                "LLM provider: OpenAI"
            );
            Box::new(provider)
        }
        Err(e) => {
            tracing::warn!(error = %e, "OpenAI client could not be built; completions will fail");
            Box::new(NullProvider)
        }
    }
}

/// Placeholder used when no usable provider is configured.
struct NullProvider;

#[async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no usable LLM provider configured; set providers.openai.api_key".to_string(),
        ))
    }
}
