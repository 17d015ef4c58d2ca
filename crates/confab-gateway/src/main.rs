use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use confab_gateway::app::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confab_gateway=info,tower_http=warn".into()),
        )
        .init();

    // load config: explicit CONFAB_CONFIG path > ./confab.toml, plus env
    // overrides. A broken config is a startup failure, not a per-event one.
    let config_path = std::env::var(confab_core::config::CONFIG_PATH_ENV).ok();
    let config = confab_core::config::ConfabConfig::load(config_path.as_deref())?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    info!(
        model = %config.openai.model,
        stream = config.openai.stream,
        transcript_limit = config.slack.transcript_limit,
        "configuration loaded"
    );

    let bridge = confab_slack::MentionBridge::new(&config.slack, config.openai.clone());
    let state = Arc::new(AppState::new(config, bridge));
    let router = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("confab gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
