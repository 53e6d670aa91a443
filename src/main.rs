use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_completion_service::{
    AppConfig, EngineHandle, StubTokenSource, TranscriptRenderer, build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(?config.listen_addr, model = %config.model_id, "starting chat completion service");

    // The stub engine stands in until a real backend is wired up.
    let engine = Arc::new(EngineHandle::new(Arc::new(StubTokenSource::new(
        StubTokenSource::DEFAULT_REPLY,
        config.max_model_len,
    ))));
    engine.mark_ready();

    let router = build_router(config.clone(), engine, Arc::new(TranscriptRenderer));

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,axum::rejection=trace".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
