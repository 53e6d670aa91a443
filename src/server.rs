use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
};
use futures::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    chat::{ChatResponseBuilder, ChatStreamEncoder, PromptRenderer, StreamFrame, prepare_generation},
    config::AppConfig,
    engine::EngineHandle,
    error::ServiceError,
    protocol::{ChatCompletionRequest, RequestIdentity},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<EngineHandle>,
    pub renderer: Arc<dyn PromptRenderer>,
}

pub fn build_router(
    config: Arc<AppConfig>,
    engine: Arc<EngineHandle>,
    renderer: Arc<dyn PromptRenderer>,
) -> Router {
    let state = AppState {
        config,
        engine,
        renderer,
    };

    Router::new()
        .route("/v1/chat/completions", post(create_chat_completion))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bearer check against the configured secret. Missing header and wrong token
/// are distinct failures (401 vs 403).
async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let Some(expected) = state.config.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        None => Err(ServiceError::MissingAuthorization),
        Some(value) if value != format!("Bearer {expected}") => Err(ServiceError::InvalidApiKey),
        Some(_) => Ok(next.run(request).await),
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ServiceError> {
    if state.engine.healthy().await {
        Ok(Json(serde_json::json!({"status": "ok"})))
    } else {
        Err(ServiceError::EngineUnavailable(
            state.engine.state().as_str().into(),
        ))
    }
}

async fn create_chat_completion(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ServiceError> {
    let prepared = prepare_generation(
        &request,
        &state.config,
        state.renderer.as_ref(),
        state.engine.source().as_ref(),
    )?;
    let identity = RequestIdentity::mint();
    info!(
        id = %identity.id,
        model = %request.model,
        n = prepared.request.n,
        stream = request.stream(),
        prompt_tokens = prepared.prompt_tokens,
        "chat completion request"
    );

    let prompt_tokens = prepared.prompt_tokens;
    let snapshots = state.engine.generate(prepared.request).await?;

    if request.stream() {
        let encoder = ChatStreamEncoder::new(
            &request,
            &state.config.response_role,
            identity,
            prompt_tokens,
        );
        let frames = encoder.encode(snapshots).map(StreamFrame::into_event);
        Ok(Sse::new(frames).into_response())
    } else {
        let builder = ChatResponseBuilder::new(
            &request,
            &state.config.response_role,
            identity,
            prompt_tokens,
        );
        Ok(Json(builder.build(snapshots).await?).into_response())
    }
}
