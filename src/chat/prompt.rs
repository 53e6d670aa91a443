use crate::{
    config::AppConfig,
    engine::{GenerationRequest, PromptInput, SamplingOptions, TokenStreamSource},
    error::ServiceError,
    protocol::{ChatCompletionRequest, ChatMessage, GuidedConstraint},
};

/// Opaque chat-template seam: turns a message history into the prompt string
/// fed to the engine.
pub trait PromptRenderer: Send + Sync {
    fn render(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
        response_role: &str,
    ) -> Result<String, ServiceError>;
}

/// Plain role-tagged transcript, one message per line, with an optional
/// generation prompt suffix for the response role.
pub struct TranscriptRenderer;

impl PromptRenderer for TranscriptRenderer {
    fn render(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
        response_role: &str,
    ) -> Result<String, ServiceError> {
        if messages.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "messages must not be empty".into(),
            ));
        }
        let mut prompt = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        if add_generation_prompt {
            prompt.push_str(&format!("\n{response_role}:"));
        }
        Ok(prompt)
    }
}

/// Validated, engine-ready request plus the prompt token count both response
/// paths need for usage accounting.
pub struct PreparedGeneration {
    pub request: GenerationRequest,
    pub prompt_tokens: usize,
}

/// Validates the chat request and resolves the token budget. Runs once, before
/// any generation starts; nothing here can fail mid-stream.
pub fn prepare_generation(
    chat: &ChatCompletionRequest,
    config: &AppConfig,
    renderer: &dyn PromptRenderer,
    source: &dyn TokenStreamSource,
) -> Result<PreparedGeneration, ServiceError> {
    if chat.model != config.model_id {
        return Err(ServiceError::ModelNotServed(chat.model.clone()));
    }

    let logprobs = chat.logprob_count()?;
    let guided = GuidedConstraint::from_request(chat)?;

    let response_role = chat.response_role(&config.response_role);
    let rendered = renderer.render(&chat.messages, chat.add_generation_prompt(), response_role)?;

    let token_ids = source.tokenize(&rendered)?;
    let prompt_tokens = token_ids.len();
    let max_tokens = resolve_token_budget(prompt_tokens, chat.max_tokens, source.max_model_len())?;

    let request = GenerationRequest {
        model: chat.model.clone(),
        prompt: PromptInput::Tokens(token_ids),
        sampling: SamplingOptions {
            temperature: chat.temperature.or(Some(config.temperature)),
            top_p: chat.top_p.or(Some(config.top_p)),
            top_k: chat.top_k,
            presence_penalty: chat.presence_penalty,
            frequency_penalty: chat.frequency_penalty,
        },
        stop: chat.stop.clone().unwrap_or_default(),
        stop_token_ids: chat.stop_token_ids.clone().unwrap_or_default(),
        max_tokens,
        n: chat.n(),
        echo: chat.echo(),
        logprobs,
        guided,
    };

    Ok(PreparedGeneration {
        request,
        prompt_tokens,
    })
}

/// Defaults `max_tokens` to the remaining context window and rejects requests
/// that would overrun it.
fn resolve_token_budget(
    prompt_tokens: usize,
    max_tokens: Option<usize>,
    max_model_len: usize,
) -> Result<usize, ServiceError> {
    let max_tokens = max_tokens.unwrap_or_else(|| max_model_len.saturating_sub(prompt_tokens));
    if prompt_tokens + max_tokens > max_model_len {
        return Err(ServiceError::ContextLengthExceeded {
            max_model_len,
            requested: prompt_tokens + max_tokens,
            prompt_tokens,
            max_tokens,
        });
    }
    Ok(max_tokens)
}
