use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{
    error::ServiceError,
    protocol::{FinishReason, GuidedConstraint},
};

/// Exactly one prompt representation, by construction.
#[derive(Debug, Clone)]
pub enum PromptInput {
    Text(String),
    Tokens(Vec<u32>),
}

impl PromptInput {
    /// Builds from the two optional wire-level forms; both or neither is a
    /// client error.
    pub fn from_parts(
        text: Option<String>,
        token_ids: Option<Vec<u32>>,
    ) -> Result<Self, ServiceError> {
        match (text, token_ids) {
            (Some(text), None) => Ok(PromptInput::Text(text)),
            (None, Some(ids)) => Ok(PromptInput::Tokens(ids)),
            _ => Err(ServiceError::InvalidRequest(
                "either prompt or prompt token ids must be provided, but not both".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SamplingOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

/// Engine-facing generation request, immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: PromptInput,
    pub sampling: SamplingOptions,
    pub stop: Vec<String>,
    pub stop_token_ids: Vec<u32>,
    pub max_tokens: usize,
    pub n: usize,
    pub echo: bool,
    pub logprobs: Option<usize>,
    pub guided: Option<GuidedConstraint>,
}

/// One generation step for one choice. Token ids, text and logprobs are
/// cumulative; `finish_reason` is set exactly once, on the terminal snapshot.
#[derive(Debug, Clone)]
pub struct GenerationSnapshot {
    pub choice_index: usize,
    pub token_ids: Vec<u32>,
    pub text: String,
    pub logprobs: Option<Vec<f32>>,
    pub finish_reason: Option<FinishReason>,
}

pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<GenerationSnapshot, ServiceError>> + Send>>;

/// Opaque producer of generation snapshots. Snapshots for all `n` choices are
/// multiplexed on the one returned stream.
#[async_trait]
pub trait TokenStreamSource: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<SnapshotStream, ServiceError>;

    /// Tokenizes raw prompt text. The tokenizer itself is an engine detail.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>, ServiceError>;

    fn max_model_len(&self) -> usize;

    async fn health(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_input_requires_exactly_one_form() {
        assert!(PromptInput::from_parts(Some("hi".into()), None).is_ok());
        assert!(PromptInput::from_parts(None, Some(vec![1, 2])).is_ok());
        assert!(matches!(
            PromptInput::from_parts(None, None),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            PromptInput::from_parts(Some("hi".into()), Some(vec![1])),
            Err(ServiceError::InvalidRequest(_))
        ));
    }
}
