use async_trait::async_trait;
use futures::stream;

use crate::{
    engine::{GenerationRequest, GenerationSnapshot, SnapshotStream, TokenStreamSource},
    error::ServiceError,
    protocol::FinishReason,
};

/// Deterministic in-process engine for local runs and tests. Streams a canned
/// reply word by word as cumulative snapshots, round-robin across choices.
pub struct StubTokenSource {
    reply: String,
    max_model_len: usize,
}

impl StubTokenSource {
    pub const DEFAULT_REPLY: &'static str =
        "The Golden State Warriors won 73 games in the 2015-16 season.";

    pub fn new(reply: impl Into<String>, max_model_len: usize) -> Self {
        Self {
            reply: reply.into(),
            max_model_len,
        }
    }
}

impl Default for StubTokenSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REPLY, 4096)
    }
}

#[async_trait]
impl TokenStreamSource for StubTokenSource {
    async fn generate(&self, request: GenerationRequest) -> Result<SnapshotStream, ServiceError> {
        let words: Vec<&str> = self.reply.split_whitespace().collect();
        if words.is_empty() {
            let empty: Vec<Result<GenerationSnapshot, ServiceError>> = Vec::new();
            return Ok(Box::pin(stream::iter(empty)));
        }
        let budget_hit = request.max_tokens < words.len();
        let steps = words.len().min(request.max_tokens).max(1);

        let mut snapshots = Vec::with_capacity(steps * request.n);
        for step in 0..steps {
            let text = words[..=step.min(words.len() - 1)].join(" ");
            let token_ids: Vec<u32> = (0..=step as u32).collect();
            let finish_reason = (step + 1 == steps).then_some(if budget_hit {
                FinishReason::Length
            } else {
                FinishReason::Stop
            });
            for choice_index in 0..request.n {
                snapshots.push(Ok(GenerationSnapshot {
                    choice_index,
                    token_ids: token_ids.clone(),
                    text: text.clone(),
                    logprobs: None,
                    finish_reason,
                }));
            }
        }

        Ok(Box::pin(stream::iter(snapshots)))
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>, ServiceError> {
        Ok((0..text.split_whitespace().count() as u32).collect())
    }

    fn max_model_len(&self) -> usize {
        self.max_model_len
    }

    async fn health(&self) -> bool {
        true
    }
}
