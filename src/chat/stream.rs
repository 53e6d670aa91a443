use std::collections::HashMap;

use axum::response::sse::Event;
use futures::{Stream, StreamExt};

use crate::{
    chat::{echo_content, usage},
    engine::{GenerationSnapshot, SnapshotStream},
    error::ServiceError,
    protocol::{
        ChatCompletionChunk, ChatCompletionRequest, ChatCompletionStreamChoice, DeltaMessage,
        FinishReason, RequestIdentity, UsageInfo,
    },
};

const CHUNK_OBJECT: &str = "chat.completion.chunk";
const DONE_SENTINEL: &str = "[DONE]";

/// One frame of the SSE response body.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    /// Error envelope sent in-stream; always followed by the sentinel.
    Error(serde_json::Value),
    /// Terminal sentinel, always last, exactly once.
    Done,
}

impl StreamFrame {
    pub fn into_event(self) -> Result<Event, axum::Error> {
        match self {
            StreamFrame::Chunk(chunk) => Event::default().json_data(&chunk),
            StreamFrame::Error(envelope) => Event::default().json_data(&envelope),
            StreamFrame::Done => Ok(Event::default().data(DONE_SENTINEL)),
        }
    }
}

/// Incremental delta computed from one cumulative snapshot.
#[derive(Debug)]
struct SnapshotDelta {
    text: String,
    logprobs: Option<Vec<f32>>,
}

/// Per-choice tracking state. Advanced only on successful delta computation so
/// a rejected snapshot cannot desynchronize later deltas.
#[derive(Debug, Default)]
pub struct ChoiceStreamState {
    previous_text_length: usize,
    previous_token_count: usize,
    finish_emitted: bool,
}

impl ChoiceStreamState {
    fn advance(&mut self, snapshot: &GenerationSnapshot) -> Result<SnapshotDelta, ServiceError> {
        let text = match snapshot.text.get(self.previous_text_length..) {
            Some(delta) => delta.to_string(),
            None => {
                return Err(ServiceError::ProtocolViolation(format!(
                    "cumulative text for choice {} is not a prefix extension \
                     ({} -> {} bytes)",
                    snapshot.choice_index,
                    self.previous_text_length,
                    snapshot.text.len()
                )));
            }
        };
        if snapshot.token_ids.len() < self.previous_token_count {
            return Err(ServiceError::ProtocolViolation(format!(
                "cumulative token count for choice {} shrank from {} to {}",
                snapshot.choice_index,
                self.previous_token_count,
                snapshot.token_ids.len()
            )));
        }

        let logprobs = snapshot
            .logprobs
            .as_ref()
            .map(|lp| lp.get(self.previous_token_count..).unwrap_or(&[]).to_vec());

        self.previous_text_length = snapshot.text.len();
        self.previous_token_count = snapshot.token_ids.len();
        Ok(SnapshotDelta { text, logprobs })
    }
}

/// Turns a multiplexed snapshot stream into an ordered frame sequence:
/// one role frame per choice, an optional echo frame per choice, content
/// deltas, one finish frame per choice carrying usage, and the terminal
/// sentinel. Frames are produced lazily, one per consumer demand.
pub struct ChatStreamEncoder {
    identity: RequestIdentity,
    model: String,
    response_role: String,
    echo: Option<String>,
    n: usize,
    prompt_tokens: usize,
    choices: HashMap<usize, ChoiceStreamState>,
}

impl ChatStreamEncoder {
    pub fn new(
        request: &ChatCompletionRequest,
        configured_role: &str,
        identity: RequestIdentity,
        prompt_tokens: usize,
    ) -> Self {
        let response_role = request.response_role(configured_role).to_string();
        let echo = echo_content(request, &response_role);
        let n = request.n();
        Self {
            identity,
            model: request.model.clone(),
            response_role,
            echo,
            n,
            prompt_tokens,
            choices: (0..n).map(|i| (i, ChoiceStreamState::default())).collect(),
        }
    }

    fn chunk(
        &self,
        index: usize,
        delta: DeltaMessage,
        logprobs: Option<Vec<f32>>,
        finish_reason: Option<FinishReason>,
        usage: Option<UsageInfo>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.identity.id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.identity.created,
            model: self.model.clone(),
            choices: vec![ChatCompletionStreamChoice {
                index,
                delta,
                logprobs,
                finish_reason,
            }],
            usage,
        }
    }

    /// Applies one snapshot: `None` when the choice already finished (engines
    /// may over-deliver), otherwise the next content or finish chunk.
    fn apply(
        &mut self,
        snapshot: &GenerationSnapshot,
    ) -> Result<Option<ChatCompletionChunk>, ServiceError> {
        let state = self.choices.get_mut(&snapshot.choice_index).ok_or_else(|| {
            ServiceError::ProtocolViolation(format!(
                "choice index {} out of range for n={}",
                snapshot.choice_index, self.n
            ))
        })?;
        if state.finish_emitted {
            return Ok(None);
        }

        let delta = state.advance(snapshot)?;
        let usage = match snapshot.finish_reason {
            Some(_) => {
                state.finish_emitted = true;
                Some(usage::streaming_usage(
                    self.prompt_tokens,
                    state.previous_token_count,
                ))
            }
            None => None,
        };

        Ok(Some(self.chunk(
            snapshot.choice_index,
            DeltaMessage::content(delta.text),
            delta.logprobs,
            snapshot.finish_reason,
            usage,
        )))
    }

    fn all_finished(&self) -> bool {
        self.choices.values().all(|s| s.finish_emitted)
    }

    /// Single-pass lazy frame stream. Role (and echo) frames go out on the
    /// first snapshot so an engine failure before any output surfaces as an
    /// error frame alone.
    pub fn encode(mut self, mut snapshots: SnapshotStream) -> impl Stream<Item = StreamFrame> {
        async_stream::stream! {
            let mut first_iteration = true;
            while let Some(item) = snapshots.next().await {
                let snapshot = match item {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        tracing::warn!(error = %err, "engine stream failed");
                        yield StreamFrame::Error(err.to_envelope());
                        yield StreamFrame::Done;
                        return;
                    }
                };

                if first_iteration {
                    for index in 0..self.n {
                        let role = DeltaMessage::role(self.response_role.clone());
                        yield StreamFrame::Chunk(self.chunk(index, role, None, None, None));
                    }
                    if let Some(content) = self.echo.take() {
                        for index in 0..self.n {
                            let echo = DeltaMessage::content(content.clone());
                            yield StreamFrame::Chunk(self.chunk(index, echo, None, None, None));
                        }
                    }
                    first_iteration = false;
                }

                match self.apply(&snapshot) {
                    Ok(Some(chunk)) => yield StreamFrame::Chunk(chunk),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "rejecting malformed snapshot");
                        yield StreamFrame::Error(err.to_envelope());
                        yield StreamFrame::Done;
                        return;
                    }
                }

                if self.all_finished() {
                    break;
                }
            }
            yield StreamFrame::Done;
        }
    }
}
