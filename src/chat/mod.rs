mod full;
mod prompt;
mod stream;
mod usage;

pub use full::ChatResponseBuilder;
pub use prompt::{PreparedGeneration, PromptRenderer, TranscriptRenderer, prepare_generation};
pub use stream::{ChatStreamEncoder, ChoiceStreamState, StreamFrame};
pub use usage::{full_usage, streaming_usage};

use crate::protocol::ChatCompletionRequest;

/// Content to echo back before any generated delta: the last input message,
/// when `echo` is set, its role matches the response role, and it is
/// non-empty.
pub(crate) fn echo_content(request: &ChatCompletionRequest, response_role: &str) -> Option<String> {
    if !request.echo() {
        return None;
    }
    request
        .messages
        .last()
        .filter(|m| m.role == response_role && !m.content.is_empty())
        .map(|m| m.content.clone())
}
