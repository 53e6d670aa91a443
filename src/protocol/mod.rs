mod request;
mod response;

pub use request::{ChatCompletionRequest, ChatMessage, GuidedConstraint};
pub use response::{
    ChatCompletionChoice, ChatCompletionChunk, ChatCompletionResponse, ChatCompletionStreamChoice,
    DeltaMessage, FinishReason, RequestIdentity, UsageInfo,
};
