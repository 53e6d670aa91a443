use serde::{Deserialize, Serialize};

use crate::protocol::ChatMessage;

/// Terminal cause of a choice's completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Natural end or stop sequence hit.
    Stop,
    /// Token budget exhausted.
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl UsageInfo {
    /// The only constructor; upholds `total == prompt + completion`.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Partial message carried by a stream chunk: a role announcement or a
/// content delta, never a full message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DeltaMessage {
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionStreamChoice {
    pub index: usize,
    pub delta: DeltaMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Vec<f32>>,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatCompletionStreamChoice>,
    /// Present only on a choice's finish chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: usize,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Vec<f32>>,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: UsageInfo,
}

/// Identifier and creation timestamp minted once per request and shared by
/// every chunk and the final response.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub id: String,
    pub created: u64,
}

impl RequestIdentity {
    pub fn mint() -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            created: chrono::Utc::now().timestamp() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_is_sum() {
        let usage = UsageInfo::new(100, 42);
        assert_eq!(usage.total_tokens, 142);
    }

    #[test]
    fn delta_serialization_omits_unset_fields() {
        let json = serde_json::to_value(DeltaMessage::role("assistant")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant"}));

        let json = serde_json::to_value(DeltaMessage::content("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hi"}));
    }

    #[test]
    fn finish_reason_wire_names() {
        assert_eq!(serde_json::to_value(FinishReason::Stop).unwrap(), "stop");
        assert_eq!(
            serde_json::to_value(FinishReason::Length).unwrap(),
            "length"
        );
    }

    #[test]
    fn identities_are_unique_per_request() {
        let a = RequestIdentity::mint();
        let b = RequestIdentity::mint();
        assert!(a.id.starts_with("chatcmpl-"));
        assert_ne!(a.id, b.id);
    }
}
