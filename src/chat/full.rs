use std::collections::HashMap;

use futures::StreamExt;

use crate::{
    chat::{echo_content, usage},
    engine::{GenerationSnapshot, SnapshotStream},
    error::ServiceError,
    protocol::{
        ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
        RequestIdentity,
    },
};

const RESPONSE_OBJECT: &str = "chat.completion";

/// Builds the non-streaming response by reducing the snapshot stream to the
/// final snapshot of each choice. A blocking reduction, not incremental: it
/// waits for stream exhaustion before constructing anything.
pub struct ChatResponseBuilder {
    identity: RequestIdentity,
    model: String,
    response_role: String,
    echo: Option<String>,
    prompt_tokens: usize,
}

impl ChatResponseBuilder {
    pub fn new(
        request: &ChatCompletionRequest,
        configured_role: &str,
        identity: RequestIdentity,
        prompt_tokens: usize,
    ) -> Self {
        let response_role = request.response_role(configured_role).to_string();
        let echo = echo_content(request, &response_role);
        Self {
            identity,
            model: request.model.clone(),
            response_role,
            echo,
            prompt_tokens,
        }
    }

    pub async fn build(
        self,
        mut snapshots: SnapshotStream,
    ) -> Result<ChatCompletionResponse, ServiceError> {
        let mut finals: HashMap<usize, GenerationSnapshot> = HashMap::new();
        while let Some(item) = snapshots.next().await {
            let snapshot = item?;
            finals.insert(snapshot.choice_index, snapshot);
        }
        if finals.is_empty() {
            return Err(ServiceError::EmptyGeneration);
        }

        let mut finals: Vec<GenerationSnapshot> = finals.into_values().collect();
        finals.sort_by_key(|s| s.choice_index);

        let completion_usage =
            usage::full_usage(self.prompt_tokens, finals.iter().map(|s| s.token_ids.len()));

        let choices = finals
            .into_iter()
            .map(|snapshot| {
                let content = match &self.echo {
                    Some(prefix) => format!("{prefix}{}", snapshot.text),
                    None => snapshot.text,
                };
                ChatCompletionChoice {
                    index: snapshot.choice_index,
                    message: ChatMessage {
                        role: self.response_role.clone(),
                        content,
                    },
                    logprobs: snapshot.logprobs,
                    finish_reason: snapshot.finish_reason,
                }
            })
            .collect();

        Ok(ChatCompletionResponse {
            id: self.identity.id,
            object: RESPONSE_OBJECT.to_string(),
            created: self.identity.created,
            model: self.model,
            choices,
            usage: completion_usage,
        })
    }
}
