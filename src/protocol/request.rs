use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible chat completion request body.
///
/// Reference: <https://platform.openai.com/docs/api-reference/chat>
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,

    /// How many independently-sampled completions to generate.
    pub n: Option<usize>,
    pub max_tokens: Option<usize>,
    pub stream: Option<bool>,
    pub stop: Option<Vec<String>>,
    pub stop_token_ids: Option<Vec<u32>>,

    /// Return per-token log probabilities. Requires `top_logprobs`.
    pub logprobs: Option<bool>,
    pub top_logprobs: Option<usize>,

    /// Echo the last input message back as the first content delta.
    pub echo: Option<bool>,

    /// Whether the chat template appends a generation prompt for the
    /// response role. Defaults to true.
    pub add_generation_prompt: Option<bool>,

    // Guided decoding modes, mutually exclusive.
    pub guided_json: Option<serde_json::Value>,
    pub guided_regex: Option<String>,
    pub guided_choice: Option<Vec<String>>,
    pub guided_grammar: Option<String>,
}

impl ChatCompletionRequest {
    pub fn n(&self) -> usize {
        self.n.unwrap_or(1)
    }

    pub fn stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    pub fn echo(&self) -> bool {
        self.echo.unwrap_or(false)
    }

    pub fn add_generation_prompt(&self) -> bool {
        self.add_generation_prompt.unwrap_or(true)
    }

    /// Role the completion is attributed to: the configured response role when
    /// a generation prompt is appended, otherwise the last message's role.
    pub fn response_role<'a>(&'a self, configured_role: &'a str) -> &'a str {
        if self.add_generation_prompt() {
            configured_role
        } else {
            self.messages
                .last()
                .map(|m| m.role.as_str())
                .unwrap_or(configured_role)
        }
    }

    /// Number of top logprobs to return per token, if requested.
    pub fn logprob_count(&self) -> Result<Option<usize>, ServiceError> {
        match (self.logprobs.unwrap_or(false), self.top_logprobs) {
            (false, _) => Ok(None),
            (true, Some(count)) => Ok(Some(count)),
            (true, None) => Err(ServiceError::InvalidRequest(
                "logprobs requires top_logprobs to be set".into(),
            )),
        }
    }
}

/// A guided-decoding constraint with at most one mode populated, validated at
/// construction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidedConstraint {
    JsonSchema(serde_json::Value),
    Regex(String),
    Choice(Vec<String>),
    Grammar(String),
}

impl GuidedConstraint {
    pub fn from_request(request: &ChatCompletionRequest) -> Result<Option<Self>, ServiceError> {
        let mut modes: Vec<GuidedConstraint> = Vec::new();
        if let Some(schema) = &request.guided_json {
            modes.push(GuidedConstraint::JsonSchema(schema.clone()));
        }
        if let Some(regex) = &request.guided_regex {
            modes.push(GuidedConstraint::Regex(regex.clone()));
        }
        if let Some(choices) = &request.guided_choice {
            modes.push(GuidedConstraint::Choice(choices.clone()));
        }
        if let Some(grammar) = &request.guided_grammar {
            modes.push(GuidedConstraint::Grammar(grammar.clone()));
        }

        if modes.len() > 1 {
            return Err(ServiceError::InvalidRequest(
                "at most one of guided_json, guided_regex, guided_choice, guided_grammar may be set"
                    .into(),
            ));
        }
        Ok(modes.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> ChatCompletionRequest {
        serde_json::from_value(serde_json::json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "Who led the NBA in assists in 2016?"}],
        }))
        .unwrap()
    }

    #[test]
    fn single_guided_mode_is_accepted() {
        let mut request = base_request();
        request.guided_regex = Some(r"\d+".into());
        let constraint = GuidedConstraint::from_request(&request).unwrap();
        assert!(matches!(constraint, Some(GuidedConstraint::Regex(_))));
    }

    #[test]
    fn multiple_guided_modes_are_rejected() {
        let mut request = base_request();
        request.guided_regex = Some(r"\d+".into());
        request.guided_choice = Some(vec!["yes".into(), "no".into()]);
        assert!(matches!(
            GuidedConstraint::from_request(&request),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn logprobs_without_top_logprobs_is_rejected() {
        let mut request = base_request();
        request.logprobs = Some(true);
        assert!(request.logprob_count().is_err());
        request.top_logprobs = Some(5);
        assert_eq!(request.logprob_count().unwrap(), Some(5));
    }

    #[test]
    fn response_role_follows_generation_prompt_flag() {
        let mut request = base_request();
        assert_eq!(request.response_role("assistant"), "assistant");
        request.add_generation_prompt = Some(false);
        assert_eq!(request.response_role("assistant"), "user");
    }
}
