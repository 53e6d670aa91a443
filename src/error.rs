use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(
        "This model's maximum context length is {max_model_len} tokens. However, you requested \
         {requested} tokens ({prompt_tokens} in the messages, {max_tokens} in the completion). \
         Please reduce the length of the messages or completion."
    )]
    ContextLengthExceeded {
        max_model_len: usize,
        requested: usize,
        prompt_tokens: usize,
        max_tokens: usize,
    },
    #[error("model {0} is not being served")]
    ModelNotServed(String),
    #[error("engine protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("engine produced no output")]
    EmptyGeneration,
    #[error("engine is not ready: {0}")]
    EngineUnavailable(String),
    #[error("engine failure: {0}")]
    Engine(String),
    #[error("authorization header not found in request")]
    MissingAuthorization,
    #[error("invalid API key")]
    InvalidApiKey,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_)
            | ServiceError::ContextLengthExceeded { .. }
            | ServiceError::ModelNotServed(_) => StatusCode::BAD_REQUEST,
            ServiceError::MissingAuthorization => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidApiKey => StatusCode::FORBIDDEN,
            ServiceError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ProtocolViolation(_)
            | ServiceError::EmptyGeneration
            | ServiceError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest(_) => "invalid_request_error",
            ServiceError::ContextLengthExceeded { .. } => "context_length_exceeded",
            ServiceError::ModelNotServed(_) => "model_not_served",
            ServiceError::ProtocolViolation(_) => "protocol_violation",
            ServiceError::EmptyGeneration => "empty_generation",
            ServiceError::EngineUnavailable(_) => "engine_unavailable",
            ServiceError::Engine(_) => "engine_error",
            ServiceError::MissingAuthorization => "authentication_error",
            ServiceError::InvalidApiKey => "permission_error",
        }
    }

    /// OpenAI-style error envelope, also used as the payload of a streamed
    /// error frame.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "object": "error",
                "message": self.to_string(),
                "type": self.error_type(),
                "param": serde_json::Value::Null,
                "code": self.status().as_u16(),
            }
        })
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(self.to_envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_length_message_names_limit_and_breakdown() {
        let err = ServiceError::ContextLengthExceeded {
            max_model_len: 120,
            requested: 150,
            prompt_tokens: 100,
            max_tokens: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("120 tokens"));
        assert!(msg.contains("150 tokens"));
        assert!(msg.contains("100 in the messages"));
        assert!(msg.contains("50 in the completion"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn envelope_code_mirrors_http_status() {
        let err = ServiceError::ModelNotServed("gpt-nope".into());
        let envelope = err.to_envelope();
        assert_eq!(envelope["error"]["object"], "error");
        assert_eq!(envelope["error"]["code"], 400);
        assert_eq!(envelope["error"]["type"], "model_not_served");
    }
}
