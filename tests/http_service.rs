use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use chat_completion_service::{
    AppConfig, EngineHandle, StubTokenSource, TranscriptRenderer, build_router,
};

const MODEL: &str = "test-model";

fn config(api_token: Option<&str>) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        model_id: MODEL.into(),
        response_role: "assistant".into(),
        max_model_len: 4096,
        temperature: 0.7,
        top_p: 0.95,
        api_token: api_token.map(String::from),
    })
}

fn app_with(api_token: Option<&str>, max_model_len: usize, ready: bool) -> Router {
    let engine = Arc::new(EngineHandle::new(Arc::new(StubTokenSource::new(
        StubTokenSource::DEFAULT_REPLY,
        max_model_len,
    ))));
    if ready {
        engine.mark_ready();
    }
    build_router(config(api_token), engine, Arc::new(TranscriptRenderer))
}

fn app() -> Router {
    app_with(None, 4096, true)
}

fn completion_request(body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn chat_body() -> serde_json::Value {
    serde_json::json!({
        "model": MODEL,
        "messages": [{"role": "user", "content": "Which team won 73 games?"}],
    })
}

#[tokio::test]
async fn health_reports_ok_when_engine_ready() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn health_fails_while_engine_starting() {
    let response = app_with(None, 4096, false)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["object"], "error");
}

#[tokio::test]
async fn missing_authorization_header_is_401() {
    let response = app_with(Some("sekrit"), 4096, true)
        .oneshot(completion_request(&chat_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_token_is_403_and_right_token_passes() {
    let mut request = completion_request(&chat_body());
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
    let response = app_with(Some("sekrit"), 4096, true)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut request = completion_request(&chat_body());
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer sekrit".parse().unwrap());
    let response = app_with(Some("sekrit"), 4096, true)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_completion_returns_openai_shape() {
    let response = app().oneshot(completion_request(&chat_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["model"], MODEL);
    assert_eq!(body["choices"][0]["index"], 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(
        body["choices"][0]["message"]["content"],
        StubTokenSource::DEFAULT_REPLY
    );
    assert_eq!(body["choices"][0]["finish_reason"], "stop");

    let usage = &body["usage"];
    assert_eq!(
        usage["total_tokens"].as_u64().unwrap(),
        usage["prompt_tokens"].as_u64().unwrap() + usage["completion_tokens"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn streaming_completion_is_sse_terminated_by_done() {
    let mut body = chat_body();
    body["stream"] = serde_json::json!(true);
    let response = app().oneshot(completion_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.starts_with("data: "));
    assert!(text.contains(r#""role":"assistant""#));
    assert!(text.contains(r#""finish_reason":"stop""#));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let mut body = chat_body();
    body["model"] = serde_json::json!("some-other-model");
    let response = app().oneshot(completion_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "model_not_served");
}

#[tokio::test]
async fn context_overflow_is_rejected_before_generation() {
    let mut body = chat_body();
    body["max_tokens"] = serde_json::json!(50);
    // Window far smaller than prompt + requested completion.
    let response = app_with(None, 10, true)
        .oneshot(completion_request(&body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "context_length_exceeded");
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("maximum context length is 10 tokens")
    );
}

#[tokio::test]
async fn conflicting_guided_modes_are_rejected() {
    let mut body = chat_body();
    body["guided_regex"] = serde_json::json!(r"\d+");
    body["guided_choice"] = serde_json::json!(["yes", "no"]);
    let response = app().oneshot(completion_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
}
