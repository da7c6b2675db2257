use std::time::Duration;

use mis_analytics::llm::{ChatProvider, ChatRequest, LlmError, Message, OpenAiAdapter};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> OpenAiAdapter {
    OpenAiAdapter::with_config("sk-test", server.uri(), "gpt-4o-mini", Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn openai_parses_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "message": { "role": "assistant", "content": "SELECT 1" }
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = ChatRequest::new(vec![Message::system("sql only"), Message::user("one?")])
        .temperature(0.1)
        .max_tokens(1000);
    let resp = adapter(&server).chat(&req).await.unwrap();

    assert_eq!(resp.content, "SELECT 1");
    assert_eq!(resp.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(resp.input_tokens, 12);
    assert_eq!(resp.output_tokens, 3);
}

#[tokio::test]
async fn openai_error_status_carries_api_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided" }
        })))
        .mount(&server)
        .await;

    let req = ChatRequest::new(vec![Message::user("hi")]);
    let err = adapter(&server).chat(&req).await.unwrap_err();

    match &err {
        LlmError::Status { status, message, .. } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn openai_empty_content_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "   " } }]
        })))
        .mount(&server)
        .await;

    let req = ChatRequest::new(vec![Message::user("hi")]);
    let err = adapter(&server).chat(&req).await.unwrap_err();
    assert_eq!(err.code(), "invalid_response");
}
