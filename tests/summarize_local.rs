use mis_analytics::summarize::{LocalBackend, LocalSummarizer};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama(server: &MockServer) -> LocalSummarizer {
    LocalSummarizer::with_urls(
        LocalBackend::Ollama,
        "llama3.2:3b",
        server.uri(),
        "http://127.0.0.1:9/v1/chat/completions",
    )
    .unwrap()
}

#[tokio::test]
async fn ollama_summary_uses_non_streaming_chat() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2:3b",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:3b",
            "message": { "role": "assistant", "content": "Mumbai leads revenue." },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = ollama(&server)
        .summarize(
            "Top region?",
            "SELECT region FROM mis_long",
            "region\n-------\nMumbai",
        )
        .await
        .unwrap();
    assert_eq!(summary, "Mumbai leads revenue.");
}

#[tokio::test]
async fn ollama_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let err = ollama(&server)
        .summarize("q", "SELECT 1", "1")
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("404"), "{msg}");
    assert!(msg.contains("model not found"), "{msg}");
}

#[tokio::test]
async fn ollama_availability_and_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "0.5.1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "llama3.2:3b" }, { "name": "mistral:7b" }]
        })))
        .mount(&server)
        .await;

    let s = ollama(&server);
    assert!(s.is_available().await);
    assert_eq!(s.list_models().await.unwrap(), vec!["llama3.2:3b", "mistral:7b"]);
}

#[tokio::test]
async fn unreachable_ollama_is_unavailable() {
    let server = MockServer::start().await;
    let s = ollama(&server);
    drop(server);
    assert!(!s.is_available().await);
}

#[tokio::test]
async fn openai_compatible_backend_posts_chat_completions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "phi3", "max_tokens": 1000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Revenue grew steadily." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "phi3" }]
        })))
        .mount(&server)
        .await;

    let s = LocalSummarizer::with_urls(
        LocalBackend::OpenaiCompatible,
        "phi3",
        "http://127.0.0.1:9",
        format!("{}/v1/chat/completions", server.uri()),
    )
    .unwrap();

    let summary = s.summarize("q", "SELECT 1", "1").await.unwrap();
    assert_eq!(summary, "Revenue grew steadily.");
    assert_eq!(s.list_models().await.unwrap(), vec!["phi3"]);
    assert!(s.is_available().await);
}

#[tokio::test]
async fn local_endpoint_is_used_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/llm/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Footfall is flat." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let s = LocalSummarizer::with_urls(
        LocalBackend::OpenaiCompatible,
        "phi3",
        "http://127.0.0.1:9",
        format!("{}/llm/generate", server.uri()),
    )
    .unwrap();

    let summary = s.summarize("q", "SELECT 1", "1").await.unwrap();
    assert_eq!(summary, "Footfall is flat.");
}
