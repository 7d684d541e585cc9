//! HTTP client tests for the parsing and LLM services against a mock server.

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use text_reader::config::{LlmConfig, ParserConfig};
use text_reader::credentials::{CredentialSet, CredentialStore};
use text_reader::error::ReaderError;
use text_reader::feedback::{FeedbackProvider, OpenAiFeedback};
use text_reader::parser::{DocumentParser, LlamaParseClient};

const JOB: &str = "job-1";

fn credentials(tmp: &TempDir) -> CredentialStore {
    let store = CredentialStore::new(tmp.path().join("credentials.json"));
    store
        .write(&CredentialSet {
            llm_key: "llm-key".to_string(),
            parsing_key: "llama-key".to_string(),
        })
        .unwrap();
    store
}

fn parser_config(server: &MockServer) -> ParserConfig {
    ParserConfig {
        provider: "llama".to_string(),
        base_url: format!("{}/", server.uri()),
        poll_interval_ms: 10,
        timeout_secs: 5,
    }
}

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        model: "gpt-test".to_string(),
        temperature: 0.5,
        max_tokens: 321,
        timeout_secs: 5,
    }
}

/// Writes a scratch file and returns the parser result for it.
async fn parse_with(server: &MockServer) -> text_reader::error::Result<Option<String>> {
    let tmp = TempDir::new().unwrap();
    let client = LlamaParseClient::new(&parser_config(server), credentials(&tmp)).unwrap();
    let file = tmp.path().join("scratch");
    std::fs::write(&file, b"%PDF-1.4").unwrap();
    client.parse(&file, "essay.pdf").await
}

async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/parsing/upload"))
        .and(header("authorization", "Bearer llama-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": JOB, "status": "PENDING" })),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, status: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/parsing/job/{}", JOB)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": JOB, "status": status })))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_markdown(server: &MockServer, markdown: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/parsing/job/{}/result/markdown", JOB)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "markdown": markdown })))
        .expect(1)
        .mount(server)
        .await;
}

// ─── LlamaParse ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_llama_polls_until_success_then_fetches_markdown() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    // Mounted first, so it answers the first poll.
    mount_status(&server, "PENDING", 1).await;
    mount_status(&server, "SUCCESS", 1).await;
    mount_markdown(&server, "# Essay\n\nFirst point.").await;

    let text = parse_with(&server).await.unwrap();
    assert_eq!(text.as_deref(), Some("# Essay\n\nFirst point."));
}

#[tokio::test]
async fn test_llama_job_error_is_service_error() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    mount_status(&server, "ERROR", 1).await;

    let err = parse_with(&server).await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(_)));
    assert!(err.to_string().contains("ERROR"));
}

#[tokio::test]
async fn test_llama_blank_markdown_is_none() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    mount_status(&server, "SUCCESS", 1).await;
    mount_markdown(&server, "  \n\n ").await;

    assert_eq!(parse_with(&server).await.unwrap(), None);
}

#[tokio::test]
async fn test_llama_upload_rejected_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parsing/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = parse_with(&server).await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(_)));
    assert!(err.to_string().contains("bad key"));
}

// ─── OpenAI ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_openai_sends_single_completion_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer llm-key"))
        .and(body_partial_json(json!({ "model": "gpt-test", "n": 1, "max_tokens": 321 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  ## 1. Completeness\nGood.\n" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let llm = OpenAiFeedback::new(&llm_config(&server), credentials(&tmp)).unwrap();
    let reply = llm.complete("Evaluate this.").await.unwrap();
    assert_eq!(reply, "## 1. Completeness\nGood.");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "You are a helpful AI assistant.");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "Evaluate this.");
}

#[tokio::test]
async fn test_openai_server_error_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let llm = OpenAiFeedback::new(&llm_config(&server), credentials(&tmp)).unwrap();
    let err = llm.complete("Evaluate this.").await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(_)));
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("upstream down"));
}
