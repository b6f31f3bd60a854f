/*!
 * Tests for the chat-completion provider
 *
 * A throwaway HTTP listener on localhost stands in for the service so the
 * real request path runs without leaving the machine.
 */

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use subtrans::app_config::{ProviderConfig, TranslationProvider};
use subtrans::errors::ProviderError;
use subtrans::providers::Provider;
use subtrans::providers::mock::MockProvider;
use subtrans::providers::openai::{ChatRequest, OpenAI};

const OK_BODY: &str = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"bonjour"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#;

/// Answer one connection per canned `(status line, body)`, returning the raw requests
async fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
        requests
    });

    (format!("http://{}/v1/", address), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).to_string()
}

fn client(flavor: TranslationProvider, endpoint: &str, max_retries: u32) -> OpenAI {
    OpenAI::new_with_config(flavor, "test-key", endpoint, 5, max_retries, 10, None).unwrap()
}

/// Test a successful call posts to chat/completions with bearer auth
#[tokio::test]
async fn test_complete_withOkResponse_shouldReturnFirstChoice() {
    let (endpoint, server) = serve(vec![("200 OK", OK_BODY)]).await;
    let provider = client(TranslationProvider::OpenAI, &endpoint, 0);

    let response = provider
        .complete(ChatRequest::new("gpt-4o-mini").user("hello").seed(Some(5)))
        .await
        .unwrap();

    assert_eq!(OpenAI::extract_text(&response), "bonjour");
    assert_eq!(response.usage.map(|usage| usage.completion_tokens), Some(1));

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /v1/chat/completions"));
    assert!(requests[0].to_lowercase().contains("authorization: bearer test-key"));
    assert!(requests[0].contains("\"seed\":5"));
}

/// Test Mistral gets the seed under its own field name
#[tokio::test]
async fn test_complete_forMistral_shouldSendRandomSeed() {
    let (endpoint, server) = serve(vec![("200 OK", OK_BODY)]).await;
    let provider = client(TranslationProvider::Mistral, &endpoint, 0);

    provider
        .complete(ChatRequest::new("mistral-large-latest").user("hello").seed(Some(9)))
        .await
        .unwrap();

    let requests = server.await.unwrap();
    assert!(requests[0].contains("\"random_seed\":9"));
    assert!(!requests[0].contains("\"seed\":"));
}

/// Test a server error is retried and the retry's answer is returned
#[tokio::test]
async fn test_complete_withServerErrorThenOk_shouldRetry() {
    let (endpoint, server) = serve(vec![
        ("503 Service Unavailable", r#"{"error":"busy"}"#),
        ("200 OK", OK_BODY),
    ])
    .await;
    let provider = client(TranslationProvider::OpenRouter, &endpoint, 2);

    let response = provider.complete(ChatRequest::new("m").user("hello")).await.unwrap();

    assert_eq!(OpenAI::extract_text(&response), "bonjour");
    assert_eq!(server.await.unwrap().len(), 2);
}

/// Test an authentication failure is not retried
#[tokio::test]
async fn test_complete_withUnauthorized_shouldFailWithoutRetry() {
    let (endpoint, server) = serve(vec![("401 Unauthorized", r#"{"error":"bad key"}"#)]).await;
    let provider = client(TranslationProvider::OpenAI, &endpoint, 3);

    let result = provider.complete(ChatRequest::new("m").user("hello")).await;

    assert!(matches!(result, Err(ProviderError::AuthenticationError(_))));
    assert_eq!(server.await.unwrap().len(), 1);
}

/// Test the provider section of the config builds a client
#[test]
fn test_fromConfig_withDefaults_shouldBuild() {
    let mut config = ProviderConfig::new(TranslationProvider::Mistral);
    config.api_key = "k".to_string();

    assert!(OpenAI::from_config(&config).is_ok());

    config.endpoint = "ftp://example.com".to_string();
    assert!(matches!(OpenAI::from_config(&config), Err(ProviderError::ConnectionError(_))));
}

/// Test the intermittent mock fails on every nth request only
#[tokio::test]
async fn test_mockProvider_intermittent_shouldFailOnSchedule() {
    fn reply(_: &ChatRequest) -> String {
        "ok".to_string()
    }
    let provider = MockProvider::intermittent(3, reply);

    let mut outcomes = Vec::new();
    for _ in 0..6 {
        outcomes.push(provider.complete(ChatRequest::new("m").user("x")).await.is_ok());
    }

    assert_eq!(outcomes, vec![true, true, false, true, true, false]);
    assert!(provider.test_connection().await.is_ok());
}
