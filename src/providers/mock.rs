/*!
 * Mock provider for tests and offline runs.
 *
 * Speaks the same `ChatRequest`/`ChatResponse` types as the OpenAI client so
 * it can stand in for it under `LlmTranslator`:
 * - `MockProvider::working(generator)` - answers every request through a function
 * - `MockProvider::scripted(texts)` - replays canned responses in order
 * - `MockProvider::intermittent(n, generator)` - fails every Nth request
 * - `MockProvider::failing()` - always fails with an error
 * - `MockProvider::empty()` - always returns an empty completion
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::providers::openai::{ChatRequest, ChatResponse};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Answers through the generator, or the script when one is set
    Working,
    /// Fails every Nth request, otherwise behaves like `Working`
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns an empty completion
    Empty,
    /// Waits before answering like `Working`
    Slow { delay_ms: u64 },
}

/// Mock provider for exercising the translator client
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Response generator
    generator: Option<fn(&ChatRequest) -> String>,
    /// Canned responses, consumed front to back
    script: Arc<Mutex<VecDeque<String>>>,
    /// Every request received, shared between clones
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            generator: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that answers through `generator`
    pub fn working(generator: fn(&ChatRequest) -> String) -> Self {
        Self::new(MockBehavior::Working).with_generator(generator)
    }

    /// Create a mock provider that replays `responses` in order
    ///
    /// Once the script is exhausted every further request gets an empty completion.
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new(MockBehavior::Working);
        provider.script.lock().extend(responses.into_iter().map(Into::into));
        provider
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize, generator: fn(&ChatRequest) -> String) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) }).with_generator(generator)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set the response generator
    pub fn with_generator(mut self, generator: fn(&ChatRequest) -> String) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    fn answer(&self, request: &ChatRequest) -> String {
        if let Some(scripted) = self.script.lock().pop_front() {
            return scripted;
        }
        self.generator.map(|generate| generate(request)).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match self.behavior {
            MockBehavior::Working => Ok(ChatResponse::from_text(self.answer(&request))),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(ChatResponse::from_text(self.answer(&request)))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(ChatResponse::from_text(String::new())),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(ChatResponse::from_text(self.answer(&request)))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &ChatResponse) -> String {
        response.choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}
