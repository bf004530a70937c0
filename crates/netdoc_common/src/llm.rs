//! LLM Client Abstraction
//!
//! Two capabilities, each behind an async trait so the agent can run against
//! real HTTP backends or deterministic fakes:
//! - [`TextGenerator`]: role-tagged messages to text (chat completions)
//! - [`EmbeddingProvider`]: texts to vectors, order preserving
//!
//! [`OpenAiClient`] implements both against an OpenAI-compatible API.

use crate::history::{ConversationTurn, Role};
use crate::retry::Transient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("LLM is disabled in configuration")]
    Disabled,

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("HTTP {status} from API: {body}")]
    Status { status: u16, body: String },

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("LLM returned empty response")]
    EmptyResponse,

    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::HttpError(_) | LlmError::Timeout(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, same order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("OPENAI_API_KEY".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, LlmError> {
        let url = self.url(path);
        debug!(url = %url, "LLM request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| LlmError::InvalidJson(format!("Failed to parse response: {}", e)))
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::HttpError(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let body = ChatBody {
            model: &self.config.chat_model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let response: ChatResponse = self.post("/v1/chat/completions", &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingBody {
            model: &self.config.embedding_model,
            input: texts,
        };
        let response: EmbeddingResponse = self.post("/v1/embeddings", &body).await?;
        order_embeddings(response.data, texts.len())
    }
}

/// Restore input order and check the count
fn order_embeddings(mut data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    if data.len() != expected {
        return Err(LlmError::CountMismatch {
            expected,
            got: data.len(),
        });
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

// ============================================================================
// Fakes (Testing)
// ============================================================================

pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Scripted text generator. Responses are consumed in order; the last
    /// one repeats. No responses at all yields `EmptyResponse`.
    pub struct FakeGenerator {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl FakeGenerator {
        pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn always(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        pub fn always_error(error: LlmError) -> Self {
            Self::new(vec![Err(error)])
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
        }

        /// Every request received, in order
        pub fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(request.clone());

            let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
            match responses.len() {
                0 => Err(LlmError::EmptyResponse),
                1 => responses[0].clone(),
                _ => responses.remove(0),
            }
        }
    }

    /// Bag-of-words embedder over a fixed vocabulary: dimension `i` counts
    /// occurrences of `vocabulary[i]` in the lowercased text.
    pub struct FakeEmbedder {
        vocabulary: Vec<String>,
        failure: Option<LlmError>,
        calls: Mutex<usize>,
    }

    impl FakeEmbedder {
        pub fn with_vocabulary(words: &[&str]) -> Self {
            Self {
                vocabulary: words.iter().map(|w| w.to_lowercase()).collect(),
                failure: None,
                calls: Mutex::new(0),
            }
        }

        pub fn failing(error: LlmError) -> Self {
            Self {
                vocabulary: Vec::new(),
                failure: Some(error),
                calls: Mutex::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            self.vocabulary
                .iter()
                .map(|w| lower.matches(w.as_str()).count() as f32)
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeEmbedder, FakeGenerator};
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.3,
            max_tokens: 100,
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout(60).is_transient());
        assert!(LlmError::HttpError("reset".into()).is_transient());
        assert!(LlmError::Status { status: 429, body: String::new() }.is_transient());
        assert!(LlmError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!LlmError::EmptyResponse.is_transient());
        assert!(!LlmError::MissingApiKey("OPENAI_API_KEY".into()).is_transient());
    }

    #[test]
    fn test_chat_message_serializes_openai_shape() {
        let json = serde_json::to_value(ChatMessage::user("ping")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "ping"}));
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Try Get-NetAdapter"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Try Get-NetAdapter")
        );
    }

    #[test]
    fn test_embeddings_reordered_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        let vectors = order_embeddings(parsed.data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_embedding_count_mismatch() {
        let raw = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            order_embeddings(parsed.data, 3),
            Err(LlmError::CountMismatch { expected: 3, got: 1 })
        );
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = OpenAiConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: "  ".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        assert!(matches!(OpenAiClient::new(config), Err(LlmError::MissingApiKey(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = OpenAiConfig {
            endpoint: "http://localhost:8080/".to_string(),
            chat_model: "m".to_string(),
            embedding_model: "e".to_string(),
            api_key: "k".to_string(),
            timeout_secs: 5,
        };
        let client = OpenAiClient::new(config).unwrap();
        assert_eq!(
            client.url("/v1/embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[tokio::test]
    async fn test_fake_generator_sequence_then_repeat() {
        let generator = FakeGenerator::new(vec![
            Err(LlmError::Timeout(60)),
            Ok("first".to_string()),
            Ok("last".to_string()),
        ]);
        assert_eq!(generator.generate(&request()).await, Err(LlmError::Timeout(60)));
        assert_eq!(generator.generate(&request()).await.unwrap(), "first");
        assert_eq!(generator.generate(&request()).await.unwrap(), "last");
        assert_eq!(generator.generate(&request()).await.unwrap(), "last");
        assert_eq!(generator.call_count(), 4);
        assert_eq!(generator.requests()[0].max_tokens, 100);
    }

    #[tokio::test]
    async fn test_fake_embedder_vectors() {
        let embedder = FakeEmbedder::with_vocabulary(&["dns", "adapter"]);
        let vectors = embedder
            .embed(&["DNS cache dns".to_string(), "nothing".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![2.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(embedder.call_count(), 1);

        let failing = FakeEmbedder::failing(LlmError::EmptyResponse);
        assert!(failing.embed(&["x".to_string()]).await.is_err());
    }
}
