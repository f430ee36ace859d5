//! Completion providers: the concrete backends behind the gateway.
//!
//! Each provider speaks one wire protocol. `OllamaProvider` talks to a local
//! Ollama-compatible chat server over HTTP; `MockProvider` answers
//! deterministically with zero I/O so the whole system runs offline.

use std::time::Duration;

use async_trait::async_trait;
use colloquy_core::error::ColloquyError;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Name reported by [`MockProvider`].
pub const MOCK_PROVIDER: &str = "mock";

/// Name reported by [`OllamaProvider`].
pub const OLLAMA_PROVIDER: &str = "ollama";

/// A single text-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A completed text generation, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    /// Name of the provider that produced the text.
    pub provider: String,
    /// True when the deterministic mock answered because every configured
    /// provider failed. False when the mock was the configured choice.
    pub degraded: bool,
}

impl CompletionResponse {
    /// Whether the offline mock produced this text.
    pub fn is_mock(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }
}

/// One backend in the provider chain.
///
/// Object-safe so the chain can hold a heterogeneous ordered list. Errors
/// are typed: `RateLimited` triggers an in-provider retry with backoff,
/// anything else moves the chain to the next provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable provider name used in configuration and response tagging.
    fn name(&self) -> &str;

    /// Produce a completion for the request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ColloquyError>;
}

// ---------------------------------------------------------------------------
// OllamaProvider - local HTTP chat server
// ---------------------------------------------------------------------------

/// Provider speaking the Ollama chat API (`POST /api/chat`, non-streaming).
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub(crate) fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": request.prompt}
            ],
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        OLLAMA_PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ColloquyError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        debug!(url = %url, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ColloquyError::ProviderUnavailable(format!("ollama: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ColloquyError::RateLimited(OLLAMA_PROVIDER.to_string()));
        }
        if !status.is_success() {
            return Err(ColloquyError::ProviderUnavailable(format!(
                "ollama returned HTTP {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ColloquyError::ProviderUnavailable(format!("ollama body: {}", e)))?;

        let text = body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ColloquyError::ProviderUnavailable(
                "ollama returned an empty completion".to_string(),
            ));
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// MockProvider - deterministic offline responder
// ---------------------------------------------------------------------------

/// Deterministic offline responder terminating every provider chain.
///
/// Responses are pure functions of the prompt, shaped by what the prompt
/// asks for: sentiment prompts get a valid scale label, topic prompts get a
/// comma-separated list drawn from the prompt body, everything else gets a
/// short templated answer quoting the body. Never fails, never blocks.
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    /// The text after the first blank line: prompts put instructions first
    /// and payload (transcript, context) after.
    fn payload(prompt: &str) -> &str {
        match prompt.split_once("\n\n") {
            Some((_, payload)) => payload.trim(),
            None => prompt.trim(),
        }
    }

    fn excerpt(text: &str, max_chars: usize) -> String {
        let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flattened.chars().count() <= max_chars {
            return flattened;
        }
        let cut: String = flattened.chars().take(max_chars).collect();
        match cut.rfind(' ') {
            Some(idx) => format!("{}...", &cut[..idx]),
            None => format!("{}...", cut),
        }
    }

    fn candidate_terms(text: &str, limit: usize) -> Vec<String> {
        let mut seen = Vec::new();
        for term in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 5)
        {
            let term = term.to_string();
            if !seen.contains(&term) {
                seen.push(term);
                if seen.len() >= limit {
                    break;
                }
            }
        }
        seen
    }

    pub(crate) fn respond(prompt: &str) -> String {
        // Branch on the instruction head only. The payload is user-authored
        // text and may mention "topics" or "summary" without asking for them.
        let instruction = match prompt.split_once("\n\n") {
            Some((head, _)) => head.to_lowercase(),
            None => prompt.to_lowercase(),
        };
        let payload = Self::payload(prompt);

        // The summary instruction mentions topics, so it is matched first.
        if instruction.contains("summarize") || instruction.contains("summary") {
            return format!("The conversation covered: {}", Self::excerpt(payload, 160));
        }

        if instruction.contains("sentiment") {
            return "neutral".to_string();
        }

        if instruction.contains("topics") {
            let terms = Self::candidate_terms(payload, 5);
            if terms.is_empty() {
                return "general discussion".to_string();
            }
            return terms.join(", ");
        }

        // Answer prompts put the question after the grounding context.
        if prompt.to_lowercase().contains("answer this question") {
            return format!(
                "Based on the retrieved conversations: {}",
                Self::excerpt(payload, 200)
            );
        }

        format!("Mock completion: {}", Self::excerpt(payload, 120))
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ColloquyError> {
        Ok(Self::respond(&request.prompt))
    }
}
