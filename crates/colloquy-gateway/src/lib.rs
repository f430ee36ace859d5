//! Text-completion gateway for colloquy.
//!
//! Exposes a single [`TextCompletionGateway`] capability over an ordered
//! chain of completion providers. Real providers (Ollama) are tried first
//! with finite timeouts and bounded rate-limit retries; a deterministic
//! [`MockProvider`] sits at the tail so the gateway keeps answering when
//! no provider is configured or every provider has failed.

pub mod gateway;
pub mod provider;

pub use gateway::{DynTextCompletionGateway, ProviderChainGateway, TextCompletionGateway};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, MockProvider, OllamaProvider,
    MOCK_PROVIDER, OLLAMA_PROVIDER,
};
