//! The text-completion gateway: an ordered provider chain with bounded
//! retries, finite timeouts, and a deterministic offline tail.

use std::time::Duration;

use colloquy_core::config::GatewayConfig;
use colloquy_core::error::ColloquyError;
use tracing::{debug, warn};

use crate::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, MockProvider, OllamaProvider,
    MOCK_PROVIDER,
};

/// Capability contract consumed by the analyzer and the query engine:
/// `complete(request) -> text`, abstracting over however many real providers
/// sit behind it.
pub trait TextCompletionGateway: Send + Sync {
    /// Produce a completion for the request.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ColloquyError>> + Send;
}

/// Object-safe version of [`TextCompletionGateway`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `TextCompletionGateway`
/// automatically implements `DynTextCompletionGateway`.
pub trait DynTextCompletionGateway: Send + Sync {
    /// Produce a completion for the request (boxed future).
    fn complete_boxed(
        &self,
        request: CompletionRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<CompletionResponse, ColloquyError>> + Send + '_>,
    >;
}

impl<T: TextCompletionGateway> DynTextCompletionGateway for T {
    fn complete_boxed(
        &self,
        request: CompletionRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<CompletionResponse, ColloquyError>> + Send + '_>,
    > {
        Box::pin(self.complete(request))
    }
}

/// Gateway implementation over an ordered provider chain.
///
/// Providers are tried in configuration order. A rate-limited provider gets
/// a bounded number of in-place retries with exponential backoff before the
/// chain moves on; any other failure or timeout moves on immediately. When
/// the chain is exhausted (or empty) the deterministic mock answers, so
/// `complete` stays available with zero network access.
pub struct ProviderChainGateway {
    providers: Vec<Box<dyn CompletionProvider>>,
    mock: MockProvider,
    timeout: Duration,
    rate_limit_retries: u32,
    retry_backoff: Duration,
}

impl ProviderChainGateway {
    /// Build the chain named by the gateway configuration. Unknown provider
    /// names are skipped with a warning.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|name| match name.as_str() {
                "ollama" => Some(Box::new(OllamaProvider::new(
                    &config.ollama_url,
                    &config.model,
                    config.timeout_secs,
                )) as Box<dyn CompletionProvider>),
                other => {
                    warn!(provider = other, "Unknown provider in configuration, skipping");
                    None
                }
            })
            .collect();
        Self::with_providers(providers, config)
    }

    /// Build a chain from explicit provider instances, in order.
    pub fn with_providers(
        providers: Vec<Box<dyn CompletionProvider>>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            providers,
            mock: MockProvider::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            rate_limit_retries: config.rate_limit_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Number of real providers in the chain (the mock tail not included).
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Drive one provider to success or a terminal error, absorbing
    /// rate-limit responses up to the retry budget.
    async fn try_provider(
        &self,
        provider: &dyn CompletionProvider,
        request: &CompletionRequest,
    ) -> Result<String, ColloquyError> {
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(self.timeout, provider.complete(request)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(ColloquyError::RateLimited(who))) => {
                    if attempt >= self.rate_limit_retries {
                        return Err(ColloquyError::ProviderUnavailable(format!(
                            "{} rate limit retries exhausted",
                            who
                        )));
                    }
                    attempt += 1;
                    let delay = self.retry_backoff * 2u32.pow(attempt - 1);
                    warn!(
                        provider = provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(ColloquyError::ProviderUnavailable(format!(
                        "{} timed out after {}s",
                        provider.name(),
                        self.timeout.as_secs()
                    )));
                }
            }
        }
    }
}

impl TextCompletionGateway for ProviderChainGateway {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ColloquyError> {
        for provider in &self.providers {
            match self.try_provider(provider.as_ref(), &request).await {
                Ok(text) => {
                    debug!(provider = provider.name(), "Completion succeeded");
                    return Ok(CompletionResponse {
                        text,
                        provider: provider.name().to_string(),
                        degraded: false,
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider failed, trying next");
                }
            }
        }

        let degraded = !self.providers.is_empty();
        if degraded {
            warn!("All providers failed, answering with the deterministic mock");
        }
        let text = self.mock.complete(&request).await?;
        Ok(CompletionResponse {
            text,
            provider: MOCK_PROVIDER.to_string(),
            degraded,
        })
    }
}
