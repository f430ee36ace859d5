//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace tokenizers
//!   crate. This is the semantic embedding backend.
//! - `LexicalEmbeddingService` produces deterministic hashed bag-of-terms
//!   vectors with no model and no I/O. Retrieval over these vectors behaves
//!   like approximate keyword matching.
//! - `ResilientEmbeddingService` wraps a primary backend with the lexical
//!   fallback and a by-text cache, so embedding never hard-fails while the
//!   backend is down.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colloquy_core::config::EmbeddingConfig;
use colloquy_core::error::ColloquyError;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::math;

/// An embedding vector plus a quality flag.
///
/// `degraded` is true when the vector came from the lexical fallback because
/// the configured primary backend failed; callers label downstream output
/// accordingly.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub vector: Vec<f32>,
    pub degraded: bool,
}

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional L2-normalized vectors,
/// so cosine similarity between two outputs reduces to a dot product. The
/// same input text always produces the same vector.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding for the given text.
    ///
    /// Empty or whitespace-only text is rejected with `InvalidInput`.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<EmbeddingOutput, ColloquyError>> + Send;

    /// Generate embeddings for a batch of texts, in order.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<EmbeddingOutput>, ColloquyError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// Because `EmbeddingService::embed` returns `impl Future` it is not
/// object-safe. This trait uses boxed futures instead, allowing
/// `Box<dyn DynEmbeddingService>` to be stored in structs without generics.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<EmbeddingOutput, ColloquyError>> + Send + 'a>,
    >;

    /// Generate embeddings for a batch of texts (boxed future).
    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<EmbeddingOutput>, ColloquyError>>
                + Send
                + 'a,
        >,
    >;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Blanket impl: any `EmbeddingService` automatically implements `DynEmbeddingService`.
impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<EmbeddingOutput, ColloquyError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<EmbeddingOutput>, ColloquyError>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

/// Canonical form of text for embedding and cache keys: trimmed, lowercased,
/// inner whitespace collapsed. Two texts with the same canonical form share
/// one cache entry and one vector.
pub fn normalize_for_embedding(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn cache_key(normalized: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects an ONNX export accepting `input_ids`, `attention_mask`, and
/// `token_type_ids` as i64 inputs, producing token-level embeddings. Masked
/// mean pooling plus L2 normalization yields one unit vector per input.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>).
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load the model and tokenizer named by the embedding configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ColloquyError> {
        Self::from_files(
            Path::new(&config.model_path),
            Path::new(&config.tokenizer_path),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ColloquyError> {
        if !model_path.exists() {
            return Err(ColloquyError::Embedding(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(ColloquyError::Embedding(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| ColloquyError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| ColloquyError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ColloquyError::Embedding(format!("ONNX load model: {}", e)))?;

        // Detect output dimensions from the model output type.
        // Sentence-transformer output is typically [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ColloquyError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    /// Tokenize, run inference, and mean-pool the output.
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, ColloquyError> {
        if text.trim().is_empty() {
            return Err(ColloquyError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ColloquyError::Embedding(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();

        let seq_len = input_ids.len();

        // Create ndarray views with shape [1, seq_len] for batch size 1.
        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| ColloquyError::Embedding(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| ColloquyError::Embedding(format!("attention_mask array: {}", e)))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| ColloquyError::Embedding(format!("token_type_ids array: {}", e)))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| ColloquyError::Embedding(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| ColloquyError::Embedding(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| ColloquyError::Embedding(format!("TensorRef token_type_ids: {}", e)))?;

        // Run inference: input_ids, attention_mask, token_type_ids
        let mut session = self
            .session
            .lock()
            .map_err(|e| ColloquyError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| ColloquyError::Embedding(format!("ONNX inference failed: {}", e)))?;

        // Extract token embeddings as flat slice: [1, seq_len, hidden_dim].
        // ort 2.0 try_extract_tensor returns (&Shape, &[f32]).
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ColloquyError::Embedding(format!("Extract embeddings: {}", e)))?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() < 2 {
            return Err(ColloquyError::Embedding(format!(
                "Unexpected output shape: {:?}",
                shape_dims
            )));
        }

        let hidden_dim = *shape_dims.last().unwrap() as usize;

        let mut pooled = math::masked_mean_pool(data, &attention_mask, hidden_dim);
        math::l2_normalize(&mut pooled);

        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, ColloquyError> {
        // ONNX Runtime inference is CPU-bound; run on a blocking thread.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dims = self.dimensions;
        let text_owned = text.to_string();

        let vector = tokio::task::spawn_blocking(move || {
            let svc = OnnxEmbeddingService {
                session,
                tokenizer,
                dimensions: dims,
            };
            svc.embed_sync(&text_owned)
        })
        .await
        .map_err(|e| ColloquyError::Embedding(format!("Embedding task panicked: {}", e)))??;

        Ok(EmbeddingOutput {
            vector,
            degraded: false,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
        let mut outputs = Vec::with_capacity(texts.len());
        for text in texts {
            outputs.push(self.embed(text).await?);
        }
        Ok(outputs)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// LexicalEmbeddingService - deterministic hashed bag-of-terms vectors
// ---------------------------------------------------------------------------

/// Embedding service backed by feature hashing instead of a model.
///
/// Each alphanumeric term hashes to one of `dimensions` buckets with a signed
/// contribution, and the bucket counts are L2-normalized. Texts sharing
/// vocabulary land in overlapping buckets, so dot products approximate
/// keyword overlap. Fully deterministic, no I/O, always available.
#[derive(Debug, Clone)]
pub struct LexicalEmbeddingService {
    dimensions: usize,
}

impl LexicalEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn term_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let mut term_count = 0usize;

        for term in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            Self::bump(&mut vector, term);
            term_count += 1;
        }

        // Text with no alphanumeric terms still gets a nonzero vector so the
        // result is always normalizable.
        if term_count == 0 {
            Self::bump(&mut vector, text.trim());
        }

        math::l2_normalize(&mut vector);
        vector
    }

    fn bump(vector: &mut [f32], term: &str) {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % vector.len() as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Default for LexicalEmbeddingService {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for LexicalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, ColloquyError> {
        if text.trim().is_empty() {
            return Err(ColloquyError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }
        Ok(EmbeddingOutput {
            vector: self.term_vector(text),
            degraded: false,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
        let mut outputs = Vec::with_capacity(texts.len());
        for text in texts {
            outputs.push(self.embed(text).await?);
        }
        Ok(outputs)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// ResilientEmbeddingService - primary backend + lexical fallback + cache
// ---------------------------------------------------------------------------

/// Wraps a primary embedding backend with the lexical fallback and a cache.
///
/// Input text is canonicalized once and cached by its hash, so identical text
/// never embeds twice. When the primary backend errors or exceeds its
/// timeout, the lexical vector for the same text is returned with
/// `degraded = true` instead of failing the caller. With no primary
/// configured the lexical backend is the chosen backend, not a degradation,
/// and the flag stays false.
pub struct ResilientEmbeddingService<P> {
    primary: Option<P>,
    fallback: LexicalEmbeddingService,
    timeout: Duration,
    max_cache_entries: usize,
    cache: Mutex<HashMap<u64, EmbeddingOutput>>,
}

impl<P: EmbeddingService> ResilientEmbeddingService<P> {
    pub fn new(primary: Option<P>, config: &EmbeddingConfig) -> Self {
        // The fallback must produce vectors of the primary's dimension so a
        // mixed corpus stays comparable.
        let dimensions = primary
            .as_ref()
            .map(EmbeddingService::dimensions)
            .unwrap_or(config.dimensions);
        Self {
            primary,
            fallback: LexicalEmbeddingService::new(dimensions),
            timeout: Duration::from_secs(config.timeout_secs),
            max_cache_entries: config.max_cache_entries,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_get(&self, key: u64) -> Result<Option<EmbeddingOutput>, ColloquyError> {
        let cache = self
            .cache
            .lock()
            .map_err(|e| ColloquyError::Embedding(format!("Cache lock poisoned: {}", e)))?;
        Ok(cache.get(&key).cloned())
    }

    fn cache_put(&self, key: u64, output: EmbeddingOutput) -> Result<(), ColloquyError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| ColloquyError::Embedding(format!("Cache lock poisoned: {}", e)))?;
        // Generational eviction: drop everything once the cap is reached.
        if cache.len() >= self.max_cache_entries {
            cache.clear();
        }
        cache.insert(key, output);
        Ok(())
    }
}

impl<P: EmbeddingService> EmbeddingService for ResilientEmbeddingService<P> {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, ColloquyError> {
        let normalized = normalize_for_embedding(text);
        if normalized.is_empty() {
            return Err(ColloquyError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let key = cache_key(&normalized);
        if let Some(cached) = self.cache_get(key)? {
            debug!(key, "embedding cache hit");
            return Ok(cached);
        }

        let output = match &self.primary {
            Some(primary) => {
                match tokio::time::timeout(self.timeout, primary.embed(&normalized)).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(ColloquyError::InvalidInput(msg))) => {
                        return Err(ColloquyError::InvalidInput(msg));
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "Primary embedding backend failed, using lexical fallback");
                        EmbeddingOutput {
                            vector: self.fallback.term_vector(&normalized),
                            degraded: true,
                        }
                    }
                    Err(_) => {
                        warn!(
                            timeout_secs = self.timeout.as_secs(),
                            "Primary embedding backend timed out, using lexical fallback"
                        );
                        EmbeddingOutput {
                            vector: self.fallback.term_vector(&normalized),
                            degraded: true,
                        }
                    }
                }
            }
            None => EmbeddingOutput {
                vector: self.fallback.term_vector(&normalized),
                degraded: false,
            },
        };

        self.cache_put(key, output.clone())?;
        Ok(output)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
        let mut outputs = Vec::with_capacity(texts.len());
        for text in texts {
            outputs.push(self.embed(text).await?);
        }
        Ok(outputs)
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions,
            timeout_secs: 5,
            max_cache_entries: 64,
            ..EmbeddingConfig::default()
        }
    }

    /// Backend that always fails, for exercising the degradation path.
    struct FailingBackend;

    impl EmbeddingService for FailingBackend {
        async fn embed(&self, _text: &str) -> Result<EmbeddingOutput, ColloquyError> {
            Err(ColloquyError::ProviderUnavailable(
                "embedding backend offline".to_string(),
            ))
        }

        async fn embed_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
            Err(ColloquyError::ProviderUnavailable(
                "embedding backend offline".to_string(),
            ))
        }

        fn dimensions(&self) -> usize {
            16
        }
    }

    /// Backend that counts calls, for cache assertions.
    struct CountingBackend {
        inner: LexicalEmbeddingService,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new(dimensions: usize) -> Self {
            Self {
                inner: LexicalEmbeddingService::new(dimensions),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingService for CountingBackend {
        async fn embed(&self, text: &str) -> Result<EmbeddingOutput, ColloquyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
            let mut outputs = Vec::with_capacity(texts.len());
            for text in texts {
                outputs.push(self.embed(text).await?);
            }
            Ok(outputs)
        }

        fn dimensions(&self) -> usize {
            EmbeddingService::dimensions(&self.inner)
        }
    }

    /// Backend that hangs longer than any test timeout.
    struct SlowBackend;

    impl EmbeddingService for SlowBackend {
        async fn embed(&self, _text: &str) -> Result<EmbeddingOutput, ColloquyError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(EmbeddingOutput {
                vector: vec![1.0; 8],
                degraded: false,
            })
        }

        async fn embed_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<EmbeddingOutput>, ColloquyError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    // ---- LexicalEmbeddingService ----

    #[tokio::test]
    async fn test_lexical_dimension() {
        let service = LexicalEmbeddingService::new(384);
        let out = service.embed("hello world").await.unwrap();
        assert_eq!(out.vector.len(), 384);
        assert!(!out.degraded);
    }

    #[tokio::test]
    async fn test_lexical_deterministic() {
        let service = LexicalEmbeddingService::default();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1.vector, v2.vector);
    }

    #[tokio::test]
    async fn test_lexical_different_inputs() {
        let service = LexicalEmbeddingService::default();
        let v1 = service.embed("text one").await.unwrap();
        let v2 = service.embed("entirely different words").await.unwrap();
        assert_ne!(v1.vector, v2.vector);
    }

    #[tokio::test]
    async fn test_lexical_empty_text() {
        let service = LexicalEmbeddingService::default();
        let result = service.embed("   ").await;
        assert!(matches!(result, Err(ColloquyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_lexical_unit_norm() {
        let service = LexicalEmbeddingService::new(128);
        let out = service.embed("normalize this vector please").await.unwrap();
        let norm: f32 = out.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_lexical_shared_vocabulary_scores_higher() {
        let service = LexicalEmbeddingService::new(256);
        let anchor = service.embed("rust tokio async runtime").await.unwrap();
        let related = service.embed("rust tokio channels").await.unwrap();
        let unrelated = service.embed("sourdough bread recipe").await.unwrap();

        let related_score = dot(&anchor.vector, &related.vector);
        let unrelated_score = dot(&anchor.vector, &unrelated.vector);
        assert!(
            related_score > unrelated_score,
            "shared vocabulary should score higher: {} vs {}",
            related_score,
            unrelated_score
        );
    }

    #[tokio::test]
    async fn test_lexical_punctuation_only_text() {
        let service = LexicalEmbeddingService::new(64);
        let out = service.embed("!!! ???").await.unwrap();
        let norm: f32 = out.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_lexical_batch_matches_individual() {
        let service = LexicalEmbeddingService::default();
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = service.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        let single = service.embed("first text").await.unwrap();
        assert_eq!(batch[0].vector, single.vector);
    }

    // ---- ResilientEmbeddingService ----

    #[tokio::test]
    async fn test_resilient_no_primary_not_degraded() {
        let service: ResilientEmbeddingService<FailingBackend> =
            ResilientEmbeddingService::new(None, &test_config(32));
        let out = service.embed("offline by choice").await.unwrap();
        assert!(!out.degraded);
        assert_eq!(out.vector.len(), 32);
    }

    #[tokio::test]
    async fn test_resilient_failing_primary_degrades() {
        let service = ResilientEmbeddingService::new(Some(FailingBackend), &test_config(32));
        let out = service.embed("backend is down").await.unwrap();
        assert!(out.degraded);
        // The fallback vector matches what the lexical service produces for
        // the canonicalized text, at the primary's dimension.
        let lexical = LexicalEmbeddingService::new(16);
        let expected = lexical.embed("backend is down").await.unwrap();
        assert_eq!(out.vector, expected.vector);
    }

    #[tokio::test]
    async fn test_resilient_timeout_degrades() {
        let mut config = test_config(8);
        config.timeout_secs = 0;
        let service = ResilientEmbeddingService::new(Some(SlowBackend), &config);
        let out = service.embed("too slow").await.unwrap();
        assert!(out.degraded);
        assert_eq!(out.vector.len(), 8);
    }

    #[tokio::test]
    async fn test_resilient_empty_text_rejected() {
        let service: ResilientEmbeddingService<FailingBackend> =
            ResilientEmbeddingService::new(None, &test_config(32));
        let result = service.embed("  \n ").await;
        assert!(matches!(result, Err(ColloquyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_resilient_cache_avoids_recompute() {
        let service =
            ResilientEmbeddingService::new(Some(CountingBackend::new(64)), &test_config(64));
        let first = service.embed("cache me").await.unwrap();
        let second = service.embed("cache me").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            service.primary.as_ref().unwrap().calls.load(Ordering::SeqCst),
            1
        );

        service.embed("different text").await.unwrap();
        assert_eq!(
            service.primary.as_ref().unwrap().calls.load(Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn test_resilient_canonicalizes_before_caching() {
        let service =
            ResilientEmbeddingService::new(Some(CountingBackend::new(64)), &test_config(64));
        let a = service.embed("Hello   World").await.unwrap();
        let b = service.embed("hello world").await.unwrap();
        assert_eq!(a.vector, b.vector);
        assert_eq!(
            service.primary.as_ref().unwrap().calls.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_resilient_batch_order_preserved() {
        let service: ResilientEmbeddingService<FailingBackend> =
            ResilientEmbeddingService::new(None, &test_config(32));
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let outputs = service.embed_batch(&texts).await.unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].vector, outputs[2].vector);
        assert_ne!(outputs[0].vector, outputs[1].vector);
    }

    #[tokio::test]
    async fn test_dyn_embedding_service_object() {
        let boxed: Box<dyn DynEmbeddingService> = Box::new(LexicalEmbeddingService::new(48));
        let out = boxed.embed_boxed("dynamic dispatch").await.unwrap();
        assert_eq!(out.vector.len(), 48);
        assert_eq!(boxed.dimensions(), 48);
    }

    // ---- OnnxEmbeddingService ----

    #[test]
    fn test_onnx_missing_model() {
        let result = OnnxEmbeddingService::from_files(
            Path::new("/nonexistent/model.onnx"),
            Path::new("/nonexistent/tokenizer.json"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_for_embedding() {
        assert_eq!(normalize_for_embedding("  Hello   World \n"), "hello world");
        assert_eq!(normalize_for_embedding(""), "");
    }
}
