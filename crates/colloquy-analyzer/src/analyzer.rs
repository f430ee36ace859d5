//! The post-conversation analysis pipeline.
//!
//! When a conversation ends, four artifacts get computed and persisted:
//! a summary, a topic list, a sentiment label, and a transcript embedding.
//! The artifacts are independent. One failing leaves the others standing,
//! the failed field stays null, and a later run recomputes only what is
//! still null.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use colloquy_core::config::AnalysisConfig;
use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::types::{
    transcript_text, AnalysisUpdate, Conversation, ConversationStats, Embedding, Message,
    Sentiment,
};
use colloquy_gateway::{CompletionRequest, TextCompletionGateway};
use colloquy_store::ConversationStore;
use colloquy_vector::EmbeddingService;

use crate::extract::{compute_stats, InsightExtractor};
use crate::lexical;
use crate::summarizer::Summarizer;

/// What happened to one artifact during an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactOutcome<T> {
    /// Computed this run and persisted.
    Computed(T),
    /// Stored by an earlier run and left untouched.
    AlreadyPresent,
    /// Could not be computed. The field stays null so a later run retries.
    Failed(String),
}

impl<T> ArtifactOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            ArtifactOutcome::Computed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactOutcome::Failed(_))
    }
}

/// Full result of one analysis run over an ended conversation.
///
/// The four artifact fields mirror what was persisted. Insights (decisions,
/// action items, key points) and statistics are derived on every run and
/// returned but never stored.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub conversation_id: Uuid,
    pub summary: ArtifactOutcome<String>,
    pub topics: ArtifactOutcome<Vec<String>>,
    pub sentiment: ArtifactOutcome<Sentiment>,
    pub embedding: ArtifactOutcome<Embedding>,
    /// True when any artifact came from a fallback path this run.
    pub degraded: bool,
    pub stats: ConversationStats,
    pub decisions: Vec<String>,
    pub action_items: Vec<String>,
    pub key_points: Vec<String>,
}

impl AnalysisReport {
    /// Names of artifacts that failed this run, in a fixed order.
    pub fn failed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.summary.is_failed() {
            fields.push("summary".to_string());
        }
        if self.topics.is_failed() {
            fields.push("topics".to_string());
        }
        if self.sentiment.is_failed() {
            fields.push("sentiment".to_string());
        }
        if self.embedding.is_failed() {
            fields.push("embedding".to_string());
        }
        fields
    }

    pub fn has_failures(&self) -> bool {
        self.summary.is_failed()
            || self.topics.is_failed()
            || self.sentiment.is_failed()
            || self.embedding.is_failed()
    }
}

/// Result of ending a conversation: the final record plus its analysis.
#[derive(Debug, Clone)]
pub struct EndedConversation {
    pub conversation: Conversation,
    pub report: AnalysisReport,
}

/// Runs the analysis pipeline against a store, an embedding service, and a
/// completion gateway.
pub struct ConversationAnalyzer<S, E, G> {
    store: Arc<S>,
    embedder: Arc<E>,
    gateway: Arc<G>,
    summarizer: Summarizer<G>,
    extractor: InsightExtractor,
    config: AnalysisConfig,
    runs: AtomicUsize,
}

impl<S, E, G> ConversationAnalyzer<S, E, G>
where
    S: ConversationStore,
    E: EmbeddingService,
    G: TextCompletionGateway,
{
    pub fn new(store: Arc<S>, embedder: Arc<E>, gateway: Arc<G>, config: AnalysisConfig) -> Self {
        Self {
            summarizer: Summarizer::new(Arc::clone(&gateway), config.clone()),
            extractor: InsightExtractor::new(),
            store,
            embedder,
            gateway,
            config,
            runs: AtomicUsize::new(0),
        }
    }

    /// Number of analysis runs this instance has performed.
    pub fn analyses_run(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// End an active conversation and analyze it.
    ///
    /// The active-to-ended transition has exactly one winner under
    /// concurrency; every other caller gets `ConcurrentEndAttempt` and no
    /// second analysis runs. A conversation with no messages is rejected
    /// before the transition and stays active.
    pub async fn end_conversation(&self, conversation_id: Uuid) -> Result<EndedConversation> {
        let messages = self.store.get_messages(conversation_id).await?;
        if messages.is_empty() {
            return Err(ColloquyError::InvalidInput(format!(
                "cannot end conversation {} with no messages",
                conversation_id
            )));
        }

        if !self.store.transition_to_ended(conversation_id).await? {
            return Err(ColloquyError::ConcurrentEndAttempt(conversation_id));
        }

        let report = self.analyze(conversation_id).await?;
        let conversation = self.store.get_conversation(conversation_id).await?;
        Ok(EndedConversation {
            conversation,
            report,
        })
    }

    /// Analyze an ended conversation.
    ///
    /// Only null artifacts are computed; fields an earlier run already
    /// persisted are left untouched, so re-running after a partial failure
    /// fills exactly the holes. Artifact failures never fail the call: the
    /// report records them and the fields stay null.
    pub async fn analyze(&self, conversation_id: Uuid) -> Result<AnalysisReport> {
        let conversation = self.store.get_conversation(conversation_id).await?;
        if !conversation.is_ended() {
            return Err(ColloquyError::InvalidInput(format!(
                "conversation {} is still active, only ended conversations are analyzed",
                conversation_id
            )));
        }
        let messages = self.store.get_messages(conversation_id).await?;
        if messages.is_empty() {
            return Err(ColloquyError::InvalidInput(format!(
                "conversation {} has no messages to analyze",
                conversation_id
            )));
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        // The labeled transcript feeds prompts and the embedding; lexical
        // word counting reads bare message content so sender labels never
        // surface as topics.
        let transcript = transcript_text(&messages);
        let content = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let (summary_outcome, topics_outcome, sentiment_outcome, embedding_outcome) = tokio::join!(
            self.compute_summary(conversation.summary.is_none(), &messages),
            self.compute_topics(conversation.topics.is_empty(), &transcript, &content),
            self.compute_sentiment(conversation.sentiment.is_none(), &transcript, &content),
            self.compute_embedding(conversation.embedding.is_none(), &transcript),
        );
        let (summary, summary_degraded) = summary_outcome;
        let (topics, topics_degraded) = topics_outcome;
        let (sentiment, sentiment_degraded) = sentiment_outcome;
        let (embedding, embedding_degraded) = embedding_outcome;
        let degraded =
            summary_degraded || topics_degraded || sentiment_degraded || embedding_degraded;

        let update = AnalysisUpdate {
            summary: summary.value().cloned(),
            topics: topics.value().cloned(),
            sentiment: sentiment.value().copied(),
            embedding: embedding.value().cloned(),
        };
        if !update.is_empty() {
            self.store.persist_analysis(conversation_id, &update).await?;
        }

        let report = AnalysisReport {
            conversation_id,
            summary,
            topics,
            sentiment,
            embedding,
            degraded,
            stats: compute_stats(&conversation, &messages),
            decisions: self.extractor.decisions(&messages),
            action_items: self.extractor.action_items(&messages),
            key_points: self.extractor.key_points(&messages),
        };

        if report.has_failures() {
            let partial = ColloquyError::AnalysisPartialFailure {
                conversation_id,
                failed_fields: report.failed_fields(),
            };
            warn!("{}", partial);
        } else {
            info!(conversation_id = %conversation_id, degraded, "Analysis complete");
        }
        Ok(report)
    }

    async fn compute_summary(
        &self,
        needed: bool,
        messages: &[Message],
    ) -> (ArtifactOutcome<String>, bool) {
        if !needed {
            return (ArtifactOutcome::AlreadyPresent, false);
        }
        match self.summarizer.summarize(messages).await {
            Ok(response) => {
                let degraded = response.degraded;
                (ArtifactOutcome::Computed(response.text), degraded)
            }
            Err(e) => {
                warn!(error = %e, "Summary failed, field stays null for a later run");
                (ArtifactOutcome::Failed(e.to_string()), false)
            }
        }
    }

    async fn compute_topics(
        &self,
        needed: bool,
        transcript: &str,
        content: &str,
    ) -> (ArtifactOutcome<Vec<String>>, bool) {
        if !needed {
            return (ArtifactOutcome::AlreadyPresent, false);
        }
        let prompt = format!(
            "List the main topics discussed in this conversation as a comma-separated list of \
             short phrases. Topics only, no commentary.\n\n{}",
            transcript
        );
        let request = CompletionRequest::new(prompt)
            .with_max_tokens(60)
            .with_temperature(0.3);

        match self.gateway.complete(request).await {
            Ok(response) => {
                // The mock echoes prompt terms rather than reading the
                // conversation; frequency extraction over the content is the
                // better source in that case.
                if response.is_mock() {
                    return (
                        ArtifactOutcome::Computed(lexical::extract_topics(
                            content,
                            self.config.max_topics,
                        )),
                        response.degraded,
                    );
                }
                let parsed = lexical::parse_topic_list(&response.text, self.config.max_topics);
                if parsed.is_empty() {
                    warn!("Topic completion parsed to nothing, extracting lexically");
                    (
                        ArtifactOutcome::Computed(lexical::extract_topics(
                            content,
                            self.config.max_topics,
                        )),
                        true,
                    )
                } else {
                    (ArtifactOutcome::Computed(parsed), response.degraded)
                }
            }
            Err(e) => {
                warn!(error = %e, "Topic completion failed, extracting lexically");
                (
                    ArtifactOutcome::Computed(lexical::extract_topics(
                        content,
                        self.config.max_topics,
                    )),
                    true,
                )
            }
        }
    }

    async fn compute_sentiment(
        &self,
        needed: bool,
        transcript: &str,
        content: &str,
    ) -> (ArtifactOutcome<Sentiment>, bool) {
        if !needed {
            return (ArtifactOutcome::AlreadyPresent, false);
        }
        let prompt = format!(
            "Classify the overall sentiment of this conversation. Answer with exactly one label: \
             very positive, positive, neutral, negative, or very negative.\n\n{}",
            transcript
        );
        let request = CompletionRequest::new(prompt)
            .with_max_tokens(8)
            .with_temperature(0.0);

        match self.gateway.complete(request).await {
            Ok(response) => {
                // The mock's label is canned; the word-level classifier at
                // least reads the conversation.
                if response.is_mock() {
                    return (
                        ArtifactOutcome::Computed(lexical::classify_sentiment(content)),
                        response.degraded,
                    );
                }
                match Sentiment::from_label(&response.text) {
                    Some(sentiment) => (ArtifactOutcome::Computed(sentiment), response.degraded),
                    None => {
                        warn!(
                            label = %response.text,
                            "Unparseable sentiment label, classifying lexically"
                        );
                        (
                            ArtifactOutcome::Computed(lexical::classify_sentiment(content)),
                            true,
                        )
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Sentiment failed, field stays null for a later run");
                (ArtifactOutcome::Failed(e.to_string()), false)
            }
        }
    }

    async fn compute_embedding(
        &self,
        needed: bool,
        transcript: &str,
    ) -> (ArtifactOutcome<Embedding>, bool) {
        if !needed {
            return (ArtifactOutcome::AlreadyPresent, false);
        }
        match self.embedder.embed(transcript).await {
            Ok(output) => match Embedding::new(output.vector) {
                Ok(embedding) => (ArtifactOutcome::Computed(embedding), output.degraded),
                Err(msg) => (ArtifactOutcome::Failed(msg.to_string()), false),
            },
            Err(e) => {
                warn!(error = %e, "Embedding failed, field stays null for a later run");
                (ArtifactOutcome::Failed(e.to_string()), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use colloquy_core::config::GatewayConfig;
    use colloquy_core::types::{ConversationStatus, Sender};
    use colloquy_gateway::{CompletionResponse, ProviderChainGateway};
    use colloquy_store::MemoryStore;
    use colloquy_vector::LexicalEmbeddingService;

    async fn seed_conversation(store: &MemoryStore, messages: &[(Sender, &str)]) -> Uuid {
        let conversation = store.create_conversation("Test chat").await.unwrap();
        for (sender, content) in messages {
            store
                .append_message(conversation.id, *sender, content)
                .await
                .unwrap();
        }
        conversation.id
    }

    fn offline_analyzer(
        store: Arc<MemoryStore>,
    ) -> ConversationAnalyzer<MemoryStore, LexicalEmbeddingService, ProviderChainGateway> {
        ConversationAnalyzer::new(
            store,
            Arc::new(LexicalEmbeddingService::new(64)),
            Arc::new(ProviderChainGateway::with_providers(
                Vec::new(),
                &GatewayConfig::default(),
            )),
            AnalysisConfig::default(),
        )
    }

    /// Gateway whose every completion fails.
    struct FailingGateway;

    impl TextCompletionGateway for FailingGateway {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ColloquyError> {
            Err(ColloquyError::ProviderUnavailable(
                "scripted outage".to_string(),
            ))
        }
    }

    /// Gateway answering each artifact prompt with a fixed healthy response.
    struct ScriptedGateway {
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextCompletionGateway for ScriptedGateway {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ColloquyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = if request.prompt.starts_with("Summarize") {
                "A crisp scripted summary."
            } else if request.prompt.starts_with("Classify") {
                "positive"
            } else {
                "rust, tokio"
            };
            Ok(CompletionResponse {
                text: text.to_string(),
                provider: "scripted".to_string(),
                degraded: false,
            })
        }
    }

    /// Gateway that answers every prompt with the same unparseable text.
    struct GibberishGateway;

    impl TextCompletionGateway for GibberishGateway {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ColloquyError> {
            Ok(CompletionResponse {
                text: "ecstatic beyond words".to_string(),
                provider: "scripted".to_string(),
                degraded: false,
            })
        }
    }

    // ---- Ending a conversation ----

    #[tokio::test]
    async fn test_end_conversation_offline_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[
                (
                    Sender::User,
                    "What is the best way to structure the deployment pipeline?",
                ),
                (
                    Sender::Ai,
                    "Start small. You need to script the deployment steps first.",
                ),
                (
                    Sender::User,
                    "Thanks, that is a great start. We decided to automate the deployment \
                     pipeline this sprint.",
                ),
            ],
        )
        .await;
        let analyzer = offline_analyzer(store.clone());

        let ended = analyzer.end_conversation(id).await.unwrap();
        assert!(ended.conversation.is_ended());
        assert!(ended.conversation.ended_at.is_some());

        let report = &ended.report;
        assert!(!report.degraded);
        assert!(!report.has_failures());

        let summary = report.summary.value().unwrap();
        assert!(summary.starts_with("The conversation covered:"));

        let topics = report.topics.value().unwrap();
        assert!(topics.contains(&"deployment".to_string()));
        assert!(topics.contains(&"pipeline".to_string()));

        // "thanks", "great", "best" and no negative words.
        assert_eq!(report.sentiment.value(), Some(&Sentiment::VeryPositive));

        assert_eq!(report.embedding.value().unwrap().dimension(), 64);

        // Insights come from the same pass.
        assert!(report
            .decisions
            .iter()
            .any(|d| d.contains("decided to automate")));
        assert!(report
            .action_items
            .iter()
            .any(|a| a.contains("script the deployment steps")));
        assert!(report
            .key_points
            .iter()
            .any(|k| k.ends_with("deployment pipeline?")));
        assert_eq!(report.stats.message_count, 3);
        assert_eq!(report.stats.user_messages, 2);

        // Artifacts were persisted.
        let stored = store.get_conversation(id).await.unwrap();
        assert!(stored.summary.is_some());
        assert!(!stored.topics.is_empty());
        assert_eq!(stored.sentiment, Some(Sentiment::VeryPositive));
        assert!(stored.embedding.is_some());

        assert_eq!(analyzer.analyses_run(), 1);
    }

    #[tokio::test]
    async fn test_end_conversation_twice_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(&store, &[(Sender::User, "hello there")]).await;
        let analyzer = offline_analyzer(store);

        analyzer.end_conversation(id).await.unwrap();
        let err = analyzer.end_conversation(id).await.unwrap_err();
        assert!(matches!(err, ColloquyError::ConcurrentEndAttempt(_)));
        assert_eq!(analyzer.analyses_run(), 1);
    }

    #[tokio::test]
    async fn test_end_conversation_without_messages_rejected() {
        let store = Arc::new(MemoryStore::new());
        let conversation = store.create_conversation("Empty").await.unwrap();
        let analyzer = offline_analyzer(store.clone());

        let err = analyzer.end_conversation(conversation.id).await.unwrap_err();
        assert!(matches!(err, ColloquyError::InvalidInput(_)));

        // The rejection happened before any transition.
        let stored = store.get_conversation(conversation.id).await.unwrap();
        assert_eq!(stored.status, ConversationStatus::Active);
        assert_eq!(analyzer.analyses_run(), 0);
    }

    #[tokio::test]
    async fn test_end_missing_conversation() {
        let analyzer = offline_analyzer(Arc::new(MemoryStore::new()));
        let err = analyzer.end_conversation(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ColloquyError::NotFound(_)));
    }

    // ---- Failure isolation ----

    #[tokio::test]
    async fn test_gateway_outage_keeps_topics_and_embedding() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[
                (
                    Sender::User,
                    "The billing migration is wrong and the invoice numbers are wrong.",
                ),
                (Sender::Ai, "The migration problem is in the invoice mapping."),
            ],
        )
        .await;
        let analyzer = ConversationAnalyzer::new(
            store.clone(),
            Arc::new(LexicalEmbeddingService::new(32)),
            Arc::new(FailingGateway),
            AnalysisConfig::default(),
        );

        // No error reaches the caller even though two artifacts failed.
        let ended = analyzer.end_conversation(id).await.unwrap();
        let report = &ended.report;

        assert!(report.summary.is_failed());
        assert!(report.sentiment.is_failed());
        assert_eq!(
            report.failed_fields(),
            vec!["summary".to_string(), "sentiment".to_string()]
        );

        // Topics fell back to frequency extraction; embedding never touched
        // the gateway.
        let topics = report.topics.value().unwrap();
        assert!(topics.contains(&"migration".to_string()));
        assert!(topics.contains(&"invoice".to_string()));
        assert!(report.embedding.value().is_some());
        assert!(report.degraded);

        // Failed fields stay null in the store, computed ones persist.
        let stored = store.get_conversation(id).await.unwrap();
        assert!(stored.summary.is_none());
        assert!(stored.sentiment.is_none());
        assert!(!stored.topics.is_empty());
        assert!(stored.embedding.is_some());
    }

    #[tokio::test]
    async fn test_second_run_fills_only_null_fields() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[
                (
                    Sender::User,
                    "The billing migration is wrong and the invoice numbers are wrong.",
                ),
                (Sender::Ai, "The migration problem is in the invoice mapping."),
            ],
        )
        .await;

        // First run with the gateway down: summary and sentiment stay null.
        let broken = ConversationAnalyzer::new(
            store.clone(),
            Arc::new(LexicalEmbeddingService::new(32)),
            Arc::new(FailingGateway),
            AnalysisConfig::default(),
        );
        broken.end_conversation(id).await.unwrap();
        let after_first = store.get_conversation(id).await.unwrap();
        let first_topics = after_first.topics.clone();
        let first_embedding = after_first.embedding.clone();

        // Second run with a healthy (offline) gateway fills the holes.
        let healthy = offline_analyzer(store.clone());
        let report = healthy.analyze(id).await.unwrap();

        assert!(report.summary.value().is_some());
        assert!(report.sentiment.value().is_some());
        assert_eq!(report.topics, ArtifactOutcome::AlreadyPresent);
        assert_eq!(report.embedding, ArtifactOutcome::AlreadyPresent);

        let stored = store.get_conversation(id).await.unwrap();
        assert!(stored.summary.is_some());
        assert!(stored.sentiment.is_some());
        // Untouched fields kept their first-run values.
        assert_eq!(stored.topics, first_topics);
        assert_eq!(stored.embedding, first_embedding);
    }

    #[tokio::test]
    async fn test_analyze_active_conversation_rejected() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(&store, &[(Sender::User, "still going")]).await;
        let analyzer = offline_analyzer(store);

        let err = analyzer.analyze(id).await.unwrap_err();
        assert!(matches!(err, ColloquyError::InvalidInput(_)));
        assert_eq!(analyzer.analyses_run(), 0);
    }

    // ---- Artifact fidelity ----

    #[tokio::test]
    async fn test_unparseable_sentiment_label_classified_from_text() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[(Sender::User, "thanks, this is great and really helpful")],
        )
        .await;
        let analyzer = ConversationAnalyzer::new(
            store,
            Arc::new(LexicalEmbeddingService::new(32)),
            Arc::new(GibberishGateway),
            AnalysisConfig::default(),
        );

        let ended = analyzer.end_conversation(id).await.unwrap();
        // "ecstatic beyond words" is not a scale label; the word-level
        // classifier reads the all-positive transcript instead.
        assert_eq!(
            ended.report.sentiment.value(),
            Some(&Sentiment::VeryPositive)
        );
        assert!(ended.report.degraded);
    }

    #[tokio::test]
    async fn test_mock_sentiment_reflects_transcript_not_canned_label() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[(Sender::User, "This is terrible, awful, and just wrong.")],
        )
        .await;
        let analyzer = offline_analyzer(store);

        let ended = analyzer.end_conversation(id).await.unwrap();
        // The offline mock always says "neutral"; the lexical classifier is
        // used instead so the label tracks the actual text.
        assert_eq!(
            ended.report.sentiment.value(),
            Some(&Sentiment::VeryNegative)
        );
    }

    #[tokio::test]
    async fn test_scripted_provider_artifacts_parsed_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[
                (Sender::User, "tell me about async runtimes"),
                (Sender::Ai, "They schedule tasks over a thread pool."),
            ],
        )
        .await;
        let gateway = Arc::new(ScriptedGateway::new());
        let analyzer = ConversationAnalyzer::new(
            store.clone(),
            Arc::new(LexicalEmbeddingService::new(32)),
            Arc::clone(&gateway),
            AnalysisConfig::default(),
        );

        let ended = analyzer.end_conversation(id).await.unwrap();
        let report = &ended.report;
        assert_eq!(
            report.summary.value(),
            Some(&"A crisp scripted summary.".to_string())
        );
        assert_eq!(
            report.topics.value(),
            Some(&vec!["rust".to_string(), "tokio".to_string()])
        );
        assert_eq!(report.sentiment.value(), Some(&Sentiment::Positive));
        assert!(!report.degraded);
        // One call per null artifact: summary, topics, sentiment.
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reanalysis_with_all_fields_present_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_conversation(
            &store,
            &[
                (Sender::User, "tell me about async runtimes"),
                (Sender::Ai, "They schedule tasks over a thread pool."),
            ],
        )
        .await;
        let gateway = Arc::new(ScriptedGateway::new());
        let analyzer = ConversationAnalyzer::new(
            store,
            Arc::new(LexicalEmbeddingService::new(32)),
            Arc::clone(&gateway),
            AnalysisConfig::default(),
        );

        analyzer.end_conversation(id).await.unwrap();
        let report = analyzer.analyze(id).await.unwrap();

        assert_eq!(report.summary, ArtifactOutcome::AlreadyPresent);
        assert_eq!(report.topics, ArtifactOutcome::AlreadyPresent);
        assert_eq!(report.sentiment, ArtifactOutcome::AlreadyPresent);
        assert_eq!(report.embedding, ArtifactOutcome::AlreadyPresent);
        // No further gateway traffic on the second run.
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(analyzer.analyses_run(), 2);
    }
}
