//! The query engine: scoring, ranking, grounding, and answer synthesis.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use colloquy_core::config::QueryConfig;
use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::types::{
    transcript_text, ConversationFilters, ConversationSnapshot, Embedding, QueryRecord,
    RelevanceScore, ScoredRef, Sentiment,
};
use colloquy_gateway::{CompletionRequest, TextCompletionGateway};
use colloquy_store::ConversationStore;
use colloquy_vector::EmbeddingService;

use crate::context::{truncate_chars, ContextBuilder, ContextEntry};
use crate::related::{self, word_jaccard, RelatedConversation, TrendingTopic};
use crate::respond;

const EMPTY_CORPUS_ANSWER: &str = "No conversations found to query.";
const NO_MATCHES_ANSWER: &str =
    "I couldn't find any relevant conversations matching your query. Try different keywords \
     or check if you have any completed conversations.";

/// Outcome of one corpus query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
    pub relevant_conversations: Vec<RankedConversation>,
    /// Embedded candidates considered, counted before filters were applied.
    pub total_searched: usize,
    /// True when a fallback shaped the answer: lexical scoring, a templated
    /// response, or a degraded backend anywhere along the way.
    pub degraded: bool,
}

/// One ranked match in a query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedConversation {
    pub id: Uuid,
    pub title: String,
    pub relevance_score: RelevanceScore,
    pub summary: Option<String>,
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

struct ScoredCandidate {
    snapshot: ConversationSnapshot,
    score: f64,
}

/// Answers natural-language questions over the analyzed corpus.
///
/// Wiring mirrors the analyzer: a store for snapshots and audit records, an
/// embedding service for query vectors, and a completion gateway for answer
/// synthesis. Each backend can fail independently without taking the query
/// path down.
pub struct QueryEngine<S, E, G> {
    store: Arc<S>,
    embedder: Arc<E>,
    gateway: Arc<G>,
    config: QueryConfig,
    context: ContextBuilder,
}

impl<S, E, G> QueryEngine<S, E, G>
where
    S: ConversationStore,
    E: EmbeddingService,
    G: TextCompletionGateway,
{
    pub fn new(store: Arc<S>, embedder: Arc<E>, gateway: Arc<G>, config: QueryConfig) -> Self {
        let context = ContextBuilder::new(config.context_budget_chars);
        Self {
            store,
            embedder,
            gateway,
            config,
            context,
        }
    }

    /// Answer a question over the analyzed conversations.
    ///
    /// Candidates are the conversations holding an embedding; the supplied
    /// filters narrow them before scoring, while `total_searched` reports
    /// the candidate count from before filtering. Matches are ranked by
    /// similarity (ties go to the newer conversation), truncated to the
    /// configured depth, and handed to the gateway as grounding context.
    /// Every answered query is appended to the audit log, including the
    /// templated short-circuits for an empty corpus or an over-narrow
    /// filter.
    pub async fn query(&self, text: &str, filters: &ConversationFilters) -> Result<QueryResponse> {
        let query = text.trim();
        if query.is_empty() {
            return Err(ColloquyError::InvalidInput(
                "query text must not be empty".to_string(),
            ));
        }

        let snapshots = self
            .store
            .list_conversations(&ConversationFilters::default())
            .await?;
        let candidates: Vec<ConversationSnapshot> = snapshots
            .into_iter()
            .filter(|snapshot| snapshot.embedding.is_some())
            .collect();
        let total_searched = candidates.len();
        if candidates.is_empty() {
            return self.templated(query, EMPTY_CORPUS_ANSWER, total_searched).await;
        }

        let filtered: Vec<ConversationSnapshot> = candidates
            .into_iter()
            .filter(|snapshot| filters.matches(snapshot))
            .collect();
        if filtered.is_empty() {
            return self.templated(query, NO_MATCHES_ANSWER, total_searched).await;
        }

        let (scored, scoring_degraded) = self.score_candidates(query, filtered).await;
        let ranked = rank(scored, self.config.top_k);

        let mut entries = Vec::with_capacity(ranked.len());
        for candidate in &ranked {
            entries.push(ContextEntry {
                title: candidate.snapshot.title.clone(),
                score: RelevanceScore::new(candidate.score).0,
                created_at: candidate.snapshot.created_at,
                summary: candidate.snapshot.summary.clone(),
                excerpt: self.transcript_excerpt(&candidate.snapshot).await,
                topics: candidate.snapshot.topics.clone(),
                sentiment: candidate.snapshot.sentiment,
            });
        }
        let grounding = self.context.build(&entries);

        let relevant: Vec<RankedConversation> = ranked
            .iter()
            .map(|candidate| RankedConversation {
                id: candidate.snapshot.id,
                title: candidate.snapshot.title.clone(),
                relevance_score: RelevanceScore::new(candidate.score),
                summary: candidate.snapshot.summary.clone(),
                topics: candidate.snapshot.topics.clone(),
                sentiment: candidate.snapshot.sentiment,
                created_at: candidate.snapshot.created_at,
                message_count: candidate.snapshot.message_count,
            })
            .collect();

        let request = CompletionRequest::new(respond::answer_prompt(query, &grounding))
            .with_max_tokens(self.config.answer_max_tokens)
            .with_temperature(self.config.answer_temperature);
        let (answer, answer_degraded) = match self.gateway.complete(request).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                (completion.text, completion.degraded)
            }
            Ok(_) => {
                warn!("Completion gateway returned a blank answer, using the template");
                (respond::fallback_answer(&relevant), true)
            }
            Err(error) => {
                warn!(%error, "Answer synthesis failed, using the template");
                (respond::fallback_answer(&relevant), true)
            }
        };

        let response = QueryResponse {
            query: query.to_string(),
            response: answer,
            relevant_conversations: relevant,
            total_searched,
            degraded: scoring_degraded || answer_degraded,
        };
        self.audit(&response).await?;
        info!(
            query = %response.query,
            total_searched,
            results = response.relevant_conversations.len(),
            degraded = response.degraded,
            "Query answered"
        );
        Ok(response)
    }

    /// Conversations related to an anchor, best first.
    pub async fn related(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RelatedConversation>> {
        let anchor = self.store.get_conversation(conversation_id).await?;
        let snapshots = self
            .store
            .list_conversations(&ConversationFilters::default())
            .await?;
        let matches = related::related_conversations(&anchor, &snapshots, limit);
        debug!(
            conversation_id = %conversation_id,
            matches = matches.len(),
            "Computed related conversations"
        );
        Ok(matches)
    }

    /// Topics trending across conversations ended within the trailing window.
    pub async fn trending(&self, days: i64) -> Result<Vec<TrendingTopic>> {
        let snapshots = self
            .store
            .list_conversations(&ConversationFilters::default())
            .await?;
        Ok(related::trending_topics(&snapshots, Utc::now(), days))
    }

    /// Answer without scoring anything. Still audited, so the query history
    /// stays complete.
    async fn templated(
        &self,
        query: &str,
        answer: &str,
        total_searched: usize,
    ) -> Result<QueryResponse> {
        let response = QueryResponse {
            query: query.to_string(),
            response: answer.to_string(),
            relevant_conversations: Vec::new(),
            total_searched,
            degraded: false,
        };
        self.audit(&response).await?;
        info!(
            query = %response.query,
            total_searched,
            "Query answered without candidates"
        );
        Ok(response)
    }

    /// Score candidates against the query embedding, or against word overlap
    /// when no query embedding can be produced.
    async fn score_candidates(
        &self,
        query: &str,
        candidates: Vec<ConversationSnapshot>,
    ) -> (Vec<ScoredCandidate>, bool) {
        match self.embedder.embed(query).await {
            Ok(output) => match Embedding::new(output.vector) {
                Ok(query_embedding) => {
                    let scored = candidates
                        .into_iter()
                        .map(|snapshot| {
                            let score = snapshot
                                .embedding
                                .as_ref()
                                .map_or(0.0, |stored| query_embedding.dot(stored));
                            ScoredCandidate { snapshot, score }
                        })
                        .collect();
                    (scored, output.degraded)
                }
                Err(message) => {
                    warn!(message, "Query embedding rejected, scoring lexically");
                    (lexical_scores(query, candidates), true)
                }
            },
            Err(error) => {
                warn!(%error, "Query embedding failed, scoring lexically");
                (lexical_scores(query, candidates), true)
            }
        }
    }

    /// Leading transcript text for candidates without a summary. Transcript
    /// fetch failures cost the entry its excerpt line, nothing more.
    async fn transcript_excerpt(&self, snapshot: &ConversationSnapshot) -> Option<String> {
        if snapshot.summary.is_some() {
            return None;
        }
        match self.store.get_messages(snapshot.id).await {
            Ok(messages) if !messages.is_empty() => Some(truncate_chars(
                &transcript_text(&messages),
                self.config.excerpt_chars,
            )),
            Ok(_) => None,
            Err(error) => {
                debug!(
                    %error,
                    conversation_id = %snapshot.id,
                    "Transcript unavailable for context"
                );
                None
            }
        }
    }

    async fn audit(&self, response: &QueryResponse) -> Result<()> {
        let results = response
            .relevant_conversations
            .iter()
            .map(|conversation| ScoredRef {
                conversation_id: conversation.id,
                score: conversation.relevance_score.0,
            })
            .collect();
        let record = QueryRecord::new(response.query.clone(), response.response.clone(), results);
        self.store.record_query(&record).await
    }
}

/// Sort by score, ties newest first, and keep the top entries.
fn rank(mut scored: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.snapshot.created_at.cmp(&a.snapshot.created_at))
    });
    scored.truncate(top_k);
    scored
}

fn lexical_scores(query: &str, candidates: Vec<ConversationSnapshot>) -> Vec<ScoredCandidate> {
    candidates
        .into_iter()
        .map(|snapshot| {
            let score = word_jaccard(query, &searchable_text(&snapshot));
            ScoredCandidate { snapshot, score }
        })
        .collect()
}

/// The candidate text a query is compared against when scoring lexically.
fn searchable_text(snapshot: &ConversationSnapshot) -> String {
    let mut text = format!("{}. ", snapshot.title);
    if let Some(summary) = &snapshot.summary {
        text.push_str(summary);
        text.push_str(". ");
    }
    if !snapshot.topics.is_empty() {
        text.push_str(&format!("Topics: {}.", snapshot.topics.join(", ")));
    }
    text
}
