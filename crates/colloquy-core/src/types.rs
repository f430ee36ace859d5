use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle state of a conversation.
///
/// The transition is one-way: `Active` becomes `Ended` exactly once, and an
/// ended conversation never becomes active again. Analysis fields are only
/// ever written to an ended conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Ended,
}

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

/// Overall tone of a conversation on a fixed five-point scale.
///
/// Variant order defines the scale: `VeryNegative` is the lowest, and derived
/// `Ord` comparisons follow declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::VeryNegative => "very_negative",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
            Sentiment::VeryPositive => "very_positive",
        }
    }

    /// Parse a label leniently: trims, lowercases, and accepts either
    /// underscore or space separators. Returns `None` for anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        let normalized = normalized.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        match normalized {
            "very_negative" => Some(Sentiment::VeryNegative),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            "positive" => Some(Sentiment::Positive),
            "very_positive" => Some(Sentiment::VeryPositive),
            _ => None,
        }
    }

    /// Number of steps between two labels on the scale.
    pub fn scale_distance(&self, other: &Sentiment) -> u8 {
        let a = *self as i8;
        let b = *other as i8;
        (a - b).unsigned_abs()
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Relevance score for ranked results. Range: 0.0 (no match) to 1.0 (perfect
/// match). Construction clamps out-of-range values.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RelevanceScore(pub f64);

impl RelevanceScore {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }
}

/// A fixed-length embedding vector.
///
/// Invariant: non-empty. All vectors produced by one embedding backend share
/// that backend's dimension, and similarity is only meaningful between
/// vectors of equal dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(data: Vec<f32>) -> std::result::Result<Self, &'static str> {
        if data.is_empty() {
            return Err("Embedding must not be empty");
        }
        Ok(Self(data))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Dot product. Vectors produced by the embedding service are
    /// L2-normalized, so this equals cosine similarity. Mismatched
    /// dimensions score 0.0.
    pub fn dot(&self, other: &Embedding) -> f64 {
        if self.0.len() != other.0.len() {
            return 0.0;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum()
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        let dot = self.dot(other);
        let mag_a: f64 = self.0.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        let mag_b: f64 = other
            .0
            .iter()
            .map(|x| (*x as f64).powi(2))
            .sum::<f64>()
            .sqrt();
        if mag_a == 0.0 || mag_b == 0.0 {
            return 0.0;
        }
        dot / (mag_a * mag_b)
    }

    /// Whether the L2 norm is 1.0 within floating tolerance.
    pub fn is_unit_norm(&self) -> bool {
        let norm: f64 = self.0.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        (norm - 1.0).abs() < 1e-4
    }
}

// =============================================================================
// Topic normalization
// =============================================================================

/// Normalize a raw topic phrase: lowercase, trim, collapse inner whitespace.
/// Returns `None` when nothing remains.
pub fn normalize_topic(raw: &str) -> Option<String> {
    let collapsed = raw
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Normalize a list of topic phrases: per-item normalization, duplicates
/// merged keeping first-seen order, capped at `max`.
pub fn normalize_topics(raw: impl IntoIterator<Item = String>, max: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in raw {
        if seen.len() >= max {
            break;
        }
        if let Some(topic) = normalize_topic(&item) {
            if !seen.contains(&topic) {
                seen.push(topic);
            }
        }
    }
    seen
}

// =============================================================================
// Entities
// =============================================================================

/// A chat session between a user and an assistant.
///
/// Owned by the storage layer. The four analysis fields (`summary`, `topics`,
/// `sentiment`, `embedding`) start empty and are filled in once, after the
/// conversation has ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub embedding: Option<Embedding>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: ConversationStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
            summary: None,
            topics: Vec::new(),
            sentiment: None,
            embedding: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status == ConversationStatus::Ended
    }

    /// Seconds between creation and end. `None` while still active.
    pub fn duration_secs(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.created_at).num_seconds())
    }
}

/// A single message within a conversation. Append-only; content and
/// attribution never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Canonical transcript of an ordered message list: one `sender: content`
/// line per message, in timestamp order. This exact join is what gets
/// embedded at analysis time, so the query side compares against it.
pub fn transcript_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An immutable read-model of a conversation plus its message count, as
/// returned by the storage layer for listing and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub id: Uuid,
    pub title: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub embedding: Option<Embedding>,
    pub message_count: usize,
}

impl ConversationSnapshot {
    pub fn from_conversation(conversation: &Conversation, message_count: usize) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title.clone(),
            status: conversation.status,
            created_at: conversation.created_at,
            ended_at: conversation.ended_at,
            summary: conversation.summary.clone(),
            topics: conversation.topics.clone(),
            sentiment: conversation.sentiment,
            embedding: conversation.embedding.clone(),
            message_count,
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Optional restrictions on a conversation listing. All supplied filters
/// must hold for a conversation to pass (conjunctive).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationFilters {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub topics: Option<Vec<String>>,
}

impl ConversationFilters {
    pub fn is_empty(&self) -> bool {
        self.date_from.is_none() && self.date_to.is_none() && self.topics.is_none()
    }

    /// Whether a snapshot passes every supplied filter. The topic filter
    /// passes when at least one requested topic appears in the
    /// conversation's topic set (compared after normalization).
    pub fn matches(&self, snapshot: &ConversationSnapshot) -> bool {
        if let Some(from) = self.date_from {
            if snapshot.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if snapshot.created_at > to {
                return false;
            }
        }
        if let Some(required) = &self.topics {
            let wanted: Vec<String> = required
                .iter()
                .filter_map(|t| normalize_topic(t))
                .collect();
            if !wanted.is_empty() && !wanted.iter().any(|t| snapshot.topics.contains(t)) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Analysis payloads
// =============================================================================

/// Partial-field update for a conversation's analysis artifacts. `None`
/// fields are left untouched by the storage layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisUpdate {
    pub summary: Option<String>,
    pub topics: Option<Vec<String>>,
    pub sentiment: Option<Sentiment>,
    pub embedding: Option<Embedding>,
}

impl AnalysisUpdate {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.topics.is_none()
            && self.sentiment.is_none()
            && self.embedding.is_none()
    }
}

/// Derived statistics over a conversation's message history. Computed on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub message_count: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    pub total_words: usize,
    pub avg_words_per_message: f64,
    pub duration_secs: Option<i64>,
}

// =============================================================================
// Query audit
// =============================================================================

/// A conversation reference with its relevance score, as stored in the
/// query audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRef {
    pub conversation_id: Uuid,
    pub score: f64,
}

/// Write-once audit record of a corpus query: what was asked, what was
/// answered, and which conversations grounded the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: Uuid,
    pub query_text: String,
    pub response: String,
    pub results: Vec<ScoredRef>,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(query_text: impl Into<String>, response: impl Into<String>, results: Vec<ScoredRef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_text: query_text.into(),
            response: response.into(),
            results,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
