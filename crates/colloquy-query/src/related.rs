//! Related-conversation suggestions and trending topics.
//!
//! Pure scoring over store snapshots. Related conversations are ranked by
//! weighted signals (shared topics, sentiment, recency, title and summary
//! overlap) with a human-readable reason per match; trending counts topic
//! occurrences across recently created ended conversations.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use colloquy_core::types::{Conversation, ConversationSnapshot, ConversationStatus, Sentiment};

/// Candidates scoring at or below this are not similar enough to surface.
const MIN_SIMILARITY: f64 = 0.1;
/// Shared topics listed in a reason string.
const REASON_TOPIC_LIMIT: usize = 3;
/// Trending entries returned.
const TRENDING_LIMIT: usize = 10;

/// A conversation related to the anchor, with the signals that matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedConversation {
    pub id: Uuid,
    pub title: String,
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub created_at: DateTime<Utc>,
    pub similarity_score: f64,
    pub reason: String,
}

/// One trending topic over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub topic: String,
    pub conversation_count: usize,
    /// Share of recent conversations mentioning the topic, in percent,
    /// rounded to one decimal place.
    pub percentage: f64,
}

/// Score every other analyzed conversation against the anchor and return
/// the closest matches, best first.
///
/// The anchor itself is never a match. Candidates without topics have not
/// been analyzed yet and are skipped, as are active conversations; scores
/// at or below the minimum are dropped.
pub fn related_conversations(
    anchor: &Conversation,
    candidates: &[ConversationSnapshot],
    limit: usize,
) -> Vec<RelatedConversation> {
    let mut scored: Vec<(&ConversationSnapshot, f64)> = candidates
        .iter()
        .filter(|candidate| {
            candidate.id != anchor.id
                && candidate.status == ConversationStatus::Ended
                && !candidate.topics.is_empty()
        })
        .map(|candidate| (candidate, similarity_score(anchor, candidate)))
        .filter(|(_, score)| *score > MIN_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(candidate, score)| RelatedConversation {
            id: candidate.id,
            title: candidate.title.clone(),
            topics: candidate.topics.clone(),
            sentiment: candidate.sentiment,
            created_at: candidate.created_at,
            similarity_score: score,
            reason: similarity_reason(anchor, candidate),
        })
        .collect()
}

/// Count topics across ended conversations created in the trailing window.
///
/// Entries are sorted by conversation count, ties alphabetically, and
/// capped at ten. The percentage is relative to the recent window, not the
/// whole corpus.
pub fn trending_topics(
    snapshots: &[ConversationSnapshot],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<TrendingTopic> {
    let cutoff = now - chrono::Duration::days(days);
    let recent: Vec<&ConversationSnapshot> = snapshots
        .iter()
        .filter(|s| s.status == ConversationStatus::Ended && s.created_at >= cutoff)
        .collect();
    if recent.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for snapshot in &recent {
        for topic in &snapshot.topics {
            *counts.entry(topic.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(TRENDING_LIMIT);

    let total = recent.len() as f64;
    ranked
        .into_iter()
        .map(|(topic, count)| TrendingTopic {
            topic: topic.to_string(),
            conversation_count: count,
            percentage: round_one_decimal(count as f64 / total * 100.0),
        })
        .collect()
}

/// Weighted similarity between the anchor and a candidate, capped at 1.0.
///
/// Topic overlap carries half the weight; sentiment agreement, creation
/// recency, and title/summary word overlap fill in the rest.
fn similarity_score(anchor: &Conversation, candidate: &ConversationSnapshot) -> f64 {
    let mut score = 0.0;

    if !anchor.topics.is_empty() && !candidate.topics.is_empty() {
        score += set_jaccard(&anchor.topics, &candidate.topics) * 0.5;
    }

    if let (Some(a), Some(b)) = (anchor.sentiment, candidate.sentiment) {
        if a == b {
            score += 0.2;
        } else if same_polarity(a, b) {
            score += 0.1;
        }
    }

    let days_apart = (anchor.created_at - candidate.created_at).num_days().abs();
    if days_apart < 7 {
        score += 0.15;
    } else if days_apart < 30 {
        score += 0.10;
    } else if days_apart < 90 {
        score += 0.05;
    }

    score += word_jaccard(
        &title_and_summary(&anchor.title, anchor.summary.as_deref()),
        &title_and_summary(&candidate.title, candidate.summary.as_deref()),
    ) * 0.15;

    score.min(1.0)
}

/// Human-readable explanation of why a candidate matched.
fn similarity_reason(anchor: &Conversation, candidate: &ConversationSnapshot) -> String {
    let mut reasons: Vec<String> = Vec::new();

    let candidate_topics: HashSet<&str> = candidate.topics.iter().map(String::as_str).collect();
    let shared: Vec<&str> = anchor
        .topics
        .iter()
        .map(String::as_str)
        .filter(|topic| candidate_topics.contains(topic))
        .take(REASON_TOPIC_LIMIT)
        .collect();
    if !shared.is_empty() {
        reasons.push(format!("Shared topics: {}", shared.join(", ")));
    }

    if let (Some(a), Some(b)) = (anchor.sentiment, candidate.sentiment) {
        if a == b {
            reasons.push(format!("Similar sentiment ({})", a.as_str().replace('_', " ")));
        }
    }

    let days_apart = (anchor.created_at - candidate.created_at).num_days().abs();
    if days_apart < 7 {
        reasons.push("From the same week".to_string());
    } else if days_apart < 30 {
        reasons.push("From the same month".to_string());
    }

    if reasons.is_empty() {
        "Similar content".to_string()
    } else {
        reasons.join(" • ")
    }
}

fn same_polarity(a: Sentiment, b: Sentiment) -> bool {
    let positive = |s: Sentiment| matches!(s, Sentiment::Positive | Sentiment::VeryPositive);
    let negative = |s: Sentiment| matches!(s, Sentiment::Negative | Sentiment::VeryNegative);
    (positive(a) && positive(b)) || (negative(a) && negative(b))
}

fn set_jaccard(a: &[String], b: &[String]) -> f64 {
    let a_set: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b_set: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = a_set.union(&b_set).count();
    if union == 0 {
        return 0.0;
    }
    a_set.intersection(&b_set).count() as f64 / union as f64
}

/// Word-set Jaccard overlap between two texts, case-insensitive.
pub(crate) fn word_jaccard(a: &str, b: &str) -> f64 {
    let a_words: HashSet<String> = a
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();
    let b_words: HashSet<String> = b
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    intersection as f64 / union as f64
}

fn title_and_summary(title: &str, summary: Option<&str>) -> String {
    format!("{} {}", title, summary.unwrap_or(""))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
