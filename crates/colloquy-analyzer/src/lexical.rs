//! Lexical fallbacks for topic extraction and sentiment classification,
//! plus parsing of gateway topic listings.
//!
//! Everything here is deterministic and I/O free, so analysis keeps
//! producing topics and sentiment labels with no model behind it.

use std::collections::{HashMap, HashSet};

use colloquy_core::types::{normalize_topics, Sentiment};

/// Words too common to be discussion topics.
const STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to", "for",
    "of", "as", "by", "that", "this", "it", "from", "are", "was", "were", "been", "be", "have",
    "has", "had", "do", "does", "did", "will", "would", "could", "should", "can", "may", "might",
    "must", "i", "you", "he", "she", "we", "they", "what", "how", "when", "where", "why", "who",
    "your", "their", "there", "here", "then", "than", "these", "those",
];

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "love", "like", "enjoy",
    "happy", "glad", "thank", "thanks", "appreciate", "perfect", "awesome", "brilliant",
    "excited", "helpful", "useful", "nice", "better", "best", "pleased",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "dislike", "angry", "sad", "disappointed", "frustrated",
    "annoyed", "problem", "issue", "wrong", "error", "fail", "failed", "difficult", "hard",
    "worse", "worst", "unhappy", "upset", "confused",
];

/// Minimum term length considered for a topic.
const MIN_TOPIC_TERM_LEN: usize = 4;
/// A term must occur at least this often to count as a topic.
const MIN_TOPIC_OCCURRENCES: usize = 2;

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Extract up to `max` topics from raw text by term frequency.
///
/// Terms are lowercased alphabetic runs of at least four characters,
/// stopwords removed, kept only when they occur at least twice, ranked most
/// frequent first. Ties keep first-appearance order, so output is
/// deterministic for a given text.
pub fn extract_topics(text: &str, max: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for word in lowered.split(|c: char| !c.is_ascii_alphabetic()) {
        if word.len() < MIN_TOPIC_TERM_LEN || is_stopword(word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order.into_iter().map(|w| (w, counts[w])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .filter(|(_, count)| *count >= MIN_TOPIC_OCCURRENCES)
        .take(max)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Classify the overall tone of a transcript from positive/negative word
/// presence.
///
/// Counts *distinct* lexicon words appearing anywhere in the text and maps
/// the positive ratio through fixed bands. Text touching neither lexicon is
/// neutral, so every transcript gets a label.
pub fn classify_sentiment(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let words: HashSet<&str> = lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = POSITIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
    let total = positive + negative;
    if total == 0 {
        return Sentiment::Neutral;
    }

    let positive_ratio = positive as f64 / total as f64;
    if positive_ratio > 0.70 {
        Sentiment::VeryPositive
    } else if positive_ratio > 0.55 {
        Sentiment::Positive
    } else if positive_ratio > 0.45 {
        Sentiment::Neutral
    } else if positive_ratio > 0.30 {
        Sentiment::Negative
    } else {
        Sentiment::VeryNegative
    }
}

/// Parse a completion that lists topics into normalized topic strings.
///
/// Accepts comma- or line-separated listings, with or without "1." / "-"
/// list markers and a leading "Topics:" label. Items are normalized and
/// deduplicated, capped at `max`.
pub fn parse_topic_list(text: &str, max: usize) -> Vec<String> {
    let raw = text
        .split([',', '\n', ';'])
        .map(strip_list_marker)
        .map(|item| item.trim_end_matches('.').to_string());
    normalize_topics(raw, max)
}

fn strip_list_marker(item: &str) -> &str {
    let mut trimmed = item.trim();
    if let Some(colon) = trimmed.to_lowercase().find("topics:") {
        trimmed = trimmed[colon + "topics:".len()..].trim_start();
    }

    // "1. rust" / "2) rust"
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
        return trimmed;
    }

    trimmed.trim_start_matches(['-', '*', '•']).trim_start()
}
