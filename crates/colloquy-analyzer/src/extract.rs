//! Rule-based extraction of decisions, action items, and key points.
//!
//! Pattern matching over raw message text. Runs entirely offline, so the
//! analysis report carries these fields even when no completion provider
//! is reachable.

use std::collections::HashSet;

use regex::Regex;

use colloquy_core::types::{Conversation, ConversationStats, Message, Sender};

const MAX_DECISIONS: usize = 5;
const MAX_ACTION_ITEMS: usize = 7;
const MAX_KEY_POINTS: usize = 5;
/// Matched sentences are clipped to this many characters in the report.
const SENTENCE_CAP_CHARS: usize = 150;
const KEY_POINT_CAP_CHARS: usize = 100;
/// Sentences at or under this length are noise ("We will.").
const MIN_SENTENCE_CHARS: usize = 15;

/// A user message opening with one of these verbs is a direct request and
/// counts as an action item.
const IMPERATIVE_VERBS: &[&str] = &[
    "create", "build", "implement", "design", "develop", "make", "add", "update", "change", "fix",
    "test",
];

/// Phrases marking a statement of user interest.
const INTEREST_PHRASES: &[&str] = &[
    "i need",
    "i want",
    "can you",
    "how to",
    "what is",
    "tell me about",
];

/// Compiled pattern tables for insight extraction. Build once, reuse across
/// conversations.
pub struct InsightExtractor {
    decision_patterns: Vec<Regex>,
    action_patterns: Vec<Regex>,
}

impl Default for InsightExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightExtractor {
    pub fn new() -> Self {
        // Commitment and agreement language.
        let decision_sources: &[&str] = &[
            r"(?i)\b(decided to|will|going to|agreed to|chose to|selected|picked)\b",
            r"(?i)\b(let's|we'll|we will|we should|we must)\b",
            r"(?i)\b(final decision|conclusion|determined that)\b",
            r"(?i)\b(approved|confirmed|settled on)\b",
        ];

        // Obligation and task language.
        let action_sources: &[&str] = &[
            r"(?i)\b(need to|have to|must|should|ought to)\b",
            r"(?i)\b(todo|to-do|task|action item)\b",
            r"(?i)\bwill (do|create|build|implement|design|develop)\b",
            r"(?i)\b(remember to|don't forget to)\b",
            r"(?i)\b(next step|next, we|then we)\b",
        ];

        Self {
            decision_patterns: decision_sources
                .iter()
                .map(|pat| Regex::new(pat).expect("Invalid decision regex"))
                .collect(),
            action_patterns: action_sources
                .iter()
                .map(|pat| Regex::new(pat).expect("Invalid action regex"))
                .collect(),
        }
    }

    /// Sentences where a commitment was made. Deduplicated
    /// case-insensitively, capped at five, in encounter order.
    pub fn decisions(&self, messages: &[Message]) -> Vec<String> {
        let mut found = Vec::new();
        for msg in messages {
            let sentences = split_sentences(&msg.content);
            for pattern in &self.decision_patterns {
                if let Some(sentence) = first_match(pattern, &sentences) {
                    found.push(truncate_chars(sentence, SENTENCE_CAP_CHARS));
                }
            }
        }
        dedup_case_insensitive(found, MAX_DECISIONS)
    }

    /// Tasks and obligations mentioned anywhere, plus user messages that
    /// open with an imperative verb. Capped at seven.
    pub fn action_items(&self, messages: &[Message]) -> Vec<String> {
        let mut found = Vec::new();
        for msg in messages {
            let sentences = split_sentences(&msg.content);
            for pattern in &self.action_patterns {
                if let Some(sentence) = first_match(pattern, &sentences) {
                    found.push(truncate_chars(sentence, SENTENCE_CAP_CHARS));
                }
            }
        }

        for msg in messages {
            if msg.sender != Sender::User {
                continue;
            }
            let first_word = msg
                .content
                .split_whitespace()
                .next()
                .map(|w| w.to_lowercase())
                .unwrap_or_default();
            if IMPERATIVE_VERBS.contains(&first_word.as_str()) {
                found.push(truncate_chars(&msg.content, SENTENCE_CAP_CHARS));
            }
        }

        dedup_case_insensitive(found, MAX_ACTION_ITEMS)
    }

    /// Highlights of what the user was after: their questions, and
    /// statements carrying an interest phrase. Capped at five.
    pub fn key_points(&self, messages: &[Message]) -> Vec<String> {
        let mut points = Vec::new();

        for msg in messages {
            if msg.sender != Sender::User || !msg.content.contains('?') {
                continue;
            }
            // Each '?'-terminated segment is one question. At most two per
            // message so one rapid-fire message cannot fill the list.
            let segments: Vec<&str> = msg.content.split('?').collect();
            let questions = segments[..segments.len() - 1]
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .take(2)
                .map(|s| format!("{s}?"));
            points.extend(questions);
        }

        for msg in messages {
            if msg.sender != Sender::User {
                continue;
            }
            let lowered = msg.content.to_lowercase();
            if INTEREST_PHRASES.iter().any(|p| lowered.contains(p)) {
                points.push(truncate_chars(&msg.content, KEY_POINT_CAP_CHARS));
            }
        }

        points.truncate(MAX_KEY_POINTS);
        points
    }
}

/// Message-count and word-count statistics for a conversation.
pub fn compute_stats(conversation: &Conversation, messages: &[Message]) -> ConversationStats {
    let user_messages = messages
        .iter()
        .filter(|m| m.sender == Sender::User)
        .count();
    let total_words: usize = messages
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();
    let avg_words_per_message = if messages.is_empty() {
        0.0
    } else {
        total_words as f64 / messages.len() as f64
    };

    ConversationStats {
        message_count: messages.len(),
        user_messages,
        ai_messages: messages.len() - user_messages,
        total_words,
        avg_words_per_message,
        duration_secs: conversation.duration_secs(),
    }
}

fn split_sentences(content: &str) -> Vec<&str> {
    content
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_match<'a>(pattern: &Regex, sentences: &[&'a str]) -> Option<&'a str> {
    sentences
        .iter()
        .find(|s| s.len() > MIN_SENTENCE_CHARS && pattern.is_match(s))
        .copied()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn dedup_case_insensitive(items: Vec<String>, max: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.to_lowercase()) {
            unique.push(item);
            if unique.len() >= max {
                break;
            }
        }
    }
    unique
}
