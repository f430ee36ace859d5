//! Grounding context assembly for answer synthesis.
//!
//! Ranked conversations are rendered into labelled blocks and packed into a
//! character budget, best matches first. When even the first block does not
//! fit, it is truncated rather than dropped so the prompt always carries at
//! least some grounding.

use chrono::{DateTime, Utc};

use colloquy_core::types::Sentiment;

const DIVIDER: &str = "============================================================";

/// One ranked conversation's contribution to the prompt context.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub title: String,
    /// Relevance in [0.0, 1.0].
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub summary: Option<String>,
    /// Leading transcript text, used when no summary is available.
    pub excerpt: Option<String>,
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
}

/// Packs context blocks into a character budget.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    budget_chars: usize,
}

impl ContextBuilder {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    /// Render entries in rank order until the budget is spent.
    pub fn build(&self, entries: &[ContextEntry]) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut used = 0usize;

        for (position, entry) in entries.iter().enumerate() {
            let block = render_block(position, entry);
            let separator = if blocks.is_empty() { 0 } else { 2 };
            let cost = block.chars().count() + separator;

            if used + cost > self.budget_chars {
                if blocks.is_empty() {
                    blocks.push(truncate_chars(&block, self.budget_chars));
                }
                break;
            }
            used += cost;
            blocks.push(block);
        }

        blocks.join("\n\n")
    }
}

fn render_block(position: usize, entry: &ContextEntry) -> String {
    let mut lines: Vec<String> = vec![
        DIVIDER.to_string(),
        format!("Conversation {}: {}", position + 1, entry.title),
        format!("Relevance: {}", format_relevance(entry.score)),
        format!("Date: {}", entry.created_at.format("%Y-%m-%d %H:%M")),
    ];

    if let Some(summary) = &entry.summary {
        lines.push(format!("Summary: {}", summary));
    } else if let Some(excerpt) = &entry.excerpt {
        lines.push(format!("Excerpt: {}", excerpt));
    }
    if !entry.topics.is_empty() {
        lines.push(format!("Topics: {}", entry.topics.join(", ")));
    }
    if let Some(sentiment) = entry.sentiment {
        lines.push(format!("Sentiment: {}", sentiment.as_str().replace('_', " ")));
    }

    lines.join("\n")
}

/// Render a score in [0, 1] as a percentage with one decimal place.
pub(crate) fn format_relevance(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Truncate to a maximum number of characters, respecting char boundaries.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
