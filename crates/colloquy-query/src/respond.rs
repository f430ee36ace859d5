//! Answer prompt and templated fallback.
//!
//! When the completion gateway is unavailable or returns nothing usable,
//! the fallback summarizes the ranked matches directly so a query always
//! gets an answer.

use crate::context::format_relevance;
use crate::engine::RankedConversation;

/// Completion prompt asking for an answer grounded in the retrieved context.
pub fn answer_prompt(query: &str, context: &str) -> String {
    format!(
        "Based on these past conversations:\n\n{}\n\nAnswer this question: {}\n\n\
         Provide a comprehensive answer with specific examples from the conversations.",
        context, query
    )
}

/// Build an answer from the ranked matches alone, without the gateway.
pub fn fallback_answer(ranked: &[RankedConversation]) -> String {
    let Some(top) = ranked.first() else {
        return "No conversations were available to answer from.".to_string();
    };

    let mut answer = format!(
        "Based on {} relevant conversation(s), here's what I found:\n\n",
        ranked.len()
    );
    answer.push_str(&format!(
        "**Most Relevant:** '{}' (Match: {})\n",
        top.title,
        format_relevance(top.relevance_score.0)
    ));
    answer.push_str(&format!(
        "**Date:** {}\n",
        top.created_at.format("%B %d, %Y at %H:%M")
    ));

    if let Some(summary) = &top.summary {
        answer.push_str(&format!("\n**Summary:** {}\n", summary));
    }
    if !top.topics.is_empty() {
        answer.push_str(&format!("\n**Key Topics:** {}\n", top.topics.join(", ")));
    }
    if let Some(sentiment) = top.sentiment {
        answer.push_str(&format!(
            "**Tone:** {}\n",
            capitalize_first(&sentiment.as_str().replace('_', " "))
        ));
    }

    if ranked.len() > 1 {
        answer.push_str(&format!(
            "\n**Additional Context:** Found {} other related conversation(s) ",
            ranked.len() - 1
        ));
        let covered = covered_topics(&ranked[1..], 5);
        if !covered.is_empty() {
            answer.push_str(&format!("covering: {}", covered.join(", ")));
        }
    }

    answer
}

/// Distinct topics across the next few matches, first seen first.
fn covered_topics(rest: &[RankedConversation], max: usize) -> Vec<String> {
    let mut covered: Vec<String> = Vec::new();
    for conversation in rest.iter().take(3) {
        for topic in &conversation.topics {
            if !covered.contains(topic) {
                covered.push(topic.clone());
                if covered.len() == max {
                    return covered;
                }
            }
        }
    }
    covered
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use colloquy_core::types::{RelevanceScore, Sentiment};
    use uuid::Uuid;

    fn ranked(title: &str, score: f64) -> RankedConversation {
        RankedConversation {
            id: Uuid::new_v4(),
            title: title.to_string(),
            relevance_score: RelevanceScore::new(score),
            summary: None,
            topics: Vec::new(),
            sentiment: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
            message_count: 4,
        }
    }

    // ---- Prompt ----

    #[test]
    fn test_answer_prompt_shape() {
        let prompt = answer_prompt("what did we decide?", "CONTEXT GOES HERE");
        assert!(prompt.starts_with("Based on these past conversations:\n\nCONTEXT GOES HERE"));
        assert!(prompt.contains("Answer this question: what did we decide?"));
        assert!(prompt.ends_with(
            "Provide a comprehensive answer with specific examples from the conversations."
        ));
    }

    // ---- Fallback ----

    #[test]
    fn test_fallback_single_match() {
        let mut top = ranked("Budget review", 0.92);
        top.summary = Some("Approved the Q2 budget.".to_string());
        top.topics = vec!["budget".to_string(), "planning".to_string()];
        top.sentiment = Some(Sentiment::Positive);

        let answer = fallback_answer(&[top]);
        assert!(answer.starts_with("Based on 1 relevant conversation(s), here's what I found:"));
        assert!(answer.contains("**Most Relevant:** 'Budget review' (Match: 92.0%)"));
        assert!(answer.contains("**Date:** March 05, 2024 at 14:30"));
        assert!(answer.contains("**Summary:** Approved the Q2 budget."));
        assert!(answer.contains("**Key Topics:** budget, planning"));
        assert!(answer.contains("**Tone:** Positive"));
        assert!(!answer.contains("**Additional Context:**"));
    }

    #[test]
    fn test_fallback_mentions_other_matches_and_their_topics() {
        let top = ranked("Budget review", 0.9);
        let mut second = ranked("Hiring sync", 0.6);
        second.topics = vec!["hiring".to_string(), "budget".to_string()];
        let mut third = ranked("Offsite plan", 0.5);
        third.topics = vec!["travel".to_string(), "hiring".to_string()];

        let answer = fallback_answer(&[top, second, third]);
        assert!(answer.contains("**Additional Context:** Found 2 other related conversation(s) "));
        // Deduped, first seen first.
        assert!(answer.contains("covering: hiring, budget, travel"));
    }

    #[test]
    fn test_fallback_caps_covered_topics_at_five() {
        let top = ranked("Top", 0.9);
        let mut second = ranked("Second", 0.6);
        second.topics = (0..8).map(|i| format!("topic{}", i)).collect();

        let answer = fallback_answer(&[top, second]);
        assert!(answer.contains("covering: topic0, topic1, topic2, topic3, topic4"));
        assert!(!answer.contains("topic5"));
    }

    #[test]
    fn test_fallback_multiword_tone_capitalized() {
        let mut top = ranked("Kickoff", 0.8);
        top.sentiment = Some(Sentiment::VeryPositive);

        let answer = fallback_answer(&[top]);
        assert!(answer.contains("**Tone:** Very positive"));
    }

    #[test]
    fn test_fallback_omits_absent_fields() {
        let answer = fallback_answer(&[ranked("Bare", 0.5)]);
        assert!(!answer.contains("**Summary:**"));
        assert!(!answer.contains("**Key Topics:**"));
        assert!(!answer.contains("**Tone:**"));
    }

    #[test]
    fn test_fallback_handles_no_matches() {
        assert_eq!(
            fallback_answer(&[]),
            "No conversations were available to answer from."
        );
    }
}
