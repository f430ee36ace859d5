//! Scripted sample conversations for the demo corpus.
//!
//! Each script runs through the real pipeline: create, append messages, end,
//! analyze. Nothing is pre-baked, so the analysis fields come from the same
//! code paths live traffic would take.

use colloquy_analyzer::{ConversationAnalyzer, EndedConversation};
use colloquy_core::error::Result;
use colloquy_core::types::Sender;
use colloquy_gateway::TextCompletionGateway;
use colloquy_store::ConversationStore;
use colloquy_vector::EmbeddingService;

struct Script {
    title: &'static str,
    messages: &'static [(Sender, &'static str)],
}

const SCRIPTS: &[Script] = &[
    Script {
        title: "Machine learning roadmap",
        messages: &[
            (
                Sender::User,
                "Let's plan the machine learning roadmap for next quarter.",
            ),
            (
                Sender::Ai,
                "We should compare training frameworks before committing to one.",
            ),
            (
                Sender::User,
                "We decided to evaluate PyTorch first because the team already knows Python.",
            ),
            (
                Sender::Ai,
                "Agreed. Benchmarking against the current models will take about two weeks.",
            ),
            (
                Sender::User,
                "Sam will prepare the evaluation dataset by Friday.",
            ),
        ],
    },
    Script {
        title: "Sourdough starter help",
        messages: &[
            (
                Sender::User,
                "My sourdough starter stopped rising and I cannot tell why.",
            ),
            (
                Sender::Ai,
                "Check the feeding schedule and the kitchen temperature first.",
            ),
            (
                Sender::User,
                "I feed it once a day and the kitchen stays around twenty degrees.",
            ),
            (
                Sender::Ai,
                "Switch to feeding twice daily with warmer water and it should recover within a week.",
            ),
        ],
    },
    Script {
        title: "Rust async study group",
        messages: &[
            (
                Sender::User,
                "Tonight we walked through async Rust and the tokio runtime.",
            ),
            (
                Sender::Ai,
                "The borrow checker catches most lifetime mistakes before they ship.",
            ),
            (
                Sender::User,
                "Spawning tasks with owned data avoided every lifetime fight we had.",
            ),
            (
                Sender::Ai,
                "Next session we should cover channels and graceful shutdown.",
            ),
        ],
    },
    Script {
        title: "Quarterly budget review",
        messages: &[
            (
                Sender::User,
                "The quarterly budget review went better than expected.",
            ),
            (
                Sender::Ai,
                "Revenue grew while infrastructure costs stayed flat.",
            ),
            (
                Sender::User,
                "We agreed to move the surplus into the hiring budget.",
            ),
            (
                Sender::Ai,
                "Alex will send the revised numbers to finance by Friday.",
            ),
        ],
    },
];

/// Feed every script through the full pipeline and return the analyzed
/// conversations in creation order.
pub async fn seed<S, E, G>(
    store: &S,
    analyzer: &ConversationAnalyzer<S, E, G>,
) -> Result<Vec<EndedConversation>>
where
    S: ConversationStore,
    E: EmbeddingService,
    G: TextCompletionGateway,
{
    let mut seeded = Vec::with_capacity(SCRIPTS.len());
    for script in SCRIPTS {
        let conversation = store.create_conversation(script.title).await?;
        for (sender, content) in script.messages {
            store.append_message(conversation.id, *sender, content).await?;
        }
        seeded.push(analyzer.end_conversation(conversation.id).await?);
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use colloquy_core::config::{AnalysisConfig, GatewayConfig};
    use colloquy_gateway::ProviderChainGateway;
    use colloquy_store::MemoryStore;
    use colloquy_vector::LexicalEmbeddingService;

    #[tokio::test]
    async fn test_seed_analyzes_every_script() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(LexicalEmbeddingService::new(64));
        let gateway = Arc::new(ProviderChainGateway::with_providers(
            Vec::new(),
            &GatewayConfig::default(),
        ));
        let analyzer = ConversationAnalyzer::new(
            Arc::clone(&store),
            embedder,
            gateway,
            AnalysisConfig::default(),
        );

        let seeded = seed(store.as_ref(), &analyzer).await.unwrap();
        assert_eq!(seeded.len(), SCRIPTS.len());
        for ended in &seeded {
            assert!(ended.conversation.is_ended());
            assert!(ended.conversation.summary.is_some());
            assert!(!ended.conversation.topics.is_empty());
            assert!(ended.conversation.sentiment.is_some());
            assert!(ended.conversation.embedding.is_some());
        }
    }
}
