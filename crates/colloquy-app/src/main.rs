//! Colloquy demo binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Wire the in-memory store, the resilient embedding service, and the
//!    provider chain gateway into the analyzer and the query engine
//! 3. Seed a scripted corpus through the full end-of-conversation pipeline
//! 4. Run the requested command against it
//!
//! With no providers configured in the gateway chain and no ONNX model on
//! disk, every command runs fully offline.

mod cli;
mod corpus;

use std::sync::Arc;

use clap::Parser;

use colloquy_analyzer::{ConversationAnalyzer, EndedConversation};
use colloquy_core::config::ColloquyConfig;
use colloquy_core::types::ConversationFilters;
use colloquy_gateway::ProviderChainGateway;
use colloquy_query::{QueryEngine, QueryResponse};
use colloquy_store::MemoryStore;
use colloquy_vector::{OnnxEmbeddingService, ResilientEmbeddingService};

use cli::{Cli, Command};

type DemoEngine =
    QueryEngine<MemoryStore, ResilientEmbeddingService<OnnxEmbeddingService>, ProviderChainGateway>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let config_path = args.resolve_config_path();
    let config = ColloquyConfig::load_or_default(&config_path);

    // Tracing. RUST_LOG wins over the flag and the config value.
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting colloquy v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    // The ONNX backend needs model files on disk. Without them the lexical
    // backend is the chosen backend, not a degradation.
    let primary = match OnnxEmbeddingService::from_config(&config.embedding) {
        Ok(service) => {
            tracing::info!(model = %config.embedding.model, "ONNX embedding backend loaded");
            Some(service)
        }
        Err(e) => {
            tracing::info!(error = %e, "ONNX embedding backend unavailable, embedding lexically");
            None
        }
    };

    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(ResilientEmbeddingService::new(primary, &config.embedding));
    let gateway = Arc::new(ProviderChainGateway::from_config(&config.gateway));

    let analyzer = ConversationAnalyzer::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        Arc::clone(&gateway),
        config.analysis.clone(),
    );
    let engine = QueryEngine::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        Arc::clone(&gateway),
        config.query.clone(),
    );

    // The store is in-memory, so every invocation starts from the same
    // scripted corpus.
    let seeded = corpus::seed(store.as_ref(), &analyzer).await?;
    tracing::info!(conversations = seeded.len(), "Demo corpus seeded and analyzed");

    match args.command {
        Command::Demo => run_demo(&engine, &seeded).await?,
        Command::Query { text, topics, days } => {
            let response = engine.query(&text, &build_filters(topics, days)).await?;
            print_query_response(&response);
        }
        Command::Related { title } => run_related(&engine, &seeded, &title).await?,
        Command::Trending { days } => run_trending(&engine, days).await?,
    }

    Ok(())
}

/// Walk through the whole surface: per-conversation analysis, a query, the
/// related suggestions for the first conversation, and trending topics.
async fn run_demo(
    engine: &DemoEngine,
    seeded: &[EndedConversation],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Analyzed corpus ===");
    for ended in seeded {
        let conversation = &ended.conversation;
        println!();
        println!("{}", conversation.title);
        if let Some(summary) = &conversation.summary {
            println!("  summary:   {}", summary);
        }
        if !conversation.topics.is_empty() {
            println!("  topics:    {}", conversation.topics.join(", "));
        }
        if let Some(sentiment) = conversation.sentiment {
            println!("  sentiment: {}", sentiment.as_str());
        }
        let stats = &ended.report.stats;
        println!(
            "  stats:     {} message(s), {} words, {:.1} words/message",
            stats.message_count, stats.total_words, stats.avg_words_per_message
        );
        for decision in &ended.report.decisions {
            println!("  decision:  {}", decision);
        }
        for item in &ended.report.action_items {
            println!("  action:    {}", item);
        }
    }

    println!();
    println!("=== Query ===");
    let response = engine
        .query(
            "What did we decide about the machine learning roadmap?",
            &ConversationFilters::default(),
        )
        .await?;
    print_query_response(&response);

    if let Some(anchor) = seeded.first() {
        println!();
        println!("=== Related to '{}' ===", anchor.conversation.title);
        print_related(engine, anchor).await?;
    }

    println!();
    println!("=== Trending topics (30 days) ===");
    run_trending(engine, 30).await?;

    Ok(())
}

async fn run_related(
    engine: &DemoEngine,
    seeded: &[EndedConversation],
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(anchor) = seeded
        .iter()
        .find(|ended| ended.conversation.title.eq_ignore_ascii_case(title))
    else {
        println!("No sample conversation titled '{}'. Available:", title);
        for ended in seeded {
            println!("  {}", ended.conversation.title);
        }
        return Ok(());
    };
    print_related(engine, anchor).await
}

async fn print_related(
    engine: &DemoEngine,
    anchor: &EndedConversation,
) -> Result<(), Box<dyn std::error::Error>> {
    let related = engine.related(anchor.conversation.id, 5).await?;
    if related.is_empty() {
        println!("  no sufficiently similar conversations");
        return Ok(());
    }
    for suggestion in &related {
        println!(
            "  {:>5.1}%  {}  ({})",
            suggestion.similarity_score * 100.0,
            suggestion.title,
            suggestion.reason
        );
    }
    Ok(())
}

async fn run_trending(engine: &DemoEngine, days: i64) -> Result<(), Box<dyn std::error::Error>> {
    let trending = engine.trending(days).await?;
    if trending.is_empty() {
        println!("  no ended conversations in the window");
        return Ok(());
    }
    for entry in &trending {
        println!(
            "  {:>2}x  {:<24} {:.1}% of recent conversations",
            entry.conversation_count, entry.topic, entry.percentage
        );
    }
    Ok(())
}

fn build_filters(topics: Vec<String>, days: Option<i64>) -> ConversationFilters {
    ConversationFilters {
        date_from: days.map(|d| chrono::Utc::now() - chrono::Duration::days(d)),
        date_to: None,
        topics: if topics.is_empty() { None } else { Some(topics) },
    }
}

fn print_query_response(response: &QueryResponse) {
    println!("Q: {}", response.query);
    println!();
    println!("{}", response.response);
    println!();
    println!(
        "Searched {} conversation(s), {} relevant{}",
        response.total_searched,
        response.relevant_conversations.len(),
        if response.degraded { " (degraded)" } else { "" }
    );
    for ranked in &response.relevant_conversations {
        println!(
            "  {:>5.1}%  {}  [{}]",
            ranked.relevance_score.0 * 100.0,
            ranked.title,
            ranked.topics.join(", ")
        );
    }
}
