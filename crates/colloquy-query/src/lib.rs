//! Corpus querying for colloquy.
//!
//! [`QueryEngine`] answers natural-language questions over the analyzed
//! conversation corpus: candidates are scored against the query embedding,
//! ranked, and grounded into a completion prompt for answer synthesis.
//! Every backend failure has a documented fallback (lexical scoring,
//! templated answers), so the engine keeps answering offline. The same
//! snapshots also drive related-conversation suggestions and trending
//! topics.

pub mod context;
pub mod engine;
pub mod related;
pub mod respond;

pub use engine::{QueryEngine, QueryResponse, RankedConversation};
pub use related::{related_conversations, trending_topics, RelatedConversation, TrendingTopic};
