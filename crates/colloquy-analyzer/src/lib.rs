//! Post-conversation analysis for colloquy.
//!
//! [`ConversationAnalyzer`] drives the end-of-conversation pipeline: the
//! active-to-ended transition with a single winner, then four independent
//! artifacts (summary, topics, sentiment, embedding) computed through the
//! completion gateway and the embedding service, persisted through the
//! store. Artifact failures degrade or stay null instead of failing the
//! run, and a re-run fills in exactly the null fields.

pub mod analyzer;
pub mod extract;
pub mod lexical;
pub mod summarizer;

pub use analyzer::{AnalysisReport, ArtifactOutcome, ConversationAnalyzer, EndedConversation};
pub use extract::{compute_stats, InsightExtractor};
pub use summarizer::Summarizer;
