//! Conversation persistence for colloquy.
//!
//! Defines the [`ConversationStore`] boundary that the analyzer and query
//! engine consume, and ships a mutex-guarded [`MemoryStore`] so the whole
//! pipeline runs, and is testable, with no database attached.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{ConversationStore, DynConversationStore};
