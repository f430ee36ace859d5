//! In-memory implementation of the storage boundary.
//!
//! Holds the whole corpus behind one mutex. Every read clones out, so
//! callers always work on an immutable snapshot; the lock is never held
//! across an await point.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use colloquy_core::error::ColloquyError;
use colloquy_core::types::{
    AnalysisUpdate, Conversation, ConversationFilters, ConversationSnapshot, ConversationStatus,
    Message, QueryRecord, Sender,
};

use crate::store::ConversationStore;

const DEFAULT_TITLE: &str = "New Conversation";

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<Message>>,
    queries: Vec<QueryRecord>,
}

/// Mutex-guarded in-memory conversation store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, StoreInner>, ColloquyError> {
        self.inner
            .lock()
            .map_err(|_| ColloquyError::Storage("conversation store mutex poisoned".to_string()))
    }

    /// Insert a pre-built conversation, keeping its id and timestamps.
    /// Used for seeding and for tests that need controlled `created_at`.
    pub fn insert_conversation(&self, conversation: Conversation) -> Result<(), ColloquyError> {
        let mut inner = self.locked()?;
        inner.messages.entry(conversation.id).or_default();
        inner.conversations.insert(conversation.id, conversation);
        Ok(())
    }

    /// All query audit records, oldest first.
    pub fn query_records(&self) -> Result<Vec<QueryRecord>, ColloquyError> {
        Ok(self.locked()?.queries.clone())
    }

    pub fn conversation_count(&self) -> Result<usize, ColloquyError> {
        Ok(self.locked()?.conversations.len())
    }
}

impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, ColloquyError> {
        let trimmed = title.trim();
        let conversation = Conversation::new(if trimmed.is_empty() {
            DEFAULT_TITLE
        } else {
            trimmed
        });

        let mut inner = self.locked()?;
        inner.messages.insert(conversation.id, Vec::new());
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        debug!(conversation_id = %conversation.id, title = %conversation.title, "Created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation, ColloquyError> {
        self.locked()?
            .conversations
            .get(&id)
            .cloned()
            .ok_or(ColloquyError::NotFound(id))
    }

    async fn list_conversations(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSnapshot>, ColloquyError> {
        let inner = self.locked()?;
        let mut snapshots: Vec<ConversationSnapshot> = inner
            .conversations
            .values()
            .map(|c| {
                let count = inner.messages.get(&c.id).map_or(0, Vec::len);
                ConversationSnapshot::from_conversation(c, count)
            })
            .filter(|s| filters.matches(s))
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ColloquyError> {
        let inner = self.locked()?;
        if !inner.conversations.contains_key(&conversation_id) {
            return Err(ColloquyError::NotFound(conversation_id));
        }
        let mut messages = inner
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender: Sender,
        content: &str,
    ) -> Result<Message, ColloquyError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ColloquyError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let mut inner = self.locked()?;
        let conversation = inner
            .conversations
            .get(&conversation_id)
            .ok_or(ColloquyError::NotFound(conversation_id))?;
        if conversation.is_ended() {
            return Err(ColloquyError::InvalidInput(format!(
                "cannot send messages to ended conversation {}",
                conversation_id
            )));
        }

        let message = Message::new(conversation_id, sender, content);
        inner
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn transition_to_ended(&self, conversation_id: Uuid) -> Result<bool, ColloquyError> {
        let mut inner = self.locked()?;
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(ColloquyError::NotFound(conversation_id))?;

        if conversation.is_ended() {
            return Ok(false);
        }
        conversation.status = ConversationStatus::Ended;
        conversation.ended_at = Some(Utc::now());
        info!(conversation_id = %conversation_id, "Conversation ended");
        Ok(true)
    }

    async fn persist_analysis(
        &self,
        conversation_id: Uuid,
        update: &AnalysisUpdate,
    ) -> Result<(), ColloquyError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut inner = self.locked()?;
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(ColloquyError::NotFound(conversation_id))?;
        if !conversation.is_ended() {
            return Err(ColloquyError::InvalidInput(format!(
                "analysis fields can only be written to an ended conversation, {} is active",
                conversation_id
            )));
        }

        let mut written: Vec<&str> = Vec::new();
        if let Some(summary) = &update.summary {
            conversation.summary = Some(summary.clone());
            written.push("summary");
        }
        if let Some(topics) = &update.topics {
            conversation.topics = topics.clone();
            written.push("topics");
        }
        if let Some(sentiment) = update.sentiment {
            conversation.sentiment = Some(sentiment);
            written.push("sentiment");
        }
        if let Some(embedding) = &update.embedding {
            conversation.embedding = Some(embedding.clone());
            written.push("embedding");
        }
        debug!(conversation_id = %conversation_id, fields = written.join(","), "Persisted analysis fields");
        Ok(())
    }

    async fn record_query(&self, record: &QueryRecord) -> Result<(), ColloquyError> {
        let mut inner = self.locked()?;
        inner.queries.push(record.clone());
        debug!(query_id = %record.id, results = record.results.len(), "Recorded query");
        Ok(())
    }
}
