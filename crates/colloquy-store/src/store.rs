//! The storage boundary consumed by the analyzer and the query engine.

use colloquy_core::error::ColloquyError;
use colloquy_core::types::{
    AnalysisUpdate, Conversation, ConversationFilters, ConversationSnapshot, Message, QueryRecord,
    Sender,
};
use uuid::Uuid;

/// Conversation persistence contract.
///
/// Read methods hand out owned snapshots, so nothing a caller holds can be
/// mutated underneath it while scoring or rendering. Writes are small and
/// per-conversation; `transition_to_ended` is the only operation with a
/// single-winner guarantee.
pub trait ConversationStore: Send + Sync {
    /// Create a new active conversation. Blank titles get a default.
    fn create_conversation(
        &self,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Conversation, ColloquyError>> + Send;

    /// Fetch a conversation by id.
    fn get_conversation(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Conversation, ColloquyError>> + Send;

    /// List conversations passing every supplied filter, newest first.
    fn list_conversations(
        &self,
        filters: &ConversationFilters,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSnapshot>, ColloquyError>> + Send;

    /// Full message history of a conversation, in timestamp order.
    fn get_messages(
        &self,
        conversation_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, ColloquyError>> + Send;

    /// Append a message to an active conversation.
    fn append_message(
        &self,
        conversation_id: Uuid,
        sender: Sender,
        content: &str,
    ) -> impl std::future::Future<Output = Result<Message, ColloquyError>> + Send;

    /// Atomically flip a conversation from active to ended. Returns `true`
    /// iff this call performed the transition; an already-ended conversation
    /// yields `Ok(false)`, never a second transition.
    fn transition_to_ended(
        &self,
        conversation_id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, ColloquyError>> + Send;

    /// Partial-field upsert of analysis artifacts on an ended conversation.
    /// `None` fields in the update are left untouched.
    fn persist_analysis(
        &self,
        conversation_id: Uuid,
        update: &AnalysisUpdate,
    ) -> impl std::future::Future<Output = Result<(), ColloquyError>> + Send;

    /// Append a write-once query audit record.
    fn record_query(
        &self,
        record: &QueryRecord,
    ) -> impl std::future::Future<Output = Result<(), ColloquyError>> + Send;
}

/// Object-safe version of [`ConversationStore`] for dynamic dispatch.
///
/// A blanket implementation is provided so that every `ConversationStore`
/// automatically implements `DynConversationStore`.
pub trait DynConversationStore: Send + Sync {
    fn create_conversation_boxed<'a>(
        &'a self,
        title: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Conversation, ColloquyError>> + Send + 'a>,
    >;

    fn get_conversation_boxed(
        &self,
        id: Uuid,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Conversation, ColloquyError>> + Send + '_>,
    >;

    fn list_conversations_boxed<'a>(
        &'a self,
        filters: &'a ConversationFilters,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<ConversationSnapshot>, ColloquyError>>
                + Send
                + 'a,
        >,
    >;

    fn get_messages_boxed(
        &self,
        conversation_id: Uuid,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Message>, ColloquyError>> + Send + '_>,
    >;

    fn append_message_boxed<'a>(
        &'a self,
        conversation_id: Uuid,
        sender: Sender,
        content: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Message, ColloquyError>> + Send + 'a>,
    >;

    fn transition_to_ended_boxed(
        &self,
        conversation_id: Uuid,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool, ColloquyError>> + Send + '_>>;

    fn persist_analysis_boxed<'a>(
        &'a self,
        conversation_id: Uuid,
        update: &'a AnalysisUpdate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ColloquyError>> + Send + 'a>>;

    fn record_query_boxed<'a>(
        &'a self,
        record: &'a QueryRecord,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ColloquyError>> + Send + 'a>>;
}

impl<T: ConversationStore> DynConversationStore for T {
    fn create_conversation_boxed<'a>(
        &'a self,
        title: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Conversation, ColloquyError>> + Send + 'a>,
    > {
        Box::pin(self.create_conversation(title))
    }

    fn get_conversation_boxed(
        &self,
        id: Uuid,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Conversation, ColloquyError>> + Send + '_>,
    > {
        Box::pin(self.get_conversation(id))
    }

    fn list_conversations_boxed<'a>(
        &'a self,
        filters: &'a ConversationFilters,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Vec<ConversationSnapshot>, ColloquyError>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(self.list_conversations(filters))
    }

    fn get_messages_boxed(
        &self,
        conversation_id: Uuid,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Message>, ColloquyError>> + Send + '_>,
    > {
        Box::pin(self.get_messages(conversation_id))
    }

    fn append_message_boxed<'a>(
        &'a self,
        conversation_id: Uuid,
        sender: Sender,
        content: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Message, ColloquyError>> + Send + 'a>,
    > {
        Box::pin(self.append_message(conversation_id, sender, content))
    }

    fn transition_to_ended_boxed(
        &self,
        conversation_id: Uuid,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool, ColloquyError>> + Send + '_>>
    {
        Box::pin(self.transition_to_ended(conversation_id))
    }

    fn persist_analysis_boxed<'a>(
        &'a self,
        conversation_id: Uuid,
        update: &'a AnalysisUpdate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ColloquyError>> + Send + 'a>>
    {
        Box::pin(self.persist_analysis(conversation_id, update))
    }

    fn record_query_boxed<'a>(
        &'a self,
        record: &'a QueryRecord,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ColloquyError>> + Send + 'a>>
    {
        Box::pin(self.record_query(record))
    }
}
