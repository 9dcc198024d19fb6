// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the messaging SDK.
//
// The bridge only ever calls the SDK through these traits.  Network calls are
// async; their `Ok(None)` outcome models an SDK callback that delivered
// neither a result nor an error, which the bridge reports as an assertion
// failure rather than ignoring.

use std::sync::Arc;

use async_trait::async_trait;

use imbridge_core::error::SdkException;
use imbridge_core::types::{Conversation, ConversationQuery, Message, MessageCursor};

/// Outcome of an SDK call.
pub type SdkResult<T> = std::result::Result<T, SdkException>;

/// Entry point of a messaging SDK.
pub trait ImSdk: Send + Sync {
    /// Human-readable SDK name (e.g. "in-memory").
    fn name(&self) -> &str;

    /// Get or create the SDK client for `client_id`.
    fn client(&self, client_id: &str) -> Arc<dyn ImClient>;

    /// Replace the process-wide incoming-message handler. `None` removes it.
    fn set_message_handler(&self, handler: Option<Arc<dyn MessageHandler>>);
}

/// One messaging identity and its connection.
#[async_trait]
pub trait ImClient: Send + Sync {
    fn client_id(&self) -> &str;

    /// Replace the connection-state delegate for this client.
    fn set_client_event_handler(&self, handler: Arc<dyn ClientEventHandler>);

    /// Replace the conversation-event delegate for this client.
    fn set_conversation_event_handler(&self, handler: Arc<dyn ConversationEventHandler>);

    /// Look up a conversation in the client's local cache.
    fn cached_conversation(&self, conversation_id: &str) -> Option<Arc<dyn ImConversation>>;

    /// Fetch a single conversation from the server. An unknown id is an
    /// error, like any other server-side failure.
    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> SdkResult<Option<Arc<dyn ImConversation>>>;

    /// Run a conversation query. Results keep server order.
    async fn query_conversations(
        &self,
        query: ConversationQuery,
    ) -> SdkResult<Option<Vec<Arc<dyn ImConversation>>>>;
}

/// A conversation handle borrowed from the SDK.
#[async_trait]
pub trait ImConversation: Send + Sync {
    fn conversation_id(&self) -> &str;

    /// Current state of the conversation.
    fn snapshot(&self) -> Conversation;

    /// Send `message`. On success the SDK fills in id, sender, timestamps and
    /// status; on failure it still updates the status.
    async fn send_message(&self, message: &mut Message) -> SdkResult<()>;

    /// Query history: with a cursor, up to `limit` messages strictly before
    /// it; without, the most recent `limit`.
    async fn query_messages(
        &self,
        cursor: Option<MessageCursor>,
        limit: u32,
    ) -> SdkResult<Option<Vec<Message>>>;

    /// Mark the conversation read. Completes in the background.
    fn read(&self);
}

/// Connection-state delegate.
pub trait ClientEventHandler: Send + Sync {
    fn on_connection_resumed(&self, client_id: &str);

    fn on_connection_paused(&self, client_id: &str);

    fn on_client_offline(&self, _client_id: &str, _reason: i32) {}
}

/// Conversation-membership and unread-count delegate.
pub trait ConversationEventHandler: Send + Sync {
    fn on_kicked(&self, client_id: &str, conversation: &Conversation, kicked_by: &str);

    fn on_unread_messages_count_updated(&self, client_id: &str, conversation: &Conversation);

    fn on_invited(&self, _client_id: &str, _conversation: &Conversation, _invited_by: &str) {}

    fn on_member_joined(
        &self,
        _client_id: &str,
        _conversation: &Conversation,
        _members: &[String],
        _invited_by: &str,
    ) {
    }

    fn on_member_left(
        &self,
        _client_id: &str,
        _conversation: &Conversation,
        _members: &[String],
        _kicked_by: &str,
    ) {
    }
}

/// Process-wide incoming-message delegate.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, client_id: &str, message: &Message, conversation: &Conversation);
}
