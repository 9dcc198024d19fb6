// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory messaging SDK for desktop/CI builds and tests.
//
// Holds conversations and their history in a shared backend, assigns message
// ids and send timestamps the way a server would, and lets callers inject
// one-shot failures and simulate server-pushed notifications.  Delegates are
// always invoked after the backend lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use imbridge_core::error::SdkException;
use imbridge_core::types::{
    CachePolicy, Conversation, ConversationQuery, Message, MessageCursor, MessageStatus,
};

use crate::traits::*;

/// Error code the server uses for an unknown conversation id.
pub const CONVERSATION_NOT_FOUND: i64 = 4401;

/// SDK operations that can be made to fail or to return nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkOp {
    FetchConversation,
    QueryConversations,
    SendMessage,
    QueryMessages,
}

/// How the next call of an operation should misbehave.
#[derive(Debug, Clone)]
enum Fault {
    Fail(SdkException),
    /// Complete with neither a result nor an error.
    Nothing,
}

#[derive(Debug, Default)]
struct ConversationRecord {
    members: Vec<String>,
    /// Chronological history.
    messages: Vec<Message>,
    /// Unread count per client id.
    unread: HashMap<String, u32>,
}

#[derive(Default)]
struct Backend {
    conversations: HashMap<String, ConversationRecord>,
    faults: HashMap<SdkOp, Fault>,
    last_timestamp: i64,
}

impl Backend {
    fn take_fault(&mut self, op: SdkOp) -> Option<Fault> {
        self.faults.remove(&op)
    }

    /// Server clock: wall time in milliseconds, strictly increasing.
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }

    /// Append a message to a conversation, assigning id, timestamp and sender.
    fn append(
        &mut self,
        conversation_id: &str,
        from: &str,
        message: &mut Message,
        status: MessageStatus,
    ) -> bool {
        let timestamp = self.next_timestamp();
        let Some(record) = self.conversations.get_mut(conversation_id) else {
            return false;
        };
        message.message_id = Some(uuid::Uuid::new_v4().simple().to_string());
        message.conversation_id = Some(conversation_id.to_string());
        message.from = Some(from.to_string());
        message.timestamp = timestamp;
        message.status = status;
        record.messages.push(message.clone());
        for member in record.members.iter().filter(|m| m.as_str() != from) {
            *record.unread.entry(member.clone()).or_default() += 1;
        }
        true
    }

    fn snapshot(&self, conversation_id: &str, client_id: &str, with_last: bool) -> Conversation {
        let record = self.conversations.get(conversation_id);
        let last = record.and_then(|r| r.messages.last());
        Conversation {
            conversation_id: conversation_id.to_string(),
            members: record.map(|r| r.members.clone()).unwrap_or_default(),
            last_message: if with_last { last.cloned() } else { None },
            last_message_at: last.and_then(|m| chrono::DateTime::from_timestamp_millis(m.timestamp)),
            unread_messages_count: record
                .and_then(|r| r.unread.get(client_id).copied())
                .unwrap_or(0),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory SDK. Cheap to clone; clones share the same backend.
#[derive(Clone, Default)]
pub struct MemorySdk {
    backend: Arc<Mutex<Backend>>,
    clients: Arc<Mutex<HashMap<String, Arc<MemoryClient>>>>,
    message_handler: Arc<Mutex<Option<Arc<dyn MessageHandler>>>>,
}

impl MemorySdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a conversation on the server.
    pub fn seed_conversation(&self, conversation_id: &str, members: &[&str]) {
        lock(&self.backend).conversations.insert(
            conversation_id.to_string(),
            ConversationRecord {
                members: members.iter().map(|m| m.to_string()).collect(),
                ..Default::default()
            },
        );
    }

    /// Append a message to a conversation's history without notifying anyone.
    pub fn seed_message(&self, conversation_id: &str, from: &str, content: &str) -> Option<Message> {
        let mut message = Message::with_content(content);
        lock(&self.backend)
            .append(conversation_id, from, &mut message, MessageStatus::Delivered)
            .then_some(message)
    }

    /// Make the next call of `op` fail with `exception`.
    pub fn fail_next(&self, op: SdkOp, exception: SdkException) {
        lock(&self.backend).faults.insert(op, Fault::Fail(exception));
    }

    /// Make the next call of `op` complete with neither result nor error.
    ///
    /// Sending has no such outcome (`send_message` yields `()` or an error),
    /// so `SdkOp::SendMessage` is refused and `false` returned.
    pub fn return_nothing_next(&self, op: SdkOp) -> bool {
        if op == SdkOp::SendMessage {
            warn!("send has no empty outcome, fault not installed");
            return false;
        }
        lock(&self.backend).faults.insert(op, Fault::Nothing);
        true
    }

    /// Existing client, if `client()` was ever called for this id.
    pub fn existing_client(&self, client_id: &str) -> Option<Arc<MemoryClient>> {
        lock(&self.clients).get(client_id).cloned()
    }

    /// Whether a process-wide message handler is installed.
    pub fn has_message_handler(&self) -> bool {
        lock(&self.message_handler).is_some()
    }

    // -- Simulated server pushes ----------------------------------------------

    pub fn emit_connection_resumed(&self, client_id: &str) {
        if let Some(handler) = self.client_handler(client_id) {
            handler.on_connection_resumed(client_id);
        }
    }

    pub fn emit_connection_paused(&self, client_id: &str) {
        if let Some(handler) = self.client_handler(client_id) {
            handler.on_connection_paused(client_id);
        }
    }

    /// Remove `client_id` from a conversation and tell its delegate.
    pub fn emit_kicked(&self, client_id: &str, conversation_id: &str, kicked_by: &str) {
        let conversation = {
            let mut backend = lock(&self.backend);
            if let Some(record) = backend.conversations.get_mut(conversation_id) {
                record.members.retain(|m| m != client_id);
            }
            backend.snapshot(conversation_id, client_id, false)
        };
        if let Some(handler) = self.conversation_handler(client_id) {
            handler.on_kicked(client_id, &conversation, kicked_by);
        }
    }

    pub fn emit_unread_updated(&self, client_id: &str, conversation_id: &str) {
        let conversation = lock(&self.backend).snapshot(conversation_id, client_id, true);
        if let Some(handler) = self.conversation_handler(client_id) {
            handler.on_unread_messages_count_updated(client_id, &conversation);
        }
    }

    /// A message from `from` arrives for `client_id`. Stores it and invokes
    /// the process-wide message handler.
    pub fn deliver_message(
        &self,
        client_id: &str,
        conversation_id: &str,
        from: &str,
        content: &str,
    ) -> Option<Message> {
        let (message, conversation) = {
            let mut backend = lock(&self.backend);
            let mut message = Message::with_content(content);
            if !backend.append(conversation_id, from, &mut message, MessageStatus::Delivered) {
                warn!(conversation_id, "message for unknown conversation dropped");
                return None;
            }
            let conversation = backend.snapshot(conversation_id, client_id, true);
            (message, conversation)
        };
        let handler = lock(&self.message_handler).clone();
        if let Some(handler) = handler {
            handler.on_message(client_id, &message, &conversation);
        }
        Some(message)
    }

    fn client_handler(&self, client_id: &str) -> Option<Arc<dyn ClientEventHandler>> {
        self.existing_client(client_id)
            .and_then(|c| c.client_event_handler())
    }

    fn conversation_handler(&self, client_id: &str) -> Option<Arc<dyn ConversationEventHandler>> {
        self.existing_client(client_id)
            .and_then(|c| c.conversation_event_handler())
    }
}

impl ImSdk for MemorySdk {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn client(&self, client_id: &str) -> Arc<dyn ImClient> {
        let mut clients = lock(&self.clients);
        let client = clients.entry(client_id.to_string()).or_insert_with(|| {
            debug!(client_id, "creating in-memory client");
            Arc::new(MemoryClient {
                client_id: client_id.to_string(),
                sdk: self.clone(),
                cache: Mutex::new(HashMap::new()),
                client_handler: Mutex::new(None),
                conversation_handler: Mutex::new(None),
                handler_installs: AtomicUsize::new(0),
                network_fetches: AtomicUsize::new(0),
                last_query: Mutex::new(None),
            })
        });
        client.clone()
    }

    fn set_message_handler(&self, handler: Option<Arc<dyn MessageHandler>>) {
        *lock(&self.message_handler) = handler;
    }
}

/// Client of the in-memory SDK.
pub struct MemoryClient {
    client_id: String,
    sdk: MemorySdk,
    cache: Mutex<HashMap<String, Arc<MemoryConversation>>>,
    client_handler: Mutex<Option<Arc<dyn ClientEventHandler>>>,
    conversation_handler: Mutex<Option<Arc<dyn ConversationEventHandler>>>,
    handler_installs: AtomicUsize,
    network_fetches: AtomicUsize,
    last_query: Mutex<Option<ConversationQuery>>,
}

impl MemoryClient {
    /// How many times a delegate was installed on this client.
    pub fn handler_installs(&self) -> usize {
        self.handler_installs.load(Ordering::SeqCst)
    }

    /// How many single-conversation fetches went to the "network".
    pub fn network_fetches(&self) -> usize {
        self.network_fetches.load(Ordering::SeqCst)
    }

    /// The most recent conversation query, as the SDK received it.
    pub fn last_query(&self) -> Option<ConversationQuery> {
        lock(&self.last_query).clone()
    }

    fn client_event_handler(&self) -> Option<Arc<dyn ClientEventHandler>> {
        lock(&self.client_handler).clone()
    }

    fn conversation_event_handler(&self) -> Option<Arc<dyn ConversationEventHandler>> {
        lock(&self.conversation_handler).clone()
    }

    fn cache_handle(&self, conversation_id: &str) -> Arc<MemoryConversation> {
        lock(&self.cache)
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryConversation {
                    conversation_id: conversation_id.to_string(),
                    client_id: self.client_id.clone(),
                    backend: self.sdk.backend.clone(),
                    sdk: self.sdk.clone(),
                    last_message_loaded: AtomicBool::new(false),
                })
            })
            .clone()
    }
}

#[async_trait]
impl ImClient for MemoryClient {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn set_client_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        self.handler_installs.fetch_add(1, Ordering::SeqCst);
        *lock(&self.client_handler) = Some(handler);
    }

    fn set_conversation_event_handler(&self, handler: Arc<dyn ConversationEventHandler>) {
        self.handler_installs.fetch_add(1, Ordering::SeqCst);
        *lock(&self.conversation_handler) = Some(handler);
    }

    fn cached_conversation(&self, conversation_id: &str) -> Option<Arc<dyn ImConversation>> {
        lock(&self.cache)
            .get(conversation_id)
            .map(|c| c.clone() as Arc<dyn ImConversation>)
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> SdkResult<Option<Arc<dyn ImConversation>>> {
        self.network_fetches.fetch_add(1, Ordering::SeqCst);
        let exists = {
            let mut backend = lock(&self.sdk.backend);
            match backend.take_fault(SdkOp::FetchConversation) {
                Some(Fault::Fail(e)) => return Err(e),
                Some(Fault::Nothing) => return Ok(None),
                None => backend.conversations.contains_key(conversation_id),
            }
        };
        if !exists {
            return Err(SdkException::new(CONVERSATION_NOT_FOUND, "conversation not found"));
        }
        Ok(Some(self.cache_handle(conversation_id)))
    }

    async fn query_conversations(
        &self,
        query: ConversationQuery,
    ) -> SdkResult<Option<Vec<Arc<dyn ImConversation>>>> {
        *lock(&self.last_query) = Some(query.clone());
        let on_server: Vec<String> = {
            let mut backend = lock(&self.sdk.backend);
            match backend.take_fault(SdkOp::QueryConversations) {
                Some(Fault::Fail(e)) => return Err(e),
                Some(Fault::Nothing) => return Ok(None),
                None => {}
            }
            backend
                .conversations
                .keys()
                .filter(|id| query.ids.contains(id))
                .cloned()
                .collect()
        };
        let cached: Vec<String> = {
            let cache = lock(&self.cache);
            on_server
                .iter()
                .filter(|id| cache.contains_key(id.as_str()))
                .cloned()
                .collect()
        };
        let mut matching = match query.cache_policy {
            Some(CachePolicy::CacheOnly) => cached,
            Some(CachePolicy::CacheElseNetwork | CachePolicy::CacheThenNetwork)
                if !cached.is_empty() =>
            {
                cached
            }
            _ => on_server,
        };
        debug!(
            client_id = %self.client_id,
            policy = ?query.cache_policy,
            matches = matching.len(),
            "conversation query"
        );
        // Server order: conversation id ascending.
        matching.sort();
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let conversations = matching
            .iter()
            .take(limit)
            .map(|id| {
                let handle = self.cache_handle(id);
                if query.refresh_last_message {
                    handle.last_message_loaded.store(true, Ordering::SeqCst);
                }
                handle as Arc<dyn ImConversation>
            })
            .collect();
        Ok(Some(conversations))
    }
}

/// Conversation handle of the in-memory SDK.
pub struct MemoryConversation {
    conversation_id: String,
    client_id: String,
    backend: Arc<Mutex<Backend>>,
    sdk: MemorySdk,
    last_message_loaded: AtomicBool,
}

#[async_trait]
impl ImConversation for MemoryConversation {
    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    fn snapshot(&self) -> Conversation {
        lock(&self.backend).snapshot(
            &self.conversation_id,
            &self.client_id,
            self.last_message_loaded.load(Ordering::SeqCst),
        )
    }

    async fn send_message(&self, message: &mut Message) -> SdkResult<()> {
        let mut backend = lock(&self.backend);
        // Only `Fail` is ever installed for sends.
        if let Some(Fault::Fail(e)) = backend.take_fault(SdkOp::SendMessage) {
            message.status = MessageStatus::Failed;
            message.conversation_id = Some(self.conversation_id.clone());
            message.from = Some(self.client_id.clone());
            return Err(e);
        }
        if !backend.append(&self.conversation_id, &self.client_id, message, MessageStatus::Sent) {
            message.status = MessageStatus::Failed;
            return Err(SdkException::new(CONVERSATION_NOT_FOUND, "conversation not found"));
        }
        self.last_message_loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn query_messages(
        &self,
        cursor: Option<MessageCursor>,
        limit: u32,
    ) -> SdkResult<Option<Vec<Message>>> {
        let mut backend = lock(&self.backend);
        match backend.take_fault(SdkOp::QueryMessages) {
            Some(Fault::Fail(e)) => return Err(e),
            Some(Fault::Nothing) => return Ok(None),
            None => {}
        }
        let Some(record) = backend.conversations.get(&self.conversation_id) else {
            return Ok(Some(Vec::new()));
        };
        let history = &record.messages;
        let end = match &cursor {
            Some(cursor) => history
                .iter()
                .position(|m| m.message_id.as_deref() == Some(cursor.message_id.as_str()))
                .unwrap_or_else(|| history.partition_point(|m| m.timestamp < cursor.timestamp)),
            None => history.len(),
        };
        let start = end.saturating_sub(limit as usize);
        Ok(Some(history[start..end].to_vec()))
    }

    fn read(&self) {
        if let Some(record) = lock(&self.backend).conversations.get_mut(&self.conversation_id) {
            record.unread.insert(self.client_id.clone(), 0);
        }
        self.sdk.emit_unread_updated(&self.client_id, &self.conversation_id);
    }
}
