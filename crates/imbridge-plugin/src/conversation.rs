// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `avIMConversation` commands. Every operation first resolves the
// conversation handle: client cache, then a network fetch.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use imbridge_core::error::{BridgeError, Result};
use imbridge_core::translate::{
    ConversationArgs, QueryMessagesArgs, SendMessageArgs, message_to_value, parse_args,
};
use imbridge_core::types::Message;
use imbridge_sdk::ImConversation;

use crate::registry::{ClientSession, SessionRegistry};
use crate::reply::Reply;
use crate::router::MethodCallHandler;

pub const NAMESPACE: &str = "avIMConversation";

pub struct ConversationHandler {
    registry: Arc<SessionRegistry>,
    runtime: Handle,
}

impl ConversationHandler {
    pub fn new(registry: Arc<SessionRegistry>, runtime: Handle) -> Self {
        Self { registry, runtime }
    }

    fn spawn<F>(&self, reply: Reply, task: F)
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        self.runtime.spawn(async move {
            reply.complete(task.await);
        });
    }
}

impl MethodCallHandler for ConversationHandler {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn on_method_call(&self, operation: &str, arguments: Value, reply: Reply) -> Result<()> {
        match operation {
            "sendMessage" => match parse_args::<SendMessageArgs>(arguments) {
                Ok(args) => {
                    let session = self.registry.session(&args.client_id);
                    self.spawn(reply, send_message(session, args));
                }
                Err(e) => reply.complete(Err(e)),
            },
            "queryMessages" => match parse_args::<QueryMessagesArgs>(arguments) {
                Ok(args) => {
                    let session = self.registry.session(&args.client_id);
                    self.spawn(reply, query_messages(session, args));
                }
                Err(e) => reply.complete(Err(e)),
            },
            "read" => match parse_args::<ConversationArgs>(arguments) {
                Ok(args) => {
                    let session = self.registry.session(&args.client_id);
                    self.spawn(reply, read(session, args));
                }
                Err(e) => reply.complete(Err(e)),
            },
            _ => {
                return Err(BridgeError::NotImplemented(format!(
                    "{NAMESPACE}_{operation}"
                )));
            }
        }
        Ok(())
    }
}

/// Find the conversation in the client cache, or fetch it.
async fn resolve(
    session: &ClientSession,
    conversation_id: &str,
) -> Result<Arc<dyn ImConversation>> {
    let client = session.client();
    if let Some(conversation) = client.cached_conversation(conversation_id) {
        debug!(conversation_id, "conversation from cache");
        return Ok(conversation);
    }
    debug!(conversation_id, "conversation not cached, fetching");
    client
        .fetch_conversation(conversation_id)
        .await
        .map_err(BridgeError::sdk("cannot get conversation"))?
        .ok_or(BridgeError::AssertionFailed("conversation should not be null"))
}

#[instrument(skip_all, fields(client_id = %session.client_id(), conversation_id = %args.conversation_id))]
pub async fn send_message(session: Arc<ClientSession>, args: SendMessageArgs) -> Result<Value> {
    let conversation = resolve(&session, &args.conversation_id).await?;
    let mut message = Message::with_content(args.content);
    match conversation.send_message(&mut message).await {
        Ok(()) => {
            debug!(message_id = ?message.message_id, "message sent");
            Ok(message_to_value(&message))
        }
        Err(source) => Err(BridgeError::SendFailed {
            message: Box::new(message),
            source,
        }),
    }
}

/// History query. A cursor needs both `msgId` and `timestamp`; with only one
/// of them the most recent `limit` messages are returned.
#[instrument(skip_all, fields(client_id = %session.client_id(), conversation_id = %args.conversation_id))]
pub async fn query_messages(session: Arc<ClientSession>, args: QueryMessagesArgs) -> Result<Value> {
    let conversation = resolve(&session, &args.conversation_id).await?;
    let cursor = args.cursor();
    debug!(paged = cursor.is_some(), limit = args.limit, "querying messages");
    let messages = conversation
        .query_messages(cursor, args.limit)
        .await
        .map_err(BridgeError::sdk("cannot query messages"))?
        .ok_or(BridgeError::AssertionFailed("messages should not be null"))?;
    Ok(Value::Array(messages.iter().map(message_to_value).collect()))
}

/// Mark read. Replies as soon as the SDK accepts the request.
#[instrument(skip_all, fields(client_id = %session.client_id(), conversation_id = %args.conversation_id))]
pub async fn read(session: Arc<ClientSession>, args: ConversationArgs) -> Result<Value> {
    let conversation = resolve(&session, &args.conversation_id).await?;
    conversation.read();
    Ok(Value::Null)
}
