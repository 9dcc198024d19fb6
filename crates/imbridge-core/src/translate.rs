// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Translation between SDK models and the host-neutral map encoding.
//
// Everything here is pure and stateless so it can run from any SDK callback
// context.  Outbound maps always carry every key; absent values are `null`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{
    BridgeError, ChannelError, ERROR, ILLEGAL_STATE, INVALID_ARGS, Result, SdkException,
};
use crate::types::{CachePolicy, Conversation, ConversationQuery, Message, MessageCursor};

// ---------------------------------------------------------------------------
// SDK model -> host map
// ---------------------------------------------------------------------------

pub fn message_to_value(message: &Message) -> Value {
    json!({
        "content": message.content,
        "conversationId": message.conversation_id,
        "from": message.from,
        "messageId": message.message_id,
        "timestamp": message.timestamp,
        "deliveredAt": message.delivered_at,
        "updateAt": message.updated_at.map(|t| t.timestamp_millis()),
        "status": message.status.code(),
    })
}

pub fn conversation_to_value(conversation: &Conversation) -> Value {
    json!({
        "conversationId": conversation.conversation_id,
        "members": conversation.members,
        "lastMessage": conversation.last_message.as_ref().map(message_to_value),
        "lastMessageAt": conversation.last_message_at.map(|t| t.timestamp_millis()),
        "unreadMessagesCount": conversation.unread_messages_count,
    })
}

pub fn exception_to_value(exception: &SdkException) -> Value {
    json!({
        "code": exception.code,
        "appCode": exception.app_code,
        "message": exception.message,
    })
}

/// Wrap an event's data with its tag, as delivered on the event stream.
pub fn event_payload(tag: &str, data: Value) -> Value {
    json!({ "event": tag, "data": data })
}

// ---------------------------------------------------------------------------
// Bridge error -> host error shape
// ---------------------------------------------------------------------------

/// Translate a failure into the shape delivered to the host. SDK failures
/// pass through verbatim: their description, or for a failed send the
/// attempted message together with the structured exception.
pub fn error_to_channel(err: &BridgeError) -> ChannelError {
    match err {
        BridgeError::InvalidArgs(message) => ChannelError::new(INVALID_ARGS, message, Value::Null),
        BridgeError::IllegalState(message) => {
            ChannelError::new(ILLEGAL_STATE, message, Value::Null)
        }
        BridgeError::Sdk { context, source } => {
            ChannelError::new(ERROR, *context, Value::String(source.to_string()))
        }
        BridgeError::SendFailed { message, source } => ChannelError::new(
            ERROR,
            "send message failed",
            json!({
                "message": message_to_value(message),
                "exception": exception_to_value(source),
            }),
        ),
        other => ChannelError::new(ERROR, other.to_string(), Value::Null),
    }
}

// ---------------------------------------------------------------------------
// Host arguments -> SDK call parameters
// ---------------------------------------------------------------------------

/// Decode a command's argument payload. Missing or mistyped fields are the
/// caller's bug and surface as `INVALID_ARGS`.
pub fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| BridgeError::InvalidArgs(e.to_string()))
}

/// Arguments of `avIMClient_getInstance`: the bare client id.
pub fn client_id_arg(arguments: &Value) -> Result<String> {
    match arguments {
        Value::String(id) => Ok(id.clone()),
        _ => Err(BridgeError::InvalidArgs("clientId cannot be nil".into())),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConversationsArgs {
    pub client_id: String,
    pub ids: Vec<String>,
    #[serde(default)]
    pub refresh_last_message: bool,
    #[serde(default)]
    pub cache_policy: Option<i64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl From<QueryConversationsArgs> for ConversationQuery {
    fn from(args: QueryConversationsArgs) -> Self {
        Self {
            ids: args.ids,
            refresh_last_message: args.refresh_last_message,
            cache_policy: args.cache_policy.and_then(CachePolicy::from_code),
            limit: args.limit,
        }
    }
}

/// Arguments shared by every conversation command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationArgs {
    pub client_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageArgs {
    pub client_id: String,
    pub conversation_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMessagesArgs {
    pub client_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub limit: u32,
}

impl QueryMessagesArgs {
    /// The pagination cursor, if both halves were supplied.
    pub fn cursor(&self) -> Option<MessageCursor> {
        MessageCursor::from_parts(self.msg_id.clone(), self.timestamp)
    }
}
