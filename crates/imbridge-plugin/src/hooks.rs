// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SDK delegates that turn SDK notifications into tagged host events.
//
// The delegates run on whatever thread the SDK calls them from.  They only
// translate and hand the event to the bridge; they never block on the host.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use imbridge_core::translate::{conversation_to_value, event_payload, message_to_value};
use imbridge_core::types::{ChannelEvent, Conversation, Message};
use imbridge_sdk::{ClientEventHandler, ConversationEventHandler, MessageHandler};

use crate::events::EventBridge;

pub const ON_CONNECTION_RESUMED: &str = "avIMClient_clientEventHandler_onConnectionResumed";
pub const ON_CONNECTION_PAUSED: &str = "avIMClient_clientEventHandler_onConnectionPaused";
pub const ON_KICKED: &str = "avIMClient_conversationEventHandler_onKicked";
pub const ON_UNREAD_MESSAGES_COUNT_UPDATED: &str =
    "avIMClient_conversationEventHandler_onUnreadMessagesCountUpdated";
pub const ON_MESSAGE: &str = "avIMClient_messageHandler_onMessage";

/// An SDK notification in the form the host receives it.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    ConnectionResumed {
        client_id: String,
    },
    ConnectionPaused {
        client_id: String,
    },
    Kicked {
        client_id: String,
        conversation: Value,
        kicked_by: String,
    },
    UnreadMessagesCountUpdated {
        client_id: String,
        conversation: Value,
    },
    Message {
        client_id: String,
        message: Value,
        conversation: Value,
    },
}

impl BridgeEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ConnectionResumed { .. } => ON_CONNECTION_RESUMED,
            Self::ConnectionPaused { .. } => ON_CONNECTION_PAUSED,
            Self::Kicked { .. } => ON_KICKED,
            Self::UnreadMessagesCountUpdated { .. } => ON_UNREAD_MESSAGES_COUNT_UPDATED,
            Self::Message { .. } => ON_MESSAGE,
        }
    }

    pub fn data(&self) -> Value {
        match self {
            Self::ConnectionResumed { client_id } | Self::ConnectionPaused { client_id } => {
                json!({ "clientId": client_id })
            }
            Self::Kicked {
                client_id,
                conversation,
                kicked_by,
            } => json!({
                "clientId": client_id,
                "conversation": conversation,
                "kickedBy": kicked_by,
            }),
            Self::UnreadMessagesCountUpdated {
                client_id,
                conversation,
            } => json!({
                "clientId": client_id,
                "conversation": conversation,
            }),
            Self::Message {
                client_id,
                message,
                conversation,
            } => json!({
                "clientId": client_id,
                "message": message,
                "conversation": conversation,
            }),
        }
    }

    pub fn into_channel_event(self) -> ChannelEvent {
        ChannelEvent::Success(event_payload(self.tag(), self.data()))
    }
}

fn emit(events: &EventBridge, event: BridgeEvent) {
    debug!(tag = event.tag(), "forwarding SDK notification");
    events.produce(event.into_channel_event());
}

/// Connection-state delegate installed on every client at `getInstance`.
pub struct ClientEventForwarder {
    events: Arc<EventBridge>,
}

impl ClientEventForwarder {
    pub fn new(events: Arc<EventBridge>) -> Self {
        Self { events }
    }
}

impl ClientEventHandler for ClientEventForwarder {
    fn on_connection_resumed(&self, client_id: &str) {
        emit(
            &self.events,
            BridgeEvent::ConnectionResumed {
                client_id: client_id.to_string(),
            },
        );
    }

    fn on_connection_paused(&self, client_id: &str) {
        emit(
            &self.events,
            BridgeEvent::ConnectionPaused {
                client_id: client_id.to_string(),
            },
        );
    }

    fn on_client_offline(&self, client_id: &str, reason: i32) {
        debug!(client_id, reason, "client offline, not forwarded");
    }
}

/// Conversation delegate installed on every client at `getInstance`.
pub struct ConversationEventForwarder {
    events: Arc<EventBridge>,
}

impl ConversationEventForwarder {
    pub fn new(events: Arc<EventBridge>) -> Self {
        Self { events }
    }
}

impl ConversationEventHandler for ConversationEventForwarder {
    fn on_kicked(&self, client_id: &str, conversation: &Conversation, kicked_by: &str) {
        emit(
            &self.events,
            BridgeEvent::Kicked {
                client_id: client_id.to_string(),
                conversation: conversation_to_value(conversation),
                kicked_by: kicked_by.to_string(),
            },
        );
    }

    fn on_unread_messages_count_updated(&self, client_id: &str, conversation: &Conversation) {
        emit(
            &self.events,
            BridgeEvent::UnreadMessagesCountUpdated {
                client_id: client_id.to_string(),
                conversation: conversation_to_value(conversation),
            },
        );
    }

    fn on_invited(&self, client_id: &str, conversation: &Conversation, invited_by: &str) {
        debug!(
            client_id,
            conversation_id = %conversation.conversation_id,
            invited_by,
            "invited, not forwarded"
        );
    }

    fn on_member_joined(
        &self,
        client_id: &str,
        conversation: &Conversation,
        members: &[String],
        invited_by: &str,
    ) {
        debug!(
            client_id,
            conversation_id = %conversation.conversation_id,
            ?members,
            invited_by,
            "members joined, not forwarded"
        );
    }

    fn on_member_left(
        &self,
        client_id: &str,
        conversation: &Conversation,
        members: &[String],
        kicked_by: &str,
    ) {
        debug!(
            client_id,
            conversation_id = %conversation.conversation_id,
            ?members,
            kicked_by,
            "members left, not forwarded"
        );
    }
}

/// Process-wide message delegate.
pub struct MessageForwarder {
    events: Arc<EventBridge>,
}

impl MessageForwarder {
    pub fn new(events: Arc<EventBridge>) -> Self {
        Self { events }
    }
}

impl MessageHandler for MessageForwarder {
    fn on_message(&self, client_id: &str, message: &Message, conversation: &Conversation) {
        emit(
            &self.events,
            BridgeEvent::Message {
                client_id: client_id.to_string(),
                message: message_to_value(message),
                conversation: conversation_to_value(conversation),
            },
        );
    }
}
