// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the SDK seam and the plugin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Delivery state of a message as reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    None,
    Sending,
    Sent,
    Delivered,
    Failed,
    /// A status this bridge does not know about (raw SDK value).
    Other(i32),
}

impl MessageStatus {
    /// Host-facing status code. Unknown SDK states have no code.
    pub fn code(&self) -> Option<u8> {
        match self {
            Self::None => Some(0),
            Self::Sending => Some(1),
            Self::Sent => Some(2),
            Self::Delivered => Some(3),
            Self::Failed => Some(4),
            Self::Other(_) => None,
        }
    }
}

/// A message as seen by the bridge. Never cached; built for translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub conversation_id: Option<String>,
    /// Sender client id.
    pub from: Option<String>,
    /// Assigned by the backend once the message is sent.
    pub message_id: Option<String>,
    /// Send timestamp, epoch milliseconds.
    pub timestamp: i64,
    /// Delivery receipt timestamp, epoch milliseconds.
    pub delivered_at: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub status: MessageStatus,
}

impl Message {
    /// An unsent message carrying only its content.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            conversation_id: None,
            from: None,
            message_id: None,
            timestamp: 0,
            delivered_at: None,
            updated_at: None,
            status: MessageStatus::None,
        }
    }
}

/// Snapshot of a conversation's SDK-side state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub members: Vec<String>,
    pub last_message: Option<Message>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_messages_count: u32,
}

/// Where a query may look for results, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    CacheElseNetwork,
    CacheOnly,
    CacheThenNetwork,
    IgnoreCache,
    NetworkElseCache,
    NetworkOnly,
}

impl CachePolicy {
    /// Map a host-side policy code (0..=5). Anything else means "SDK default".
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::CacheElseNetwork),
            1 => Some(Self::CacheOnly),
            2 => Some(Self::CacheThenNetwork),
            3 => Some(Self::IgnoreCache),
            4 => Some(Self::NetworkElseCache),
            5 => Some(Self::NetworkOnly),
            _ => None,
        }
    }
}

/// Parameters of a conversation query: `objectId IN ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationQuery {
    pub ids: Vec<String>,
    /// Eagerly fetch each conversation's last message.
    pub refresh_last_message: bool,
    /// `None` leaves the SDK default in place.
    pub cache_policy: Option<CachePolicy>,
    pub limit: Option<u32>,
}

/// Pagination cursor: messages strictly before `(message_id, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCursor {
    pub message_id: String,
    pub timestamp: i64,
}

impl MessageCursor {
    /// Both halves are required; a lone id or timestamp is no cursor at all.
    pub fn from_parts(message_id: Option<String>, timestamp: Option<i64>) -> Option<Self> {
        match (message_id, timestamp) {
            (Some(message_id), Some(timestamp)) => Some(Self {
                message_id,
                timestamp,
            }),
            _ => None,
        }
    }
}

/// A command invoked by the host: `"{namespace}_{operation}"` plus an opaque
/// argument payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// An item on the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Success(serde_json::Value),
    Failure(ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_has_no_code() {
        assert_eq!(MessageStatus::Delivered.code(), Some(3));
        assert_eq!(MessageStatus::Other(42).code(), None);
    }

    #[test]
    fn cache_policy_codes() {
        assert_eq!(CachePolicy::from_code(0), Some(CachePolicy::CacheElseNetwork));
        assert_eq!(CachePolicy::from_code(5), Some(CachePolicy::NetworkOnly));
        assert_eq!(CachePolicy::from_code(6), None);
        assert_eq!(CachePolicy::from_code(-1), None);
    }

    #[test]
    fn half_a_cursor_is_no_cursor() {
        assert!(MessageCursor::from_parts(Some("m1".into()), None).is_none());
        assert!(MessageCursor::from_parts(None, Some(1_700_000_000_000)).is_none());
        let cursor = MessageCursor::from_parts(Some("m1".into()), Some(5)).expect("cursor");
        assert_eq!(cursor.message_id, "m1");
        assert_eq!(cursor.timestamp, 5);
    }
}
