// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for imbridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Message;

/// Error code for a malformed or missing call argument.
pub const INVALID_ARGS: &str = "INVALID_ARGS";

/// Error code for an operation that is invalid in the current session state.
/// Reserved; no current command produces it.
pub const ILLEGAL_STATE: &str = "ILLEGAL_STATE";

/// Error code for SDK, network and server failures.
pub const ERROR: &str = "ERROR";

/// Failure reported by the messaging SDK.
///
/// `code` is the SDK error code, `app_code` the application-level code the
/// backend attached (often equal to `code`), and `message` the failure reason
/// if the SDK supplied one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} (code {code})", .message.as_deref().unwrap_or("unknown error"))]
pub struct SdkException {
    pub code: i64,
    pub app_code: i64,
    pub message: Option<String>,
}

impl SdkException {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            app_code: code,
            message: Some(message.into()),
        }
    }
}

/// Top-level error type for all imbridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Host contract --
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The host invoked a command no handler implements. Fatal: the command
    /// surface is a closed contract between host and bridge.
    #[error("unimplemented method: {0}")]
    NotImplemented(String),

    // -- SDK --
    /// An SDK call failed. `context` names the operation ("cannot query
    /// messages", ...).
    #[error("{context}: {source}")]
    Sdk {
        context: &'static str,
        source: SdkException,
    },

    /// Sending failed; keeps the attempted message for the host.
    #[error("send message failed: {source}")]
    SendFailed {
        message: Box<Message>,
        source: SdkException,
    },

    /// The SDK reported neither a result nor an error.
    #[error("assertion failed: {0}")]
    AssertionFailed(&'static str),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Attach the failed operation's name to an SDK failure.
    pub fn sdk(context: &'static str) -> impl FnOnce(SdkException) -> Self {
        move |source| Self::Sdk { context, source }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Host-neutral error shape delivered to the host as a failed reply or a
/// failure event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl ChannelError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }

    /// Whether this failure came from an internal assertion rather than the
    /// server.
    pub fn is_assertion(&self) -> bool {
        self.code == ERROR && self.message.starts_with("assertion failed:")
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_exception_display_uses_reason() {
        let e = SdkException::new(141, "network timeout");
        assert_eq!(e.to_string(), "network timeout (code 141)");

        let bare = SdkException {
            code: 4301,
            app_code: 0,
            message: None,
        };
        assert_eq!(bare.to_string(), "unknown error (code 4301)");
    }

    #[test]
    fn sdk_context_prefixes_display() {
        let err = BridgeError::sdk("cannot query messages")(SdkException::new(1, "offline"));
        assert_eq!(err.to_string(), "cannot query messages: offline (code 1)");
    }
}
