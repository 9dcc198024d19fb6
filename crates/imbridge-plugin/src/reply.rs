// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Response sink for a single host command.

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use imbridge_core::error::{ChannelError, Result};
use imbridge_core::translate::error_to_channel;

/// What the host receives for one command.
pub type Outcome = std::result::Result<Value, ChannelError>;

/// Delivers the response to one host command.
///
/// Every method takes `self` by value, so a command can be answered at most
/// once. The sink may be completed from any thread.
pub struct Reply {
    deliver: Box<dyn FnOnce(Outcome) + Send>,
}

impl Reply {
    /// Wrap a transport callback.
    pub fn from_fn(deliver: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            deliver: Box::new(deliver),
        }
    }

    /// A reply whose outcome is received through a oneshot channel.
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let reply = Self::from_fn(move |outcome| {
            if tx.send(outcome).is_err() {
                debug!("reply receiver dropped before completion");
            }
        });
        (reply, rx)
    }

    pub fn success(self, value: Value) {
        (self.deliver)(Ok(value));
    }

    pub fn error(self, error: ChannelError) {
        (self.deliver)(Err(error));
    }

    /// Answer with the outcome of a bridge operation, translating failures
    /// into the host error shape.
    pub fn complete(self, outcome: Result<Value>) {
        match outcome {
            Ok(value) => self.success(value),
            Err(e) => {
                warn!(error = %e, "command failed");
                self.error(error_to_channel(&e))
            }
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").finish_non_exhaustive()
    }
}
