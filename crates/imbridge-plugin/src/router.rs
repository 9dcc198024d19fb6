// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command router: dispatches `{namespace}_{operation}` commands to the first
// handler that owns the namespace.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, instrument};

use imbridge_core::error::{BridgeError, Result};
use imbridge_core::types::MethodCall;

use crate::events::EventBridge;
use crate::reply::Reply;

/// Router-level command that empties the event buffer.
pub const CLEAR_EVENT_BUFFER: &str = "_clearEventBuffer";

/// A handler for every command in one namespace.
pub trait MethodCallHandler: Send + Sync {
    /// Command prefix this handler owns, without the trailing `_`.
    fn namespace(&self) -> &'static str;

    /// Handle `operation` (the command name with the namespace stripped).
    ///
    /// Either answers `reply` (now or from a spawned task) and returns
    /// `Ok(())`, or returns `NotImplemented` for an unknown operation.
    fn on_method_call(&self, operation: &str, arguments: Value, reply: Reply) -> Result<()>;
}

pub struct Router {
    handlers: Vec<Box<dyn MethodCallHandler>>,
    events: Arc<EventBridge>,
}

impl Router {
    pub fn new(events: Arc<EventBridge>) -> Self {
        Self {
            handlers: Vec::new(),
            events,
        }
    }

    /// Append a handler. Handlers are tried in registration order.
    pub fn register(&mut self, handler: Box<dyn MethodCallHandler>) {
        debug!(namespace = handler.namespace(), "handler registered");
        self.handlers.push(handler);
    }

    /// Dispatch one command.
    ///
    /// `Err(NotImplemented)` means no handler claimed the command; the reply
    /// is dropped unanswered and the caller must treat this as fatal.
    #[instrument(skip_all, fields(method = %call.method))]
    pub fn dispatch(&self, call: MethodCall, reply: Reply) -> Result<()> {
        if call.method == CLEAR_EVENT_BUFFER {
            let dropped = self.events.clear_buffer();
            debug!(dropped, "event buffer cleared");
            reply.success(Value::Null);
            return Ok(());
        }

        for handler in &self.handlers {
            let operation = call
                .method
                .strip_prefix(handler.namespace())
                .and_then(|rest| rest.strip_prefix('_'));
            if let Some(operation) = operation {
                return handler.on_method_call(operation, call.arguments, reply);
            }
        }

        error!("no handler claims this command");
        Err(BridgeError::NotImplemented(call.method))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use imbridge_core::types::ChannelEvent;

    /// Records every operation it sees and answers with its namespace.
    struct Recording {
        namespace: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl MethodCallHandler for Recording {
        fn namespace(&self) -> &'static str {
            self.namespace
        }

        fn on_method_call(&self, operation: &str, _arguments: Value, reply: Reply) -> Result<()> {
            self.seen
                .lock()
                .expect("seen")
                .push(format!("{}:{operation}", self.namespace));
            reply.success(json!(self.namespace));
            Ok(())
        }
    }

    fn router() -> (Router, Arc<EventBridge>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(EventBridge::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new(events.clone());
        router.register(Box::new(Recording {
            namespace: "avIMClient",
            seen: seen.clone(),
        }));
        router.register(Box::new(Recording {
            namespace: "avIMConversation",
            seen: seen.clone(),
        }));
        (router, events, seen)
    }

    #[tokio::test]
    async fn routes_by_namespace_prefix() {
        let (router, _events, seen) = router();
        let (reply, rx) = Reply::channel();
        router
            .dispatch(MethodCall::new("avIMConversation_read", Value::Null), reply)
            .expect("dispatch");
        assert_eq!(rx.await.expect("outcome").expect("ok"), json!("avIMConversation"));
        assert_eq!(*seen.lock().unwrap(), vec!["avIMConversation:read".to_string()]);
    }

    #[test]
    fn unknown_namespace_is_not_implemented() {
        let (router, _events, seen) = router();
        let (reply, _rx) = Reply::channel();
        let err = router
            .dispatch(MethodCall::new("foo_bar", json!({})), reply)
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented(ref m) if m == "foo_bar"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn namespace_must_be_followed_by_separator() {
        let (router, _events, _seen) = router();
        let (reply, _rx) = Reply::channel();
        let err = router
            .dispatch(MethodCall::new("avIMClientX_getInstance", Value::Null), reply)
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn clear_event_buffer_bypasses_handlers() {
        let (router, events, seen) = router();
        events.produce(ChannelEvent::Success(json!(1)));
        let (reply, rx) = Reply::channel();
        router
            .dispatch(MethodCall::new(CLEAR_EVENT_BUFFER, Value::Null), reply)
            .expect("dispatch");
        assert_eq!(rx.await.expect("outcome").expect("ok"), Value::Null);
        assert_eq!(events.buffered_len(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }
}
