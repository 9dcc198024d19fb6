// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `avIMClient` commands: session lifecycle, message hook, conversation query.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use imbridge_core::error::{BridgeError, Result};
use imbridge_core::translate::{
    QueryConversationsArgs, client_id_arg, conversation_to_value, parse_args,
};
use imbridge_core::types::ConversationQuery;

use crate::registry::{ClientSession, SessionRegistry};
use crate::reply::Reply;
use crate::router::MethodCallHandler;

pub const NAMESPACE: &str = "avIMClient";

pub struct ClientHandler {
    registry: Arc<SessionRegistry>,
    runtime: Handle,
}

impl ClientHandler {
    pub fn new(registry: Arc<SessionRegistry>, runtime: Handle) -> Self {
        Self { registry, runtime }
    }

    fn get_instance(&self, arguments: &Value) -> Result<Value> {
        let client_id = client_id_arg(arguments)?;
        self.registry.get_instance(&client_id);
        Ok(Value::Null)
    }

    fn query_conversations(&self, arguments: Value, reply: Reply) {
        let args: QueryConversationsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(e) => return reply.complete(Err(e)),
        };
        let session = self.registry.session(&args.client_id);
        self.runtime.spawn(async move {
            reply.complete(query_conversations(session, args.into()).await);
        });
    }
}

impl MethodCallHandler for ClientHandler {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn on_method_call(&self, operation: &str, arguments: Value, reply: Reply) -> Result<()> {
        match operation {
            "getInstance" => reply.complete(self.get_instance(&arguments)),
            "registerMessageHandler" => {
                self.registry.register_message_handler();
                reply.success(Value::Null);
            }
            "unregisterMessageHandler" => {
                self.registry.unregister_message_handler();
                reply.success(Value::Null);
            }
            "queryConversations" => self.query_conversations(arguments, reply),
            _ => {
                return Err(BridgeError::NotImplemented(format!(
                    "{NAMESPACE}_{operation}"
                )));
            }
        }
        Ok(())
    }
}

/// Run a conversation query for `session` and translate the result list,
/// keeping server order.
#[instrument(skip_all, fields(client_id = %session.client_id(), ids = query.ids.len()))]
pub async fn query_conversations(
    session: Arc<ClientSession>,
    query: ConversationQuery,
) -> Result<Value> {
    let conversations = session
        .client()
        .query_conversations(query)
        .await
        .map_err(BridgeError::sdk("cannot query conversations"))?
        .ok_or(BridgeError::AssertionFailed("conversations should not be null"))?;
    debug!(count = conversations.len(), "conversations fetched");
    Ok(Value::Array(
        conversations
            .iter()
            .map(|conversation| conversation_to_value(&conversation.snapshot()))
            .collect(),
    ))
}
