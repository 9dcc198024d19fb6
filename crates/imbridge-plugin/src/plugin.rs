// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plugin root: owns the event bridge, the session registry and the router,
// and exposes the two host-facing surfaces (method calls, event listener).

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use imbridge_core::config::BridgeConfig;
use imbridge_core::error::Result;
use imbridge_core::types::MethodCall;
use imbridge_sdk::ImSdk;

use crate::client::ClientHandler;
use crate::conversation::ConversationHandler;
use crate::events::{EventBridge, EventSink};
use crate::registry::SessionRegistry;
use crate::reply::Reply;
use crate::router::Router;

pub struct Plugin {
    config: BridgeConfig,
    events: Arc<EventBridge>,
    registry: Arc<SessionRegistry>,
    router: Router,
}

impl Plugin {
    /// Wire the plugin to `sdk`. SDK calls run as tasks on `runtime`.
    pub fn new(sdk: Arc<dyn ImSdk>, config: BridgeConfig, runtime: Handle) -> Self {
        let events = Arc::new(EventBridge::new(config.buffer_warn_threshold));
        let registry = Arc::new(SessionRegistry::new(sdk.clone(), events.clone()));

        let mut router = Router::new(events.clone());
        router.register(Box::new(ClientHandler::new(
            registry.clone(),
            runtime.clone(),
        )));
        router.register(Box::new(ConversationHandler::new(registry.clone(), runtime)));

        info!(
            sdk = sdk.name(),
            method_channel = %config.method_channel,
            event_channel = %config.event_channel,
            "plugin attached"
        );

        Self {
            config,
            events,
            registry,
            router,
        }
    }

    /// Handle one host command. See [`Router::dispatch`].
    pub fn on_method_call(&self, call: MethodCall, reply: Reply) -> Result<()> {
        self.router.dispatch(call, reply)
    }

    /// The host started listening on the event channel.
    pub fn on_listen(&self, listener: Arc<dyn EventSink>) {
        self.events.attach(listener);
    }

    /// The host stopped listening on the event channel.
    pub fn on_cancel(&self) {
        self.events.detach();
    }

    pub fn events(&self) -> &Arc<EventBridge> {
        &self.events
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
