// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session registry: one client session per client id, plus the single
// process-wide message hook.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use imbridge_sdk::{ImClient, ImSdk};

use crate::events::EventBridge;
use crate::hooks::{ClientEventForwarder, ConversationEventForwarder, MessageForwarder};

/// A client session known to the bridge.
pub struct ClientSession {
    client: Arc<dyn ImClient>,
    hooks_installed: AtomicBool,
}

impl ClientSession {
    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    pub fn client(&self) -> &Arc<dyn ImClient> {
        &self.client
    }

    /// Whether the event-forwarding delegates are installed on the client.
    pub fn hooks_installed(&self) -> bool {
        self.hooks_installed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, Arc<ClientSession>>,
    message_hook: Option<Arc<MessageForwarder>>,
}

/// Create-or-get store of client sessions, shared by every handler.
pub struct SessionRegistry {
    sdk: Arc<dyn ImSdk>,
    events: Arc<EventBridge>,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new(sdk: Arc<dyn ImSdk>, events: Arc<EventBridge>) -> Self {
        Self {
            sdk,
            events,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session for `client_id`, created on first use. Does not install
    /// any hooks.
    pub fn session(&self, client_id: &str) -> Arc<ClientSession> {
        let mut state = self.lock();
        self.session_locked(&mut state, client_id)
    }

    fn session_locked(&self, state: &mut RegistryState, client_id: &str) -> Arc<ClientSession> {
        state
            .sessions
            .entry(client_id.to_string())
            .or_insert_with(|| {
                info!(client_id, sdk = self.sdk.name(), "client session created");
                Arc::new(ClientSession {
                    client: self.sdk.client(client_id),
                    hooks_installed: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Resolve-or-create the session and install its event hooks. Hooks are
    /// installed once per client id no matter how often this is called.
    pub fn get_instance(&self, client_id: &str) -> Arc<ClientSession> {
        let mut state = self.lock();
        let session = self.session_locked(&mut state, client_id);
        if session.hooks_installed.swap(true, Ordering::SeqCst) {
            debug!(client_id, "event hooks already installed");
        } else {
            let client = session.client();
            client.set_client_event_handler(Arc::new(ClientEventForwarder::new(
                self.events.clone(),
            )));
            client.set_conversation_event_handler(Arc::new(ConversationEventForwarder::new(
                self.events.clone(),
            )));
            info!(client_id, "event hooks installed");
        }
        session
    }

    /// Install the process-wide message hook. Returns `false` if one was
    /// already installed, in which case nothing changes.
    pub fn register_message_handler(&self) -> bool {
        let mut state = self.lock();
        if state.message_hook.is_some() {
            debug!("message handler already registered");
            return false;
        }
        let hook = Arc::new(MessageForwarder::new(self.events.clone()));
        self.sdk.set_message_handler(Some(hook.clone()));
        state.message_hook = Some(hook);
        info!("message handler registered");
        true
    }

    /// Remove the message hook. Returns `false` if none was installed.
    pub fn unregister_message_handler(&self) -> bool {
        let mut state = self.lock();
        if state.message_hook.take().is_none() {
            debug!("no message handler to unregister");
            return false;
        }
        self.sdk.set_message_handler(None);
        info!("message handler unregistered");
        true
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Forget every session and remove the message hook.
    pub fn reset(&self) {
        let mut state = self.lock();
        if state.message_hook.take().is_some() {
            self.sdk.set_message_handler(None);
        }
        state.sessions.clear();
        info!("session registry reset");
    }
}
