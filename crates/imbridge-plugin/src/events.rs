// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event bridge: the single ordered channel from SDK notifications to the host.
//
// At most one listener is attached at a time.  While none is, events are
// buffered FIFO; attaching drains the buffer into the new listener, in
// arrival order, before any later event can be forwarded.  The buffer and the
// listener slot share one mutex and forwarding happens under it, so producers
// on different threads observe a single total order.  Listeners must not call
// back into the bridge from `deliver`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use imbridge_core::types::ChannelEvent;

/// Receives events forwarded by the bridge.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: ChannelEvent);
}

/// Listener that forwards into an unbounded tokio channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: ChannelEvent) {
        if self.tx.send(event).is_err() {
            debug!("event listener dropped its receiver");
        }
    }
}

/// Whether a host listener is currently attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    NoListener,
    ListenerAttached,
}

struct EventState {
    buffer: VecDeque<ChannelEvent>,
    listener: Option<Arc<dyn EventSink>>,
}

/// Replay-buffered, single-subscriber event channel.
pub struct EventBridge {
    state: Mutex<EventState>,
    /// Log a warning each time the buffer grows by this many events.
    warn_threshold: usize,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBridge {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            state: Mutex::new(EventState {
                buffer: VecDeque::new(),
                listener: None,
            }),
            warn_threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward `event` to the listener, or buffer it if there is none.
    pub fn produce(&self, event: ChannelEvent) {
        let mut guard = self.lock();
        let state = &mut *guard;
        match &state.listener {
            Some(listener) => listener.deliver(event),
            None => {
                state.buffer.push_back(event);
                let len = state.buffer.len();
                if self.warn_threshold > 0 && len % self.warn_threshold == 0 {
                    warn!(buffered = len, "no event listener attached, buffer growing");
                }
            }
        }
    }

    /// Attach `listener`, replacing any current one, and replay everything
    /// buffered so far.
    pub fn attach(&self, listener: Arc<dyn EventSink>) {
        let mut state = self.lock();
        let buffered = std::mem::take(&mut state.buffer);
        if state.listener.is_some() {
            debug!("replacing attached event listener");
        }
        info!(replayed = buffered.len(), "event listener attached");
        for event in buffered {
            listener.deliver(event);
        }
        state.listener = Some(listener);
    }

    /// Attach a channel-backed listener and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attach(Arc::new(ChannelSink::new(tx)));
        rx
    }

    /// Detach the listener. Nothing is flushed; later events buffer again.
    pub fn detach(&self) {
        if self.lock().listener.take().is_some() {
            info!("event listener detached");
        }
    }

    /// Drop every buffered event. Returns how many were dropped.
    pub fn clear_buffer(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.buffer.len();
        state.buffer.clear();
        dropped
    }

    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn listener_state(&self) -> ListenerState {
        if self.lock().listener.is_some() {
            ListenerState::ListenerAttached
        } else {
            ListenerState::NoListener
        }
    }
}
