// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imbridge plugin — command router, `avIMClient` / `avIMConversation`
// handlers, and the replay-buffered event bridge that forwards SDK
// notifications to the host.  The SDK itself sits behind the traits in
// `imbridge-sdk`; the host-neutral encoding lives in `imbridge-core`.

pub mod client;
pub mod conversation;
pub mod events;
pub mod hooks;
pub mod plugin;
pub mod registry;
pub mod reply;
pub mod router;

pub use events::{ChannelSink, EventBridge, EventSink, ListenerState};
pub use hooks::BridgeEvent;
pub use plugin::Plugin;
pub use registry::{ClientSession, SessionRegistry};
pub use reply::{Outcome, Reply};
pub use router::{MethodCallHandler, Router};
