// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! imbridge — Messaging SDK seam.
//!
//! The bridge drives the messaging SDK exclusively through the traits in
//! [`traits`]: `ImSdk` for clients and the process-wide message hook,
//! `ImClient` / `ImConversation` for the async calls, and the delegate traits
//! the SDK calls back into.  Native builds wrap the platform SDK behind these
//! traits; desktop/CI builds and tests use [`memory::MemorySdk`].

pub mod memory;
pub mod traits;

pub use memory::{MemorySdk, SdkOp};
pub use traits::{
    ClientEventHandler, ConversationEventHandler, ImClient, ImConversation, ImSdk,
    MessageHandler, SdkResult,
};
