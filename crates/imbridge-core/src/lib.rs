// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imbridge — Core types, errors, configuration and the host-neutral
// translation layer shared across all crates.

pub mod config;
pub mod error;
pub mod translate;
pub mod types;

pub use config::BridgeConfig;
pub use error::{BridgeError, ChannelError, SdkException};
pub use types::*;
