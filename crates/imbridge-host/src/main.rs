// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// imbridge host — drives the bridge over stdin/stdout.
//
// Entry point. Loads config, initialises logging (to stderr; stdout is the
// transport), seeds the in-memory SDK, attaches the event listener and serves
// commands until end of input.

mod services;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use imbridge_core::BridgeConfig;
use imbridge_plugin::Plugin;
use imbridge_sdk::MemorySdk;

use services::config_dir;
use services::transport::{self, LineSink};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = config_dir::config_path();
    let loaded = BridgeConfig::load(&config_path);

    let fallback_filter = loaded
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| BridgeConfig::default().log_filter);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter)),
        )
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, path = %config_path.display(), "config unreadable, using defaults");
            BridgeConfig::default()
        }
    };
    if !config_path.exists() {
        let written = config_dir::ensure_parent(&config_path)
            .map_err(Into::into)
            .and_then(|()| config.persist(&config_path));
        match written {
            Ok(()) => tracing::info!(path = %config_path.display(), "default config written"),
            Err(e) => tracing::warn!(error = %e, "could not write default config"),
        }
    }

    tracing::info!("imbridge host starting");

    let sdk = MemorySdk::new();
    seed_demo(&sdk);
    let plugin = Plugin::new(Arc::new(sdk), config, Handle::current());

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(transport::write_lines(out_rx, tokio::io::stdout()));
    plugin.on_listen(Arc::new(LineSink::new(out_tx.clone())));

    let served = transport::serve(&plugin, BufReader::new(tokio::io::stdin()), &out_tx).await;

    // Let in-flight replies drain before exiting.
    plugin.on_cancel();
    drop(plugin);
    drop(out_tx);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "stdout writer failed"),
        Err(e) => tracing::error!(error = %e, "stdout writer panicked"),
    }

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "host stopped");
            ExitCode::FAILURE
        }
    }
}

/// Give the demo something to act on: two users sharing one conversation.
fn seed_demo(sdk: &MemorySdk) {
    sdk.seed_conversation("demo", &["alice", "bob"]);
    if sdk.seed_message("demo", "bob", "welcome to imbridge").is_none() {
        tracing::warn!("demo conversation could not be seeded");
    }
}
