// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file location.

use std::ffi::OsString;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Path of the bridge config file.
///
/// `IMBRIDGE_CONFIG` wins; otherwise `$XDG_CONFIG_HOME/imbridge/config.json`,
/// falling back to `$HOME/.config`.
pub fn config_path() -> PathBuf {
    resolve(
        std::env::var_os("IMBRIDGE_CONFIG"),
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

/// Create the directory that holds `path`, if any.
pub fn ensure_parent(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn resolve(explicit: Option<OsString>, xdg: Option<OsString>, home: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    let base = match (xdg.filter(|p| !p.is_empty()), home) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".config"),
        // Last resort
        (None, None) => std::env::temp_dir(),
    };
    base.join("imbridge").join(CONFIG_FILE)
}
