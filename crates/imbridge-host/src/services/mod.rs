// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — config location and the stdin/stdout transport that
// stands in for a host application's method and event channels.

pub mod config_dir;
pub mod transport;
