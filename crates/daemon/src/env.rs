// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment overrides for the daemon.

use std::path::PathBuf;

/// Config file override, `PACKRAT_CONFIG`.
pub fn config_path_override() -> Option<PathBuf> {
    std::env::var_os("PACKRAT_CONFIG").map(PathBuf::from)
}

/// State directory override, `PACKRAT_STATE_DIR`. Useful in tests and
/// for running several daemons side by side.
pub fn state_dir_override() -> Option<PathBuf> {
    std::env::var_os("PACKRAT_STATE_DIR").map(PathBuf::from)
}
