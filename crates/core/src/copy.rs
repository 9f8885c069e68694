// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copy outcome reported on every completion event.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyResult {
    /// File landed in the work directory, or was already indexed.
    Success,
    /// I/O failure; the owning service retries on a later pass.
    Fail,
    /// Cancelled mid-stream; partial destination may remain.
    Cancel,
    /// Not attempted: storage critical or insufficient headroom.
    Skipped,
}

impl std::fmt::Display for CopyResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CopyResult::Success => "success",
            CopyResult::Fail => "fail",
            CopyResult::Cancel => "cancel",
            CopyResult::Skipped => "skipped",
        })
    }
}
