// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite load score produced by the load evaluator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadScoreError {
    #[error("load score {0} is out of range 0..=100")]
    OutOfRange(u32),
}

/// Load band derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for LoadLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoadLevel::Low => "low",
            LoadLevel::Medium => "medium",
            LoadLevel::High => "high",
        })
    }
}

/// A validated `(score, level)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadScore {
    score: u8,
    level: LoadLevel,
}

impl LoadScore {
    pub fn new(score: u32, level: LoadLevel) -> Result<Self, LoadScoreError> {
        if score > 100 {
            return Err(LoadScoreError::OutOfRange(score));
        }
        Ok(Self {
            score: score as u8,
            level,
        })
    }

    /// Derive the level from thresholds: `score > high` is High,
    /// `score > low` is Medium, anything else Low.
    pub fn from_thresholds(score: u32, low_threshold: u8, high_threshold: u8) -> Self {
        let score = score.min(100) as u8;
        let level = if score > high_threshold {
            LoadLevel::High
        } else if score > low_threshold {
            LoadLevel::Medium
        } else {
            LoadLevel::Low
        };
        Self { score, level }
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn level(&self) -> LoadLevel {
        self.level
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
