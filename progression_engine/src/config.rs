// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration.

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Default XP width of one level.
pub const DEFAULT_LEVEL_WIDTH: u64 = 100;
/// Default per-student lock acquisition timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for one leaderboard recomputation.
pub const DEFAULT_LEADERBOARD_TIMEOUT: Duration = Duration::from_secs(30);
/// Streak length granting a bonus each time it is reached again.
pub const STREAK_BONUS_INTERVAL: u32 = 7;
/// XP paid out per streak bonus.
pub const STREAK_BONUS_XP: u64 = 50;

/// Tunables for the progression engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// XP required to advance one level. Flat across all levels.
    pub level_width: u64,
    /// How long to wait for a student's serialization lock before giving
    /// up with a concurrency conflict.
    pub lock_timeout: Duration,
    /// Deadline for a single leaderboard recomputation.
    pub leaderboard_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level_width: DEFAULT_LEVEL_WIDTH,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            leaderboard_timeout: DEFAULT_LEADERBOARD_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.level_width == 0 {
            return Err(EngineError::InvalidAmount(
                "level_width must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
