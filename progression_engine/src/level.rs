// SPDX-License-Identifier: MIT OR Apache-2.0
//! Level calculation from total XP.
//!
//! Pure arithmetic, no side effects. Levels are a flat `level_width` XP
//! wide: level `L` begins at `(L - 1) * width`, so `level = xp / width + 1`.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_LEVEL_WIDTH;

/// The level curve. Flat width per level; no progressive scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCurve {
    width: u64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL_WIDTH)
    }
}

impl LevelCurve {
    /// Creates a curve with the given level width in XP.
    ///
    /// A zero width is coerced to the default; config validation rejects
    /// it before the engine gets here.
    #[must_use]
    pub fn new(width: u64) -> Self {
        Self {
            width: if width == 0 { DEFAULT_LEVEL_WIDTH } else { width },
        }
    }

    /// XP at which `level` begins.
    #[must_use]
    pub const fn level_start(&self, level: u32) -> u64 {
        (level as u64).saturating_sub(1).saturating_mul(self.width)
    }

    /// Level for a given XP total. Never below 1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level_of(&self, xp_total: u64) -> u32 {
        let level = xp_total / self.width + 1;
        if level > u32::MAX as u64 {
            u32::MAX
        } else {
            level as u32
        }
    }

    /// Full intra-level breakdown for a given XP total.
    #[must_use]
    pub const fn progress_of(&self, xp_total: u64) -> LevelProgress {
        let level = self.level_of(xp_total);
        LevelProgress {
            level,
            xp_into_level: xp_total - self.level_start(level),
            xp_to_next_level: self.width,
        }
    }
}

/// Progress within the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level (1-based).
    pub level: u32,
    /// XP earned past the start of the current level.
    pub xp_into_level: u64,
    /// Width of the current level in XP.
    pub xp_to_next_level: u64,
}
