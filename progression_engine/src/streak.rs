// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consecutive-day streak tracking.
//!
//! Operates on caller-supplied calendar dates, never wall-clock "now", so
//! backfilled and batched events stay deterministic. Out-of-order dates
//! (earlier than the recorded last activity) are silently ignored: streaks
//! only advance forward in time.

use chrono::NaiveDate;

use progression_store::StudentGameProfile;

/// Outcome of folding one activity day into a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    /// Streak length after the update.
    pub streak_days: u32,
    /// True if the streak advanced or reset (same-day and out-of-order
    /// events leave it untouched).
    pub changed: bool,
}

/// Maintains `streak_days` and `last_activity_date` on the profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreakTracker;

impl StreakTracker {
    /// Records one qualifying activity on `date`.
    pub fn record_activity_day(
        profile: &mut StudentGameProfile,
        date: NaiveDate,
    ) -> StreakUpdate {
        let update = match profile.last_activity_date {
            // Multiple activities on one day never inflate the streak.
            Some(last) if date == last => StreakUpdate {
                streak_days: profile.streak_days,
                changed: false,
            },
            // Out-of-order delivery: a no-op, not an error.
            Some(last) if date < last => StreakUpdate {
                streak_days: profile.streak_days,
                changed: false,
            },
            Some(last) if last.succ_opt() == Some(date) => StreakUpdate {
                streak_days: profile.streak_days + 1,
                changed: true,
            },
            // Gap of two or more days, or first activity ever.
            _ => StreakUpdate {
                streak_days: 1,
                changed: true,
            },
        };

        if update.changed {
            profile.streak_days = update.streak_days;
            profile.last_activity_date = Some(date);
        }

        update
    }
}
