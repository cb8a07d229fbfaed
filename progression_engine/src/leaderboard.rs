// SPDX-License-Identifier: MIT OR Apache-2.0
//! Leaderboard recomputation.
//!
//! Rankings are computed snapshots, not live views: each recomputation
//! writes a full batch sharing one `calculated_at`, replacing the previous
//! batch atomically so readers never see a half-written ranking and
//! historical pagination stays stable between recomputations.
//!
//! Ties never share a rank: scores sort descending and ties break on
//! ascending student id, which also makes recomputation idempotent for
//! unchanged input.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

use progression_store::{
    GameStore, LeaderboardPeriod, LeaderboardRow, LeaderboardScope, StudentGameProfile,
};

use crate::error::{EngineError, Result};

/// Monotonic deadline for bounding a recomputation.
///
/// Uses `Instant` so wall-clock adjustments cannot shorten or extend the
/// budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    deadline: Option<Instant>,
}

impl Deadline {
    /// Creates a deadline expiring after `timeout`.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Creates a deadline that never expires.
    #[must_use]
    pub const fn never() -> Self {
        Self { deadline: None }
    }

    /// Returns true if the deadline has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::never()
    }
}

/// Half-open UTC time window covered by a period, anchored at `now`.
#[must_use]
pub fn period_window(
    period: LeaderboardPeriod,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let today = now.date_naive();
    let (start, end) = match period {
        LeaderboardPeriod::AllTime => return None,
        LeaderboardPeriod::Daily => (today, today.checked_add_days(Days::new(1))?),
        LeaderboardPeriod::Weekly => {
            let monday = today.week(Weekday::Mon).first_day();
            (monday, monday.checked_add_days(Days::new(7))?)
        },
        LeaderboardPeriod::Monthly => {
            let first = today.with_day(1)?;
            let next = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
            };
            (first, next)
        },
    };
    Some((
        start.and_hms_opt(0, 0, 0)?.and_utc(),
        end.and_hms_opt(0, 0, 0)?.and_utc(),
    ))
}

/// Recomputes ranked standings per (scope, period).
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaderboardEngine;

impl LeaderboardEngine {
    /// Recomputes one leaderboard and atomically replaces its latest batch.
    ///
    /// Honors `deadline`: on expiry the computation aborts with
    /// [`EngineError::Timeout`] and no batch is written.
    pub fn recompute<S: GameStore>(
        store: &S,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
        now: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<Vec<LeaderboardRow>> {
        let population = Self::population(store, scope)?;

        if deadline.is_expired() {
            return Err(EngineError::Timeout("leaderboard population scan".into()));
        }

        let mut scored: Vec<(String, u64)> = match period_window(period, now) {
            None => population
                .iter()
                .map(|p| (p.student_id.clone(), p.xp_total))
                .collect(),
            Some((from, until)) => {
                let mut sums: HashMap<String, i64> = HashMap::new();
                for activity in store.activities_between(from, until)? {
                    *sums.entry(activity.student_id.clone()).or_insert(0) += activity.xp_earned;
                }
                population
                    .iter()
                    .map(|p| {
                        let sum = sums.get(&p.student_id).copied().unwrap_or(0);
                        (p.student_id.clone(), u64::try_from(sum.max(0)).unwrap_or(0))
                    })
                    .collect()
            },
        };

        if deadline.is_expired() {
            return Err(EngineError::Timeout("leaderboard scoring".into()));
        }

        // Descending score, ties broken by ascending student id for a
        // total order.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let rows: Vec<LeaderboardRow> = scored
            .into_iter()
            .enumerate()
            .map(|(idx, (student_id, xp_points))| LeaderboardRow {
                id: 0,
                student_id,
                scope: scope.clone(),
                period,
                xp_points,
                rank: u32::try_from(idx).unwrap_or(u32::MAX).saturating_add(1),
                calculated_at: now,
            })
            .collect();

        if deadline.is_expired() {
            return Err(EngineError::Timeout("leaderboard batch write".into()));
        }

        store.replace_leaderboard_batch(scope, period, rows.clone())?;

        tracing::info!(
            scope = ?scope,
            period = ?period,
            students = rows.len(),
            "leaderboard recomputed"
        );

        Ok(rows)
    }

    fn population<S: GameStore>(
        store: &S,
        scope: &LeaderboardScope,
    ) -> Result<Vec<StudentGameProfile>> {
        let all = store.profiles()?;
        match scope {
            LeaderboardScope::Global => Ok(all),
            LeaderboardScope::Class(class_id) => {
                let mut kept = Vec::new();
                for profile in all {
                    let member = store
                        .membership(&profile.student_id)?
                        .is_some_and(|m| m.class_id.as_deref() == Some(class_id));
                    if member {
                        kept.push(profile);
                    }
                }
                Ok(kept)
            },
            LeaderboardScope::Niveau(niveau) => {
                let mut kept = Vec::new();
                for profile in all {
                    let member = store
                        .membership(&profile.student_id)?
                        .is_some_and(|m| m.niveau.as_deref() == Some(niveau));
                    if member {
                        kept.push(profile);
                    }
                }
                Ok(kept)
            },
        }
    }
}
