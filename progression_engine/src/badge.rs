// SPDX-License-Identifier: MIT OR Apache-2.0
//! Badge unlock evaluation.
//!
//! Runs after any update that changes a value referenced by unlock
//! criteria. Badges are a permanent record of a past achievement: once
//! earned they are never retracted, even if the state later stops
//! satisfying the criteria. The (student, badge) unique constraint in the
//! store makes concurrent evaluation award at most once.

use chrono::{DateTime, Utc};

use progression_store::{
    GameStore, StoreError, StudentBadge, StudentGameProfile, UnlockCriteria,
};

use crate::error::Result;

/// Aggregate state badge criteria are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSnapshot {
    /// Total XP.
    pub xp_total: u64,
    /// Current level.
    pub level: u32,
    /// Current streak length in days.
    pub streak_days: u32,
    /// Badges already earned.
    pub badge_count: u32,
    /// Challenges completed.
    pub challenges_completed: u32,
}

impl AggregateSnapshot {
    /// True if every set threshold in `criteria` holds.
    #[must_use]
    pub fn meets(&self, criteria: &UnlockCriteria) -> bool {
        criteria.min_xp.is_none_or(|min| self.xp_total >= min)
            && criteria.min_level.is_none_or(|min| self.level >= min)
            && criteria
                .min_streak_days
                .is_none_or(|min| self.streak_days >= min)
            && criteria.min_badges.is_none_or(|min| self.badge_count >= min)
            && criteria
                .min_challenges_completed
                .is_none_or(|min| self.challenges_completed >= min)
    }
}

/// Evaluates unlock criteria and issues badges at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadgeEvaluator;

impl BadgeEvaluator {
    /// Builds the snapshot for a student from the store.
    pub fn snapshot<S: GameStore>(
        store: &S,
        profile: &StudentGameProfile,
    ) -> Result<AggregateSnapshot> {
        let badge_count = u32::try_from(store.student_badges(&profile.student_id)?.len())
            .unwrap_or(u32::MAX);
        let challenges_completed = store.completed_challenge_count(&profile.student_id)?;

        Ok(AggregateSnapshot {
            xp_total: profile.xp_total,
            level: profile.level,
            streak_days: profile.streak_days,
            badge_count,
            challenges_completed,
        })
    }

    /// Awards every unearned badge whose criteria the snapshot satisfies.
    ///
    /// Returns the badges newly awarded in this call, possibly empty.
    /// Badges earned during the call count toward `min_badges` thresholds
    /// of later definitions in the same scan.
    pub fn evaluate_unlocks<S: GameStore>(
        store: &S,
        profile: &StudentGameProfile,
        mut snapshot: AggregateSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<StudentBadge>> {
        let definitions = store.badges(profile.game_mode)?;
        let owned: Vec<u64> = store
            .student_badges(&profile.student_id)?
            .iter()
            .map(|b| b.badge_id)
            .collect();

        let mut awarded = Vec::new();

        for badge in definitions {
            if owned.contains(&badge.id) {
                continue;
            }
            if snapshot.xp_total < badge.xp_requirement {
                continue;
            }
            if !snapshot.meets(&badge.criteria) {
                continue;
            }

            let row = StudentBadge {
                id: 0,
                student_id: profile.student_id.clone(),
                badge_id: badge.id,
                earned_at: now,
                is_showcased: false,
            };

            match store.insert_student_badge(row) {
                Ok(inserted) => {
                    tracing::info!(
                        student_id = %profile.student_id,
                        badge_key = %badge.badge_key,
                        tier = ?badge.tier,
                        "badge unlocked"
                    );
                    snapshot.badge_count = snapshot.badge_count.saturating_add(1);
                    awarded.push(inserted);
                },
                // Concurrent evaluation got there first.
                Err(StoreError::DuplicateKey(key)) => {
                    tracing::debug!(key = %key, "badge already earned");
                },
                Err(err) => return Err(err.into()),
            }
        }

        Ok(awarded)
    }
}
