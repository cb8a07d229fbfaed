// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concurrent in-memory [`GameStore`] implementation.
//!
//! Backs all entities with sharded maps so different students never
//! contend. Unique constraints are enforced with first-insert-wins map
//! entries, the same guarantee a relational backend provides with unique
//! indexes. Leaderboard batches are replaced as whole values, so a reader
//! never observes a partially written batch.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::entity::{
    Badge, Challenge, GameMode, LeaderboardPeriod, LeaderboardRow, LeaderboardScope,
    ScopeMembership, StudentBadge, StudentChallenge, StudentGameProfile, XpActivity,
};
use crate::store::{GameStore, Result, StoreError};

/// In-memory game store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    profiles: DashMap<String, StudentGameProfile>,
    activities: DashMap<u64, XpActivity>,
    idempotency_index: DashMap<String, u64>,
    challenges: DashMap<u64, Challenge>,
    student_challenges: DashMap<(String, u64), StudentChallenge>,
    badges: DashMap<u64, Badge>,
    student_badges: DashMap<(String, u64), StudentBadge>,
    memberships: DashMap<String, ScopeMembership>,
    leaderboards: DashMap<(LeaderboardScope, LeaderboardPeriod), Vec<LeaderboardRow>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Seeds a challenge definition (authoring-side operation).
    pub fn insert_challenge(&self, challenge: Challenge) {
        self.challenges.insert(challenge.id, challenge);
    }

    /// Seeds a badge definition (authoring-side operation).
    pub fn insert_badge(&self, badge: Badge) {
        self.badges.insert(badge.id, badge);
    }

    /// Number of ledger rows (test/diagnostic helper).
    #[must_use]
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }
}

impl GameStore for MemoryStore {
    fn profile(&self, student_id: &str) -> Result<Option<StudentGameProfile>> {
        Ok(self.profiles.get(student_id).map(|p| p.value().clone()))
    }

    fn upsert_profile(&self, profile: &StudentGameProfile) -> Result<()> {
        self.profiles
            .insert(profile.student_id.clone(), profile.clone());
        Ok(())
    }

    fn append_activity(&self, mut activity: XpActivity) -> Result<XpActivity> {
        let id = self.alloc_id();

        if let Some(key) = activity.idempotency_key.clone() {
            match self.idempotency_index.entry(key) {
                Entry::Occupied(occupied) => {
                    return Err(StoreError::DuplicateKey(occupied.key().clone()));
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                },
            }
        }

        activity.id = id;
        self.activities.insert(id, activity.clone());
        Ok(activity)
    }

    fn activities_for(&self, student_id: &str) -> Result<Vec<XpActivity>> {
        let mut rows: Vec<XpActivity> = self
            .activities
            .iter()
            .filter(|entry| entry.student_id == student_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    fn activities_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<XpActivity>> {
        let mut rows: Vec<XpActivity> = self
            .activities
            .iter()
            .filter(|entry| entry.created_at >= from && entry.created_at < until)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|a| a.id);
        Ok(rows)
    }

    fn challenge(&self, challenge_id: u64) -> Result<Option<Challenge>> {
        Ok(self.challenges.get(&challenge_id).map(|c| c.value().clone()))
    }

    fn open_challenges(&self, now: DateTime<Utc>, mode: GameMode) -> Result<Vec<Challenge>> {
        let mut rows: Vec<Challenge> = self
            .challenges
            .iter()
            .filter(|entry| entry.game_mode == mode && entry.is_open_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    fn student_challenge(
        &self,
        student_id: &str,
        challenge_id: u64,
    ) -> Result<Option<StudentChallenge>> {
        Ok(self
            .student_challenges
            .get(&(student_id.to_string(), challenge_id))
            .map(|row| row.value().clone()))
    }

    fn upsert_student_challenge(&self, mut row: StudentChallenge) -> Result<StudentChallenge> {
        if row.id == 0 {
            row.id = self.alloc_id();
        }
        self.student_challenges
            .insert((row.student_id.clone(), row.challenge_id), row.clone());
        Ok(row)
    }

    fn completed_challenge_count(&self, student_id: &str) -> Result<u32> {
        let count = self
            .student_challenges
            .iter()
            .filter(|entry| entry.student_id == student_id && entry.is_completed)
            .count();
        u32::try_from(count).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn badges(&self, mode: GameMode) -> Result<Vec<Badge>> {
        let mut rows: Vec<Badge> = self
            .badges
            .iter()
            .filter(|entry| entry.game_mode == mode)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|b| b.id);
        Ok(rows)
    }

    fn student_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>> {
        let mut rows: Vec<StudentBadge> = self
            .student_badges
            .iter()
            .filter(|entry| entry.student_id == student_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|b| b.id);
        Ok(rows)
    }

    fn insert_student_badge(&self, mut badge: StudentBadge) -> Result<StudentBadge> {
        let key = (badge.student_id.clone(), badge.badge_id);
        match self.student_badges.entry(key) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(format!(
                "badge:{}:{}",
                badge.student_id, badge.badge_id
            ))),
            Entry::Vacant(vacant) => {
                badge.id = self.alloc_id();
                vacant.insert(badge.clone());
                Ok(badge)
            },
        }
    }

    fn membership(&self, student_id: &str) -> Result<Option<ScopeMembership>> {
        Ok(self.memberships.get(student_id).map(|m| m.value().clone()))
    }

    fn set_membership(&self, student_id: &str, membership: ScopeMembership) -> Result<()> {
        self.memberships.insert(student_id.to_string(), membership);
        Ok(())
    }

    fn profiles(&self) -> Result<Vec<StudentGameProfile>> {
        let mut rows: Vec<StudentGameProfile> =
            self.profiles.iter().map(|entry| entry.value().clone()).collect();
        rows.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        Ok(rows)
    }

    fn replace_leaderboard_batch(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
        rows: Vec<LeaderboardRow>,
    ) -> Result<()> {
        self.leaderboards.insert((scope.clone(), period), rows);
        Ok(())
    }

    fn latest_leaderboard(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
    ) -> Result<Vec<LeaderboardRow>> {
        Ok(self
            .leaderboards
            .get(&(scope.clone(), period))
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::entity::ActivityKind;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn activity(student: &str, key: Option<&str>, xp: i64, created: DateTime<Utc>) -> XpActivity {
        XpActivity {
            id: 0,
            student_id: student.to_string(),
            kind: ActivityKind::TaskCompleted,
            xp_earned: xp,
            context: serde_json::json!({}),
            idempotency_key: key.map(str::to_string),
            created_at: created,
        }
    }

    #[test]
    fn test_append_allocates_ids() {
        let store = MemoryStore::new();
        let a = store
            .append_activity(activity("s1", None, 10, at(2024, 3, 1)))
            .unwrap();
        let b = store
            .append_activity(activity("s1", None, 10, at(2024, 3, 1)))
            .unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_append_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store
            .append_activity(activity("s1", Some("xp:s1:task:7"), 10, at(2024, 3, 1)))
            .unwrap();
        let err = store
            .append_activity(activity("s1", Some("xp:s1:task:7"), 10, at(2024, 3, 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(store.activity_count(), 1);
    }

    #[test]
    fn test_activities_for_sorted_by_insertion() {
        let store = MemoryStore::new();
        store
            .append_activity(activity("s1", None, 1, at(2024, 3, 1)))
            .unwrap();
        store
            .append_activity(activity("s2", None, 2, at(2024, 3, 1)))
            .unwrap();
        store
            .append_activity(activity("s1", None, 3, at(2024, 3, 2)))
            .unwrap();

        let rows = store.activities_for("s1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].xp_earned, 1);
        assert_eq!(rows[1].xp_earned, 3);
    }

    #[test]
    fn test_activities_between_window_half_open() {
        let store = MemoryStore::new();
        store
            .append_activity(activity("s1", None, 1, at(2024, 3, 1)))
            .unwrap();
        store
            .append_activity(activity("s1", None, 2, at(2024, 3, 5)))
            .unwrap();

        let rows = store
            .activities_between(at(2024, 3, 1), at(2024, 3, 5))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].xp_earned, 1);
    }

    #[test]
    fn test_student_badge_unique_constraint() {
        let store = MemoryStore::new();
        let badge = StudentBadge {
            id: 0,
            student_id: "s1".to_string(),
            badge_id: 4,
            earned_at: at(2024, 3, 1),
            is_showcased: false,
        };
        store.insert_student_badge(badge.clone()).unwrap();
        let err = store.insert_student_badge(badge).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(store.student_badges("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_student_challenge_allocates_once() {
        let store = MemoryStore::new();
        let row = StudentChallenge {
            id: 0,
            student_id: "s1".to_string(),
            challenge_id: 2,
            progress: crate::entity::ChallengeProgress::default(),
            is_completed: false,
            completed_at: None,
            xp_earned: 0,
        };
        let stored = store.upsert_student_challenge(row).unwrap();
        assert_ne!(stored.id, 0);

        let mut updated = stored.clone();
        updated.is_completed = true;
        let stored_again = store.upsert_student_challenge(updated).unwrap();
        assert_eq!(stored_again.id, stored.id);
        assert_eq!(store.completed_challenge_count("s1").unwrap(), 1);
    }

    #[test]
    fn test_leaderboard_batch_replace() {
        let store = MemoryStore::new();
        let scope = LeaderboardScope::Global;
        let row = |student: &str, rank: u32| LeaderboardRow {
            id: 0,
            student_id: student.to_string(),
            scope: scope.clone(),
            period: LeaderboardPeriod::AllTime,
            xp_points: 100,
            rank,
            calculated_at: at(2024, 3, 1),
        };

        store
            .replace_leaderboard_batch(&scope, LeaderboardPeriod::AllTime, vec![row("a", 1)])
            .unwrap();
        store
            .replace_leaderboard_batch(
                &scope,
                LeaderboardPeriod::AllTime,
                vec![row("b", 1), row("a", 2)],
            )
            .unwrap();

        let latest = store
            .latest_leaderboard(&scope, LeaderboardPeriod::AllTime)
            .unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].student_id, "b");
    }

    #[test]
    fn test_membership_round_trip() {
        let store = MemoryStore::new();
        assert!(store.membership("s1").unwrap().is_none());
        store
            .set_membership(
                "s1",
                ScopeMembership {
                    class_id: Some("7b".to_string()),
                    niveau: Some("n3".to_string()),
                },
            )
            .unwrap();
        let m = store.membership("s1").unwrap().unwrap();
        assert_eq!(m.class_id.as_deref(), Some("7b"));
    }
}
