// SPDX-License-Identifier: MIT OR Apache-2.0
//! The data-access contract the engine is written against.
//!
//! A production deployment backs this with a relational store; tests and
//! embedded use go through [`MemoryStore`](crate::MemoryStore). The engine
//! relies on the store for real unique constraints (idempotency keys,
//! (student, challenge) and (student, badge) pairs) and for atomic
//! leaderboard batch replacement.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::{
    Badge, Challenge, GameMode, LeaderboardPeriod, LeaderboardRow, LeaderboardScope,
    ScopeMembership, StudentBadge, StudentChallenge, StudentGameProfile, XpActivity,
};

/// Store error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend failed or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Atomic read/write access to progression entities.
///
/// Implementations must provide at least read-committed isolation and
/// enforce the documented unique constraints at the storage layer, not in
/// application code.
pub trait GameStore: Send + Sync {
    /// Fetches a student's profile, if one exists.
    fn profile(&self, student_id: &str) -> Result<Option<StudentGameProfile>>;

    /// Inserts or replaces a student's profile.
    fn upsert_profile(&self, profile: &StudentGameProfile) -> Result<()>;

    /// Appends a ledger entry, allocating its id.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the entry carries an
    /// idempotency key that already exists.
    fn append_activity(&self, activity: XpActivity) -> Result<XpActivity>;

    /// All ledger entries for a student, oldest first.
    fn activities_for(&self, student_id: &str) -> Result<Vec<XpActivity>>;

    /// All ledger entries with `from <= created_at < until`.
    fn activities_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<XpActivity>>;

    /// Fetches one challenge definition.
    fn challenge(&self, challenge_id: u64) -> Result<Option<Challenge>>;

    /// Challenge definitions open at `now` for the given mode.
    fn open_challenges(&self, now: DateTime<Utc>, mode: GameMode) -> Result<Vec<Challenge>>;

    /// Fetches a student's instance of a challenge, if started.
    fn student_challenge(
        &self,
        student_id: &str,
        challenge_id: u64,
    ) -> Result<Option<StudentChallenge>>;

    /// Inserts or replaces a student-challenge row.
    ///
    /// New rows get an allocated id; at most one row may exist per
    /// (student, challenge) pair.
    fn upsert_student_challenge(&self, row: StudentChallenge) -> Result<StudentChallenge>;

    /// Number of challenges the student has completed.
    fn completed_challenge_count(&self, student_id: &str) -> Result<u32>;

    /// Badge definitions for the given mode.
    fn badges(&self, mode: GameMode) -> Result<Vec<Badge>>;

    /// Badges a student has earned, oldest first.
    fn student_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>>;

    /// Inserts an earned badge, allocating its id.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the student already has
    /// the badge; the (student, badge) pair is unique-constrained.
    fn insert_student_badge(&self, badge: StudentBadge) -> Result<StudentBadge>;

    /// Roster membership for a student, if registered.
    fn membership(&self, student_id: &str) -> Result<Option<ScopeMembership>>;

    /// Registers roster membership for a student.
    fn set_membership(&self, student_id: &str, membership: ScopeMembership) -> Result<()>;

    /// All profiles in the store.
    fn profiles(&self) -> Result<Vec<StudentGameProfile>>;

    /// Atomically replaces the latest batch for the batch's (scope, period).
    ///
    /// Readers see either the previous complete batch or the new complete
    /// batch, never a mix.
    fn replace_leaderboard_batch(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
        rows: Vec<LeaderboardRow>,
    ) -> Result<()>;

    /// The most recent complete batch for a (scope, period), if any.
    fn latest_leaderboard(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
    ) -> Result<Vec<LeaderboardRow>>;
}
