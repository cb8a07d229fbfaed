// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity types for student progression state.
//!
//! The engine owns mutation of `StudentGameProfile`, creation of
//! `XpActivity`, `StudentChallenge` and `StudentBadge` rows, and
//! leaderboard batch writes. `Challenge` and `Badge` definitions are
//! authored externally and read-only here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Presentation mode for a student's gamification surface.
///
/// Stored on the profile and used to filter challenge/badge definitions,
/// but carries no mechanical meaning inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Colorful, younger-audience presentation.
    Playful,
    /// Understated presentation for older students.
    Prestige,
}

impl GameMode {
    /// Returns the display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Playful => "Playful",
            Self::Prestige => "Prestige",
        }
    }
}

/// Per-student aggregate: the single source of derived wallet state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentGameProfile {
    /// Owning student.
    pub student_id: String,
    /// Presentation mode.
    pub game_mode: GameMode,
    /// Total XP, derived from the ledger. Never negative.
    pub xp_total: u64,
    /// Cached level projection; always equals `level_of(xp_total)`.
    pub level: u32,
    /// Consecutive calendar days with at least one qualifying activity.
    pub streak_days: u32,
    /// Calendar date of the most recent qualifying activity.
    pub last_activity_date: Option<NaiveDate>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StudentGameProfile {
    /// Creates a fresh profile for a student's first XP event.
    #[must_use]
    pub fn new(student_id: impl Into<String>, game_mode: GameMode, now: DateTime<Utc>) -> Self {
        Self {
            student_id: student_id.into(),
            game_mode,
            xp_total: 0,
            level: 1,
            streak_days: 0,
            last_activity_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of XP-granting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A graded task was completed upstream.
    TaskCompleted,
    /// A challenge paid out its one-time reward.
    ChallengeCompleted,
    /// Automatic bonus for sustaining a streak.
    StreakBonus,
    /// A privileged human awarded (or corrected) XP.
    ManualAward,
}

impl ActivityKind {
    /// Kinds whose re-delivery must be deduplicated by idempotency key.
    #[must_use]
    pub const fn requires_idempotency(&self) -> bool {
        matches!(self, Self::TaskCompleted | Self::ChallengeCompleted)
    }

    /// Returns the display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::TaskCompleted => "Task Completed",
            Self::ChallengeCompleted => "Challenge Completed",
            Self::StreakBonus => "Streak Bonus",
            Self::ManualAward => "Manual Award",
        }
    }
}

/// One immutable row of the append-only XP ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpActivity {
    /// Ledger row id.
    pub id: u64,
    /// Owning student.
    pub student_id: String,
    /// What kind of event granted this XP.
    pub kind: ActivityKind,
    /// XP delta. Negative only for manual corrections.
    pub xp_earned: i64,
    /// Opaque payload identifying the source event (task id, reason, ...).
    pub context: serde_json::Value,
    /// Deduplication key; `None` for kinds that allow repeats.
    pub idempotency_key: Option<String>,
    /// Append timestamp.
    pub created_at: DateTime<Utc>,
}

/// Time-box category of a challenge definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// One-day window.
    Daily,
    /// One-week window.
    Weekly,
    /// Arbitrary window authored per event.
    Special,
}

/// Structured completion predicate: per-kind target counts.
///
/// A challenge is complete when every non-zero target is met by the
/// matching counter in [`ChallengeProgress`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCriteria {
    /// Required `TaskCompleted` events inside the window.
    pub tasks_completed: u32,
    /// Required distinct active days inside the window.
    pub active_days: u32,
}

impl CompletionCriteria {
    /// Criteria satisfied by completing `n` tasks.
    #[must_use]
    pub const fn tasks(n: u32) -> Self {
        Self {
            tasks_completed: n,
            active_days: 0,
        }
    }

    /// True if the criteria require nothing (vacuously complete).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tasks_completed == 0 && self.active_days == 0
    }
}

/// Counter state mirroring the shape of [`CompletionCriteria`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    /// Tasks completed so far inside the window.
    pub tasks_completed: u32,
    /// Distinct active days so far inside the window.
    pub active_days: u32,
    /// Last calendar day counted toward `active_days`.
    pub last_counted_day: Option<NaiveDate>,
}

impl ChallengeProgress {
    /// True if this progress satisfies `criteria`.
    #[must_use]
    pub const fn satisfies(&self, criteria: &CompletionCriteria) -> bool {
        self.tasks_completed >= criteria.tasks_completed && self.active_days >= criteria.active_days
    }
}

/// Externally authored challenge definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Definition id.
    pub id: u64,
    /// Time-box category.
    pub kind: ChallengeKind,
    /// Display title.
    pub title: String,
    /// Display description.
    pub description: String,
    /// One-time XP payout on completion.
    pub xp_reward: u64,
    /// Completion predicate.
    pub criteria: CompletionCriteria,
    /// Start of the validity window (inclusive).
    pub valid_from: DateTime<Utc>,
    /// End of the validity window (exclusive).
    pub valid_until: DateTime<Utc>,
    /// Authoring kill-switch.
    pub is_active: bool,
    /// Which presentation mode the challenge targets.
    pub game_mode: GameMode,
}

impl Challenge {
    /// True if `at` falls inside the half-open validity window and the
    /// definition has not been deactivated.
    #[must_use]
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && at >= self.valid_from && at < self.valid_until
    }
}

/// Join row between a student and a challenge definition.
///
/// At most one row per (student, challenge). `is_completed` transitions
/// false to true exactly once and is never reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentChallenge {
    /// Row id.
    pub id: u64,
    /// Owning student.
    pub student_id: String,
    /// Referenced challenge definition.
    pub challenge_id: u64,
    /// Counter state.
    pub progress: ChallengeProgress,
    /// Terminal completion flag.
    pub is_completed: bool,
    /// When the challenge completed, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// XP paid out on completion (0 until then).
    pub xp_earned: u64,
}

/// Badge rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    /// Common badges, easy to unlock.
    Bronze,
    /// Uncommon badges requiring some effort.
    Silver,
    /// Rare badges for dedicated students.
    Gold,
    /// Legendary badges for mastery.
    Platinum,
}

impl BadgeTier {
    /// Returns the display name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
        }
    }
}

/// Structured unlock predicate over a student's aggregate state.
///
/// All set thresholds must hold (conjunction); unset thresholds are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCriteria {
    /// Minimum `xp_total`.
    pub min_xp: Option<u64>,
    /// Minimum level.
    pub min_level: Option<u32>,
    /// Minimum streak length in days.
    pub min_streak_days: Option<u32>,
    /// Minimum count of badges already earned.
    pub min_badges: Option<u32>,
    /// Minimum count of completed challenges.
    pub min_challenges_completed: Option<u32>,
}

/// Externally authored badge definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    /// Definition id.
    pub id: u64,
    /// Stable authoring key, e.g. `"first_steps"`.
    pub badge_key: String,
    /// Rarity tier.
    pub tier: BadgeTier,
    /// Unlock predicate.
    pub criteria: UnlockCriteria,
    /// XP floor duplicated out of the criteria for cheap pre-filtering.
    pub xp_requirement: u64,
    /// Which presentation mode the badge targets.
    pub game_mode: GameMode,
}

/// A badge earned by a student. Immutable once created; never revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentBadge {
    /// Row id.
    pub id: u64,
    /// Owning student.
    pub student_id: String,
    /// Referenced badge definition.
    pub badge_id: u64,
    /// When the badge was earned.
    pub earned_at: DateTime<Utc>,
    /// Whether the student pinned this badge on their profile.
    pub is_showcased: bool,
}

/// Population boundary for a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "scope_id")]
pub enum LeaderboardScope {
    /// One class roster.
    Class(String),
    /// One niveau (level-group) roster.
    Niveau(String),
    /// All students.
    Global,
}

impl LeaderboardScope {
    /// The nullable scope id as stored (None only for global).
    #[must_use]
    pub fn scope_id(&self) -> Option<&str> {
        match self {
            Self::Class(id) | Self::Niveau(id) => Some(id),
            Self::Global => None,
        }
    }
}

/// Time window a leaderboard score is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    /// Current calendar day.
    Daily,
    /// Current ISO week (Monday start).
    Weekly,
    /// Current calendar month.
    Monthly,
    /// Since the beginning of time.
    AllTime,
}

/// One row of a computed leaderboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// Row id.
    pub id: u64,
    /// Ranked student.
    pub student_id: String,
    /// Scope the batch was computed for.
    pub scope: LeaderboardScope,
    /// Period the score covers.
    pub period: LeaderboardPeriod,
    /// Score copied at computation time.
    pub xp_points: u64,
    /// 1-based rank; contiguous within a batch, never duplicated.
    pub rank: u32,
    /// Shared batch timestamp.
    pub calculated_at: DateTime<Utc>,
}

/// Roster membership registered by the host application so scoped
/// leaderboards can resolve their population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMembership {
    /// Class the student belongs to, if any.
    pub class_id: Option<String>,
    /// Niveau group the student belongs to, if any.
    pub niveau: Option<String>,
}
