// SPDX-License-Identifier: MIT OR Apache-2.0
//! The progression engine facade.
//!
//! One logical operation per upstream event: under the student's lock the
//! engine appends to the ledger, projects the wallet, advances the streak,
//! folds open challenges, and scans badge unlocks, persisting the
//! aggregate once at the end. Duplicate deliveries are detected at the
//! ledger and reported as an unapplied submission rather than an error.
//!
//! Leaderboard recomputation runs outside the per-student locks: it reads
//! a best-effort snapshot and never blocks writers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use progression_store::{
    ActivityKind, Challenge, GameMode, GameStore, LeaderboardPeriod, LeaderboardRow,
    LeaderboardScope, ScopeMembership, StudentBadge, StudentChallenge, StudentGameProfile,
};

use crate::badge::BadgeEvaluator;
use crate::challenge::ChallengeEvaluator;
use crate::config::{EngineConfig, STREAK_BONUS_INTERVAL, STREAK_BONUS_XP};
use crate::error::{EngineError, Result};
use crate::leaderboard::{Deadline, LeaderboardEngine};
use crate::ledger::{IdempotencyKey, LedgerEntry, XpLedger};
use crate::level::{LevelCurve, LevelProgress};
use crate::locks::StudentLockManager;
use crate::streak::{StreakTracker, StreakUpdate};
use crate::wallet::{WalletProjector, WalletUpdate};

/// An XP-granting event from an upstream activity source.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    /// Student the event belongs to.
    pub student_id: String,
    /// Stable upstream identifier (task id, grading id) used for
    /// deduplication.
    pub source_event_id: String,
    /// XP to grant.
    pub amount: u64,
    /// Opaque source payload carried into the ledger.
    pub context: serde_json::Value,
    /// When the activity happened upstream.
    pub occurred_at: DateTime<Utc>,
    /// Mode used if the event creates the profile.
    pub game_mode: GameMode,
}

impl ActivityEvent {
    /// A task-completion event.
    #[must_use]
    pub fn task(
        student_id: impl Into<String>,
        task_id: impl Into<String>,
        amount: u64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let task_id = task_id.into();
        Self {
            student_id: student_id.into(),
            context: serde_json::json!({ "task_id": task_id }),
            source_event_id: task_id,
            amount,
            occurred_at,
            game_mode: GameMode::Playful,
        }
    }

    /// Overrides the mode used on lazy profile creation.
    #[must_use]
    pub fn with_game_mode(mut self, mode: GameMode) -> Self {
        self.game_mode = mode;
        self
    }
}

/// Everything one submission changed.
#[derive(Debug, Clone)]
pub struct ActivitySubmission {
    /// False if this was a duplicate delivery and nothing changed.
    pub applied: bool,
    /// The profile after the operation.
    pub profile: StudentGameProfile,
    /// Wallet movement, when applied.
    pub wallet: Option<WalletUpdate>,
    /// Streak movement, when applied.
    pub streak: Option<StreakUpdate>,
    /// XP paid as an automatic streak bonus in this submission.
    pub streak_bonus_xp: u64,
    /// Challenges that completed during this submission.
    pub completed_challenges: Vec<StudentChallenge>,
    /// Badges newly earned during this submission.
    pub awarded_badges: Vec<StudentBadge>,
}

/// A student's wallet as exposed to the presentation layer.
#[derive(Debug, Clone)]
pub struct WalletView {
    /// The profile aggregate.
    pub profile: StudentGameProfile,
    /// Intra-level breakdown.
    pub progress: LevelProgress,
}

/// An open challenge joined with the student's progress, if started.
#[derive(Debug, Clone)]
pub struct ChallengeStatus {
    /// The definition.
    pub challenge: Challenge,
    /// The student's instance; `None` until their first qualifying
    /// activity in the window.
    pub state: Option<StudentChallenge>,
}

/// The student progression and leaderboard engine.
pub struct ProgressionEngine<S: GameStore> {
    store: Arc<S>,
    config: EngineConfig,
    projector: WalletProjector,
    locks: StudentLockManager,
}

impl<S: GameStore> ProgressionEngine<S> {
    /// Creates an engine over a store.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let projector = WalletProjector::new(LevelCurve::new(config.level_width));
        Ok(Self {
            store,
            config,
            projector,
            locks: StudentLockManager::new(),
        })
    }

    /// The engine's store handle.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Processes one task-completion (or generic learning) activity.
    ///
    /// Safe to retry with the same `source_event_id`: a duplicate delivery
    /// returns an unapplied submission with the current profile state.
    pub fn submit_activity(&self, event: ActivityEvent) -> Result<ActivitySubmission> {
        let amount = i64::try_from(event.amount)
            .map_err(|e| EngineError::InvalidAmount(e.to_string()))?;

        let _guard = self
            .locks
            .acquire(&event.student_id, self.config.lock_timeout)?;

        let mut profile = self.load_or_create_profile(
            &event.student_id,
            event.game_mode,
            event.occurred_at,
        )?;

        let entry = LedgerEntry {
            student_id: event.student_id.clone(),
            kind: ActivityKind::TaskCompleted,
            amount,
            context: event.context.clone(),
            idempotency_key: Some(IdempotencyKey::derive(
                &event.student_id,
                ActivityKind::TaskCompleted,
                &event.source_event_id,
            )),
            created_at: event.occurred_at,
        };

        match XpLedger::record(self.store.as_ref(), entry) {
            Ok(_) => {},
            Err(EngineError::DuplicateActivity(_)) => {
                return Ok(ActivitySubmission {
                    applied: false,
                    profile,
                    wallet: None,
                    streak: None,
                    streak_bonus_xp: 0,
                    completed_challenges: Vec::new(),
                    awarded_badges: Vec::new(),
                });
            },
            Err(err) => return Err(err),
        }

        let wallet = self
            .projector
            .apply(&mut profile, amount, event.occurred_at);

        let streak =
            StreakTracker::record_activity_day(&mut profile, event.occurred_at.date_naive());
        let streak_bonus_xp = if streak.changed {
            self.maybe_pay_streak_bonus(&mut profile, streak.streak_days, event.occurred_at)?
        } else {
            0
        };

        self.store.upsert_profile(&profile)?;

        let completed_challenges =
            self.fold_open_challenges(&mut profile, &event)?;

        let snapshot = BadgeEvaluator::snapshot(self.store.as_ref(), &profile)?;
        let awarded_badges = BadgeEvaluator::evaluate_unlocks(
            self.store.as_ref(),
            &profile,
            snapshot,
            event.occurred_at,
        )?;

        Ok(ActivitySubmission {
            applied: true,
            profile,
            wallet: Some(wallet),
            streak: Some(streak),
            streak_bonus_xp,
            completed_challenges,
            awarded_badges,
        })
    }

    /// Privileged manual XP award or correction.
    ///
    /// Negative amounts are permitted; if a correction would drive the
    /// wallet below zero it clamps, and the ledger context records both
    /// the requested and the applied delta. Repeated awards are allowed by
    /// design. Privilege enforcement belongs to the caller's auth layer.
    pub fn award_manual(
        &self,
        student_id: &str,
        amount: i64,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<ActivitySubmission> {
        let _guard = self.locks.acquire(student_id, self.config.lock_timeout)?;

        let mut profile =
            self.load_or_create_profile(student_id, GameMode::Playful, occurred_at)?;

        let wallet = self.projector.apply(&mut profile, amount, occurred_at);

        let mut context = serde_json::json!({ "reason": reason, "requested_delta": amount });
        if wallet.clamped {
            context["applied_delta"] = serde_json::json!(wallet.applied_delta);
        }

        let entry = LedgerEntry {
            student_id: student_id.to_string(),
            kind: ActivityKind::ManualAward,
            amount: wallet.applied_delta,
            context,
            idempotency_key: None,
            created_at: occurred_at,
        };
        XpLedger::record(self.store.as_ref(), entry)?;

        self.store.upsert_profile(&profile)?;

        let snapshot = BadgeEvaluator::snapshot(self.store.as_ref(), &profile)?;
        let awarded_badges = BadgeEvaluator::evaluate_unlocks(
            self.store.as_ref(),
            &profile,
            snapshot,
            occurred_at,
        )?;

        Ok(ActivitySubmission {
            applied: true,
            profile,
            wallet: Some(wallet),
            streak: None,
            streak_bonus_xp: 0,
            completed_challenges: Vec::new(),
            awarded_badges,
        })
    }

    /// Current wallet, level, and streak for a student.
    pub fn wallet(&self, student_id: &str) -> Result<Option<WalletView>> {
        Ok(self.store.profile(student_id)?.map(|profile| {
            let progress = self.projector.curve().progress_of(profile.xp_total);
            WalletView { profile, progress }
        }))
    }

    /// Open challenges joined with the student's progress.
    pub fn active_challenges(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChallengeStatus>> {
        let mode = self
            .store
            .profile(student_id)?
            .map_or(GameMode::Playful, |p| p.game_mode);

        let mut statuses = Vec::new();
        for challenge in self.store.open_challenges(now, mode)? {
            let state = self.store.student_challenge(student_id, challenge.id)?;
            statuses.push(ChallengeStatus { challenge, state });
        }
        Ok(statuses)
    }

    /// Badges a student has earned.
    pub fn earned_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>> {
        Ok(self.store.student_badges(student_id)?)
    }

    /// Most recent leaderboard batch for a (scope, period).
    pub fn leaderboard(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
    ) -> Result<Vec<LeaderboardRow>> {
        Ok(self.store.latest_leaderboard(scope, period)?)
    }

    /// Recomputes one leaderboard under the configured deadline.
    pub fn recompute_leaderboard(
        &self,
        scope: &LeaderboardScope,
        period: LeaderboardPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardRow>> {
        LeaderboardEngine::recompute(
            self.store.as_ref(),
            scope,
            period,
            now,
            Deadline::after(self.config.leaderboard_timeout),
        )
    }

    /// Registers roster membership used by scoped leaderboards.
    pub fn set_membership(&self, student_id: &str, membership: ScopeMembership) -> Result<()> {
        Ok(self.store.set_membership(student_id, membership)?)
    }

    fn load_or_create_profile(
        &self,
        student_id: &str,
        mode: GameMode,
        now: DateTime<Utc>,
    ) -> Result<StudentGameProfile> {
        if let Some(profile) = self.store.profile(student_id)? {
            return Ok(profile);
        }
        let profile = StudentGameProfile::new(student_id, mode, now);
        self.store.upsert_profile(&profile)?;
        tracing::debug!(student_id, "profile created on first activity");
        Ok(profile)
    }

    /// Pays the weekly streak bonus when the streak reaches a multiple of
    /// the bonus interval. Keyed per (student, date) so replays of the
    /// same day never pay twice.
    fn maybe_pay_streak_bonus(
        &self,
        profile: &mut StudentGameProfile,
        streak_days: u32,
        occurred_at: DateTime<Utc>,
    ) -> Result<u64> {
        if streak_days == 0 || streak_days % STREAK_BONUS_INTERVAL != 0 {
            return Ok(0);
        }

        let day = occurred_at.date_naive().to_string();
        let entry = LedgerEntry {
            student_id: profile.student_id.clone(),
            kind: ActivityKind::StreakBonus,
            amount: i64::try_from(STREAK_BONUS_XP)
                .map_err(|e| EngineError::InvalidAmount(e.to_string()))?,
            context: serde_json::json!({ "streak_days": streak_days, "date": day }),
            idempotency_key: Some(IdempotencyKey::derive(
                &profile.student_id,
                ActivityKind::StreakBonus,
                &day,
            )),
            created_at: occurred_at,
        };

        match XpLedger::record(self.store.as_ref(), entry) {
            Ok(_) => {
                self.projector.apply(
                    profile,
                    i64::try_from(STREAK_BONUS_XP)
                        .map_err(|e| EngineError::InvalidAmount(e.to_string()))?,
                    occurred_at,
                );
                Ok(STREAK_BONUS_XP)
            },
            Err(EngineError::DuplicateActivity(_)) => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn fold_open_challenges(
        &self,
        profile: &mut StudentGameProfile,
        event: &ActivityEvent,
    ) -> Result<Vec<StudentChallenge>> {
        let mut completed = Vec::new();

        for challenge in self
            .store
            .open_challenges(event.occurred_at, profile.game_mode)?
        {
            let outcome = match ChallengeEvaluator::evaluate(
                self.store.as_ref(),
                &challenge,
                &event.student_id,
                ActivityKind::TaskCompleted,
                event.occurred_at,
            ) {
                Ok(outcome) => outcome,
                // The window closed between the listing and the fold.
                Err(EngineError::ChallengeNotActive(_)) => continue,
                Err(err) => return Err(err),
            };

            if let Some(payout) = outcome.payout {
                self.projector
                    .apply(profile, payout.xp_earned, event.occurred_at);
                self.store.upsert_profile(profile)?;
            }
            if outcome.newly_completed {
                completed.push(outcome.row);
            }
        }

        Ok(completed)
    }
}
