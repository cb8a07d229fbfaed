// SPDX-License-Identifier: MIT OR Apache-2.0
//! Challenge lifecycle: not-started, in-progress, completed (terminal).
//!
//! A `StudentChallenge` row does not exist until the student's first
//! qualifying activity inside the challenge's validity window. Completion
//! is terminal: it transitions exactly once, pays out exactly once, and
//! later evaluations return the stored state untouched. Expiry is never
//! persisted; it falls out of the validity window at read time.

use chrono::{DateTime, Utc};

use progression_store::{
    ActivityKind, Challenge, ChallengeProgress, GameStore, StudentChallenge, XpActivity,
};

use crate::error::{EngineError, Result};
use crate::ledger::{IdempotencyKey, LedgerEntry, XpLedger};

/// Outcome of evaluating one activity against one challenge.
#[derive(Debug, Clone)]
pub struct ChallengeOutcome {
    /// The student-challenge row after evaluation.
    pub row: StudentChallenge,
    /// True if this evaluation transitioned the row to completed.
    pub newly_completed: bool,
    /// The payout ledger entry, when this evaluation made it.
    pub payout: Option<XpActivity>,
}

/// Folds activities into challenge progress and pays out completions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeEvaluator;

impl ChallengeEvaluator {
    /// Evaluates one activity against an open challenge.
    ///
    /// Fails with [`EngineError::ChallengeNotActive`] outside the validity
    /// window; upstream callers treat that as "does not count", not a
    /// fault. Already-completed rows are returned as-is without
    /// re-awarding.
    pub fn evaluate<S: GameStore>(
        store: &S,
        challenge: &Challenge,
        student_id: &str,
        kind: ActivityKind,
        occurred_at: DateTime<Utc>,
    ) -> Result<ChallengeOutcome> {
        if !challenge.is_open_at(occurred_at) {
            return Err(EngineError::ChallengeNotActive(challenge.id));
        }

        let existing = store.student_challenge(student_id, challenge.id)?;

        if let Some(row) = &existing {
            if row.is_completed {
                return Ok(ChallengeOutcome {
                    row: row.clone(),
                    newly_completed: false,
                    payout: None,
                });
            }
        }

        // Lazily created on the first relevant event in the window.
        let mut row = existing.unwrap_or_else(|| StudentChallenge {
            id: 0,
            student_id: student_id.to_string(),
            challenge_id: challenge.id,
            progress: ChallengeProgress::default(),
            is_completed: false,
            completed_at: None,
            xp_earned: 0,
        });

        Self::fold(&mut row.progress, kind, occurred_at);

        let mut payout = None;
        let mut newly_completed = false;

        if row.progress.satisfies(&challenge.criteria) {
            row.is_completed = true;
            row.completed_at = Some(occurred_at);
            row.xp_earned = challenge.xp_reward;
            newly_completed = true;

            let entry = LedgerEntry {
                student_id: student_id.to_string(),
                kind: ActivityKind::ChallengeCompleted,
                amount: i64::try_from(challenge.xp_reward)
                    .map_err(|e| EngineError::InvalidAmount(e.to_string()))?,
                context: serde_json::json!({
                    "challenge_id": challenge.id,
                    "title": challenge.title,
                }),
                idempotency_key: Some(IdempotencyKey::derive(
                    student_id,
                    ActivityKind::ChallengeCompleted,
                    &challenge.id.to_string(),
                )),
                created_at: occurred_at,
            };

            match XpLedger::record(store, entry) {
                Ok(activity) => {
                    tracing::info!(
                        student_id,
                        challenge_id = challenge.id,
                        xp = challenge.xp_reward,
                        "challenge completed"
                    );
                    payout = Some(activity);
                },
                // A concurrent duplicate already paid out; keep the row
                // transition but award nothing again.
                Err(EngineError::DuplicateActivity(_)) => {},
                Err(err) => return Err(err),
            }
        }

        let row = store.upsert_student_challenge(row)?;

        Ok(ChallengeOutcome {
            row,
            newly_completed,
            payout,
        })
    }

    fn fold(progress: &mut ChallengeProgress, kind: ActivityKind, occurred_at: DateTime<Utc>) {
        if kind == ActivityKind::TaskCompleted {
            progress.tasks_completed = progress.tasks_completed.saturating_add(1);
        }

        let day = occurred_at.date_naive();
        if progress.last_counted_day != Some(day) {
            progress.active_days = progress.active_days.saturating_add(1);
            progress.last_counted_day = Some(day);
        }
    }
}
