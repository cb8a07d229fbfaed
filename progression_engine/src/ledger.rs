// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only XP ledger.
//!
//! Single source of truth for a student's XP. Re-delivery of the same
//! upstream event is rejected through a deterministic idempotency key
//! enforced as a store unique constraint, so retrying a ledger append is
//! always safe.

use chrono::{DateTime, Utc};

use progression_store::{ActivityKind, GameStore, StoreError, XpActivity};

use crate::error::{EngineError, Result};

/// Deterministic deduplication key for a ledger entry.
///
/// Derived from (student, kind, source event), never from free-form
/// context, so the same upstream event always maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives the key for an upstream event.
    #[must_use]
    pub fn derive(student_id: &str, kind: ActivityKind, source_event_id: &str) -> Self {
        let tag = match kind {
            ActivityKind::TaskCompleted => "task",
            ActivityKind::ChallengeCompleted => "challenge",
            ActivityKind::StreakBonus => "streak",
            ActivityKind::ManualAward => "manual",
        };
        Self(format!("xp:{student_id}:{tag}:{source_event_id}"))
    }

    /// The key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

/// A validated request to append one ledger entry.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Owning student.
    pub student_id: String,
    /// Kind of XP-granting event.
    pub kind: ActivityKind,
    /// XP delta.
    pub amount: i64,
    /// Opaque source payload.
    pub context: serde_json::Value,
    /// Deduplication key, where the kind requires one.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger over a [`GameStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct XpLedger;

impl XpLedger {
    /// Validates and appends one entry.
    ///
    /// Duplicate idempotency keys surface as
    /// [`EngineError::DuplicateActivity`]; the caller treats that as
    /// "already applied". Manual awards bypass the duplicate check but
    /// must carry a `reason` string in their context.
    pub fn record<S: GameStore>(store: &S, entry: LedgerEntry) -> Result<XpActivity> {
        Self::validate(&entry)?;

        let row = XpActivity {
            id: 0,
            student_id: entry.student_id,
            kind: entry.kind,
            xp_earned: entry.amount,
            context: entry.context,
            idempotency_key: entry.idempotency_key.map(String::from),
            created_at: entry.created_at,
        };

        match store.append_activity(row) {
            Ok(appended) => {
                tracing::debug!(
                    student_id = %appended.student_id,
                    kind = ?appended.kind,
                    xp = appended.xp_earned,
                    "ledger entry appended"
                );
                Ok(appended)
            },
            Err(StoreError::DuplicateKey(key)) => {
                tracing::debug!(key = %key, "duplicate delivery ignored");
                Err(EngineError::DuplicateActivity(key))
            },
            Err(err) => Err(err.into()),
        }
    }

    fn validate(entry: &LedgerEntry) -> Result<()> {
        match entry.kind {
            ActivityKind::ManualAward => {
                let has_reason = entry
                    .context
                    .get("reason")
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|r| !r.is_empty());
                if !has_reason {
                    return Err(EngineError::InvalidAmount(
                        "manual award requires a reason in context".to_string(),
                    ));
                }
            },
            ActivityKind::TaskCompleted | ActivityKind::ChallengeCompleted => {
                if entry.amount < 0 {
                    return Err(EngineError::InvalidAmount(format!(
                        "negative amount {} only allowed for manual awards",
                        entry.amount
                    )));
                }
                if entry.idempotency_key.is_none() {
                    return Err(EngineError::InvalidAmount(
                        "task and challenge entries require an idempotency key".to_string(),
                    ));
                }
            },
            ActivityKind::StreakBonus => {
                if entry.amount < 0 {
                    return Err(EngineError::InvalidAmount(format!(
                        "negative amount {} only allowed for manual awards",
                        entry.amount
                    )));
                }
            },
        }
        Ok(())
    }
}
