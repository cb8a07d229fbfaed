// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wallet projection: ledger deltas folded into the per-student aggregate.
//!
//! `xp_total` never goes negative: a correction that would drive it below
//! zero is clamped and the applied (clamped) delta is reported back so the
//! caller can record it for audit. The cached `level` column is recomputed
//! on every application and never set independently.

use chrono::{DateTime, Utc};

use progression_store::StudentGameProfile;

use crate::level::LevelCurve;

/// Outcome of applying one ledger delta to a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletUpdate {
    /// Delta actually applied after clamping.
    pub applied_delta: i64,
    /// True if the requested delta was clamped at zero.
    pub clamped: bool,
    /// Level before the update.
    pub level_before: u32,
    /// Level after the update.
    pub level_after: u32,
}

impl WalletUpdate {
    /// True if the update crossed at least one level boundary upward.
    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Projects ledger deltas onto [`StudentGameProfile`] aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletProjector {
    curve: LevelCurve,
}

impl WalletProjector {
    /// Creates a projector over the given level curve.
    #[must_use]
    pub const fn new(curve: LevelCurve) -> Self {
        Self { curve }
    }

    /// The projector's level curve.
    #[must_use]
    pub const fn curve(&self) -> LevelCurve {
        self.curve
    }

    /// Applies `delta` to the profile in place.
    pub fn apply(
        &self,
        profile: &mut StudentGameProfile,
        delta: i64,
        now: DateTime<Utc>,
    ) -> WalletUpdate {
        let level_before = self.curve.level_of(profile.xp_total);

        let (new_total, applied_delta, clamped) = if delta >= 0 {
            let total = profile.xp_total.saturating_add(delta.unsigned_abs());
            (total, delta, false)
        } else {
            let decrease = delta.unsigned_abs();
            if decrease > profile.xp_total {
                // Clamp at zero; report the delta actually applied.
                let applied = -i64::try_from(profile.xp_total).unwrap_or(i64::MAX);
                (0, applied, true)
            } else {
                (profile.xp_total - decrease, delta, false)
            }
        };

        profile.xp_total = new_total;
        profile.level = self.curve.level_of(new_total);
        profile.updated_at = now;

        WalletUpdate {
            applied_delta,
            clamped,
            level_before,
            level_after: profile.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use progression_store::GameMode;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn profile() -> StudentGameProfile {
        StudentGameProfile::new("s1", GameMode::Playful, now())
    }

    #[test]
    fn test_positive_delta() {
        let projector = WalletProjector::default();
        let mut p = profile();
        let update = projector.apply(&mut p, 120, now());
        assert_eq!(p.xp_total, 120);
        assert_eq!(p.level, 2);
        assert_eq!(update.applied_delta, 120);
        assert!(!update.clamped);
        assert!(update.leveled_up());
    }

    #[test]
    fn test_negative_delta_within_balance() {
        let projector = WalletProjector::default();
        let mut p = profile();
        projector.apply(&mut p, 100, now());
        let update = projector.apply(&mut p, -40, now());
        assert_eq!(p.xp_total, 60);
        assert_eq!(update.applied_delta, -40);
        assert!(!update.clamped);
        assert_eq!(update.level_before, 2);
        assert_eq!(update.level_after, 1);
    }

    #[test]
    fn test_negative_delta_clamped_at_zero() {
        let projector = WalletProjector::default();
        let mut p = profile();
        projector.apply(&mut p, 30, now());
        let update = projector.apply(&mut p, -100, now());
        assert_eq!(p.xp_total, 0);
        assert_eq!(p.level, 1);
        assert_eq!(update.applied_delta, -30);
        assert!(update.clamped);
    }

    #[test]
    fn test_zero_delta_no_clamp() {
        let projector = WalletProjector::default();
        let mut p = profile();
        let update = projector.apply(&mut p, 0, now());
        assert_eq!(update.applied_delta, 0);
        assert!(!update.clamped);
        assert!(!update.leveled_up());
    }

    #[test]
    fn test_level_cache_always_matches_curve() {
        let projector = WalletProjector::default();
        let mut p = profile();
        for delta in [40, 40, 40, -30, 250, -1000] {
            projector.apply(&mut p, delta, now());
            assert_eq!(p.level, projector.curve().level_of(p.xp_total));
        }
    }
}
