// SPDX-License-Identifier: MIT OR Apache-2.0
//! Student Progression & Leaderboard Engine
//!
//! Turns raw learning-activity events into experience points, levels,
//! daily streaks, time-boxed challenges, unlockable badges, and ranked
//! leaderboards. The append-only XP ledger is the single source of truth;
//! wallets, levels, and leaderboards are projections of it.
//!
//! All writes touching one student's aggregate are serialized through a
//! per-student lock; different students never contend. Challenge payouts
//! and badge unlocks are idempotent under retry and duplicate delivery.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::{TimeZone, Utc};
//! use progression_engine::{ActivityEvent, EngineConfig, ProgressionEngine};
//! use progression_store::MemoryStore;
//!
//! let engine =
//!     ProgressionEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default()).unwrap();
//!
//! let when = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
//! let outcome = engine
//!     .submit_activity(ActivityEvent::task("student-1", "task-42", 40, when))
//!     .unwrap();
//!
//! assert!(outcome.applied);
//! assert_eq!(outcome.profile.xp_total, 40);
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rustdoc::broken_intra_doc_links
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]

pub mod badge;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod level;
pub mod locks;
pub mod streak;
pub mod wallet;

pub use badge::{AggregateSnapshot, BadgeEvaluator};
pub use challenge::{ChallengeEvaluator, ChallengeOutcome};
pub use config::EngineConfig;
pub use engine::{
    ActivityEvent, ActivitySubmission, ChallengeStatus, ProgressionEngine, WalletView,
};
pub use error::{EngineError, Result};
pub use leaderboard::{period_window, Deadline, LeaderboardEngine};
pub use ledger::{IdempotencyKey, LedgerEntry, XpLedger};
pub use level::{LevelCurve, LevelProgress};
pub use locks::{StudentGuard, StudentLockManager};
pub use streak::{StreakTracker, StreakUpdate};
pub use wallet::{WalletProjector, WalletUpdate};
