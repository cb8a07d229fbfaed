// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity model and data-access layer for the student progression engine.
//!
//! This crate defines the persistent entities (profiles, the XP ledger,
//! challenges, badges, leaderboard snapshots), the [`GameStore`] trait the
//! engine is written against, and [`MemoryStore`], a concurrent in-memory
//! implementation with real unique constraints.

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
#![allow(clippy::match_same_arms)]

pub mod entity;
pub mod memory;
pub mod store;

pub use entity::{
    ActivityKind, Badge, BadgeTier, Challenge, ChallengeKind, ChallengeProgress,
    CompletionCriteria, GameMode, LeaderboardPeriod, LeaderboardRow, LeaderboardScope,
    ScopeMembership, StudentBadge, StudentChallenge, StudentGameProfile, UnlockCriteria,
    XpActivity,
};
pub use memory::MemoryStore;
pub use store::{GameStore, Result, StoreError};
