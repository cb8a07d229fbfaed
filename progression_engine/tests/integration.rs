// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end tests for the progression engine: idempotency under
//! concurrent duplicate delivery, per-student serialization, and
//! leaderboard ordering over realistic data.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};

use progression_engine::{
    ActivityEvent, EngineConfig, EngineError, ProgressionEngine,
};
use progression_store::{
    Challenge, ChallengeKind, CompletionCriteria, GameMode, GameStore, LeaderboardPeriod,
    LeaderboardScope, MemoryStore, UnlockCriteria,
};

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
}

fn engine() -> Arc<ProgressionEngine<MemoryStore>> {
    Arc::new(
        ProgressionEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default()).unwrap(),
    )
}

fn daily_challenge(id: u64, target_tasks: u32, reward: u64) -> Challenge {
    Challenge {
        id,
        kind: ChallengeKind::Daily,
        title: format!("challenge-{id}"),
        description: String::new(),
        xp_reward: reward,
        criteria: CompletionCriteria::tasks(target_tasks),
        valid_from: at(1, 0),
        valid_until: at(2, 0),
        is_active: true,
        game_mode: GameMode::Playful,
    }
}

#[test]
fn concurrent_duplicate_delivery_applies_once() {
    let engine = engine();

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .submit_activity(ActivityEvent::task("s1", "task-42", 40, at(1, 9)))
                    .unwrap()
                    .applied
            })
        })
        .collect();

    let applied_count = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|applied| *applied)
        .count();

    assert_eq!(applied_count, 1);
    assert_eq!(engine.store().activity_count(), 1);
    assert_eq!(engine.wallet("s1").unwrap().unwrap().profile.xp_total, 40);
}

#[test]
fn concurrent_challenge_completion_pays_once() {
    let engine = engine();
    engine.store().insert_challenge(daily_challenge(1, 1, 50));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .submit_activity(ActivityEvent::task("s1", "task-42", 40, at(1, 9)))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Exactly one task entry plus exactly one challenge payout.
    assert_eq!(engine.store().activity_count(), 2);
    let view = engine.wallet("s1").unwrap().unwrap();
    assert_eq!(view.profile.xp_total, 90);

    let state = engine
        .store()
        .student_challenge("s1", 1)
        .unwrap()
        .unwrap();
    assert!(state.is_completed);
    assert_eq!(state.xp_earned, 50);
}

#[test]
fn duplicate_challenge_event_second_call_no_op() {
    let engine = engine();
    engine.store().insert_challenge(daily_challenge(1, 1, 50));

    let first = engine
        .submit_activity(ActivityEvent::task("s1", "task-42", 0, at(1, 9)))
        .unwrap();
    assert_eq!(first.completed_challenges.len(), 1);

    let second = engine
        .submit_activity(ActivityEvent::task("s1", "task-42", 0, at(1, 10)))
        .unwrap();
    assert!(!second.applied);
    assert!(second.completed_challenges.is_empty());
    assert_eq!(engine.wallet("s1").unwrap().unwrap().profile.xp_total, 50);
}

#[test]
fn concurrent_badge_unlock_awards_once() {
    let engine = engine();
    engine.store().insert_badge(progression_store::Badge {
        id: 1,
        badge_key: "first_steps".to_string(),
        tier: progression_store::BadgeTier::Bronze,
        criteria: UnlockCriteria {
            min_xp: Some(10),
            ..UnlockCriteria::default()
        },
        xp_requirement: 10,
        game_mode: GameMode::Playful,
    });

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .submit_activity(ActivityEvent::task(
                        "s1",
                        format!("task-{i}"),
                        20,
                        at(1, 9),
                    ))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.earned_badges("s1").unwrap().len(), 1);
}

#[test]
fn different_students_progress_independently() {
    let engine = engine();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let student = format!("student-{i}");
                for task in 0..20 {
                    engine
                        .submit_activity(ActivityEvent::task(
                            &student,
                            format!("task-{task}"),
                            5,
                            at(1, 9),
                        ))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let view = engine.wallet(&format!("student-{i}")).unwrap().unwrap();
        assert_eq!(view.profile.xp_total, 100);
        assert_eq!(view.profile.level, 2);
    }
}

#[test]
fn leaderboard_total_order_over_random_scores() {
    let engine = engine();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    for i in 0..50 {
        let amount = rng.gen_range(0..300);
        engine
            .submit_activity(ActivityEvent::task(
                format!("student-{i:02}"),
                "warmup",
                amount,
                at(1, 9),
            ))
            .unwrap();
    }

    let rows = engine
        .recompute_leaderboard(&LeaderboardScope::Global, LeaderboardPeriod::AllTime, at(1, 12))
        .unwrap();

    assert_eq!(rows.len(), 50);
    for (idx, row) in rows.iter().enumerate() {
        assert_eq!(row.rank, u32::try_from(idx).unwrap() + 1);
    }
    for pair in rows.windows(2) {
        assert!(pair[0].xp_points >= pair[1].xp_points);
        if pair[0].xp_points == pair[1].xp_points {
            assert!(pair[0].student_id < pair[1].student_id);
        }
    }
}

#[test]
fn weekly_leaderboard_only_counts_window() {
    let engine = engine();

    // Week of 2024-03-11 (Monday) through 2024-03-17.
    engine
        .submit_activity(ActivityEvent::task("alice", "old", 500, at(5, 9)))
        .unwrap();
    engine
        .submit_activity(ActivityEvent::task("alice", "in-week", 30, at(12, 9)))
        .unwrap();
    engine
        .submit_activity(ActivityEvent::task("bob", "in-week", 80, at(13, 9)))
        .unwrap();

    let rows = engine
        .recompute_leaderboard(&LeaderboardScope::Global, LeaderboardPeriod::Weekly, at(15, 12))
        .unwrap();

    assert_eq!(rows[0].student_id, "bob");
    assert_eq!(rows[0].xp_points, 80);
    assert_eq!(rows[1].student_id, "alice");
    assert_eq!(rows[1].xp_points, 30);
}

#[test]
fn expired_challenge_never_completes() {
    let engine = engine();
    let mut challenge = daily_challenge(1, 1, 50);
    challenge.valid_until = at(1, 8);
    engine.store().insert_challenge(challenge);

    let submission = engine
        .submit_activity(ActivityEvent::task("s1", "task-1", 40, at(1, 9)))
        .unwrap();

    assert!(submission.completed_challenges.is_empty());
    assert!(engine.store().student_challenge("s1", 1).unwrap().is_none());
    assert_eq!(submission.profile.xp_total, 40);
}

#[test]
fn retry_after_conflict_reuses_idempotency_key() {
    let engine = engine();

    // First delivery succeeds.
    engine
        .submit_activity(ActivityEvent::task("s1", "task-1", 40, at(1, 9)))
        .unwrap();

    // A retry of the same logical event (e.g. after a reported conflict)
    // is absorbed by the ledger.
    let retry = engine
        .submit_activity(ActivityEvent::task("s1", "task-1", 40, at(1, 9)))
        .unwrap();
    assert!(!retry.applied);
    assert_eq!(engine.wallet("s1").unwrap().unwrap().profile.xp_total, 40);
}

#[test]
fn invalid_manual_award_without_reason_rejected_downstream() {
    let engine = engine();
    let err = engine.award_manual("s1", 25, "", at(1, 9)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[test]
fn prestige_mode_students_see_their_own_challenges() {
    let engine = engine();
    let mut challenge = daily_challenge(1, 1, 50);
    challenge.game_mode = GameMode::Prestige;
    engine.store().insert_challenge(challenge);

    // Playful student: the prestige challenge does not apply.
    let playful = engine
        .submit_activity(ActivityEvent::task("p1", "task-1", 10, at(1, 9)))
        .unwrap();
    assert!(playful.completed_challenges.is_empty());

    // Prestige student completes it.
    let prestige = engine
        .submit_activity(
            ActivityEvent::task("p2", "task-1", 10, at(1, 9))
                .with_game_mode(GameMode::Prestige),
        )
        .unwrap();
    assert_eq!(prestige.completed_challenges.len(), 1);
}
