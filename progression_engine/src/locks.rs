// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-student serialization locks.
//!
//! Every logical operation that reads-then-writes a student's aggregate
//! (ledger append, wallet projection, streak update, badge scan) runs under
//! that student's lock. Locks for different students are independent and
//! never contend.
//!
//! Acquisition has a timeout; hitting it surfaces as
//! [`EngineError::ConcurrencyConflict`] and the caller retries the whole
//! operation with the same idempotency key.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::error::{EngineError, Result};

/// Guard serializing all writes for one student.
pub type StudentGuard = ArcMutexGuard<RawMutex, ()>;

/// Hands out per-student locks with an acquisition timeout.
#[derive(Debug, Default)]
pub struct StudentLockManager {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StudentLockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `student_id`, waiting up to `timeout`.
    pub fn acquire(&self, student_id: &str, timeout: Duration) -> Result<StudentGuard> {
        let lock = self
            .locks
            .entry(student_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.try_lock_arc_for(timeout)
            .ok_or_else(|| EngineError::ConcurrencyConflict(student_id.to_string()))
    }

    /// Number of students that have ever taken a lock.
    #[must_use]
    pub fn tracked_students(&self) -> usize {
        self.locks.len()
    }
}
