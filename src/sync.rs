//! # Synchronization Primitives
//!
//! The clock and the gates that lock every task worker to the global tick.
//!
//! ```text
//!   Scheduler thread                     Worker thread (one per task)
//!   ────────────────                     ────────────────────────────
//!   clock.advance()
//!   ...settle tick T...
//!   gate.release(id, snapshot) ───────►  gate.wait(id)        (tick-release)
//!                                        suspend.wait_open()  (pause gate)
//!                                        perform unit of work
//!   reports.recv() ◄──────────────────── reports.send(report)
//! ```
//!
//! Both gates use `Mutex` + `Condvar`. Waits also observe the worker's
//! cancellation flag, so a stop never has to interrupt a thread mid-work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::task::{TaskId, Tick};

/// Lock a mutex, recovering the guard if another thread panicked with it.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => poison.into_inner(),
    }
}

// ---------------------------------------------------------------------------
// Model clock
// ---------------------------------------------------------------------------

/// Read-only view of the clock handed to a worker for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSnapshot {
    pub tick: Tick,
}

/// Logical model time. Only the scheduler holds one, so only the scheduler
/// can move it.
#[derive(Debug, Default)]
pub struct ModelClock {
    current: Tick,
}

impl ModelClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.current
    }

    /// Move to the next tick and return it.
    pub fn advance(&mut self) -> Tick {
        self.current += 1;
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }

    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot { tick: self.current }
    }
}

// ---------------------------------------------------------------------------
// Tick-release gate
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Release {
    target: Option<TaskId>,
    snapshot: Option<TickSnapshot>,
}

/// Shared tick-release signal.
///
/// At most one release is outstanding at a time and it is addressed to a
/// single task; every other worker keeps sleeping. A release is consumed by
/// the addressed worker or revoked by the scheduler.
#[derive(Debug, Default)]
pub struct TickGate {
    state: Mutex<Release>,
    cv: Condvar,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `task` perform one unit of work for `snapshot.tick`.
    pub fn release(&self, task: TaskId, snapshot: TickSnapshot) {
        let mut st = lock_or_recover(&self.state);
        debug_assert!(st.target.is_none(), "tick released twice without being consumed");
        st.target = Some(task);
        st.snapshot = Some(snapshot);
        self.cv.notify_all();
    }

    /// Withdraw an unconsumed release addressed to `task`.
    ///
    /// Returns `true` if there was one. Used when a task is paused between
    /// a release and its consumption so the gate never stays latched for a
    /// worker that will not run.
    pub fn revoke(&self, task: TaskId) -> bool {
        let mut st = lock_or_recover(&self.state);
        if st.target == Some(task) {
            st.target = None;
            st.snapshot = None;
            true
        } else {
            false
        }
    }

    /// Block until a release addressed to `task` arrives.
    ///
    /// Returns `None` once `cancel` is set.
    pub fn wait(&self, task: TaskId, cancel: &AtomicBool) -> Option<TickSnapshot> {
        let mut st = lock_or_recover(&self.state);
        loop {
            if cancel.load(Ordering::Acquire) {
                return None;
            }
            if st.target == Some(task) {
                st.target = None;
                return st.snapshot.take();
            }
            st = match self.cv.wait(st) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
    }

    /// Wake every waiter so it re-checks its cancellation flag.
    pub fn wake_all(&self) {
        // Taking the lock orders this wakeup after any in-progress check.
        let _st = lock_or_recover(&self.state);
        self.cv.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Per-task suspend gate
// ---------------------------------------------------------------------------

/// Pause gate of a single worker. Open means the worker may work.
#[derive(Debug)]
pub struct SuspendGate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl SuspendGate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            cv: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *lock_or_recover(&self.open) = true;
        self.cv.notify_all();
    }

    pub fn close(&self) {
        *lock_or_recover(&self.open) = false;
    }

    pub fn is_open(&self) -> bool {
        *lock_or_recover(&self.open)
    }

    /// Block while the gate is closed. Returns `false` once `cancel` is set.
    pub fn wait_open(&self, cancel: &AtomicBool) -> bool {
        let mut open = lock_or_recover(&self.open);
        loop {
            if cancel.load(Ordering::Acquire) {
                return false;
            }
            if *open {
                return true;
            }
            open = match self.cv.wait(open) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
    }

    pub fn wake(&self) {
        let _open = lock_or_recover(&self.open);
        self.cv.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Sample FIFO
// ---------------------------------------------------------------------------

/// Unbounded FIFO of sample values between the producer and consumer tasks.
///
/// The scheduler owns both ends and hands clones to the workers it spawns,
/// so a reset can drain whatever the consumer never picked up.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    tx: Sender<f64>,
    rx: Receiver<f64>,
}

impl SampleQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn producer(&self) -> SampleProducer {
        SampleProducer {
            tx: self.tx.clone(),
        }
    }

    pub fn consumer(&self) -> SampleConsumer {
        SampleConsumer {
            rx: self.rx.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard every queued sample. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Appending end of the sample FIFO.
#[derive(Debug, Clone)]
pub struct SampleProducer {
    tx: Sender<f64>,
}

impl SampleProducer {
    pub fn push(&self, value: f64) {
        // The scheduler keeps a receiver alive for as long as workers exist.
        let _ = self.tx.send(value);
    }
}

/// Popping end of the sample FIFO.
#[derive(Debug, Clone)]
pub struct SampleConsumer {
    rx: Receiver<f64>,
}

impl SampleConsumer {
    /// Pop the oldest sample, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<f64> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
