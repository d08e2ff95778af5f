//! # Task Workers
//!
//! Every live activation of a task owns one worker thread. The thread loops
//! over a fixed cycle:
//!
//! 1. wait on the shared [`TickGate`] for a release addressed to this task,
//! 2. wait on the task's own [`SuspendGate`],
//! 3. perform one unit of work (or skip it right after an interrupt),
//! 4. send a [`WorkReport`] back to the scheduler.
//!
//! Cancellation is cooperative: [`TaskWorker::stop`] sets a flag, wakes both
//! gates and joins the thread. A worker is never killed mid-work.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use log::{trace, warn};

use crate::config::SampleFn;
use crate::event::TaskEffect;
use crate::sync::{SampleQueue, SuspendGate, TickGate};
use crate::task::{TaskClass, TaskId, Tick};
use crate::workload::{self, WorkUnit};

/// Shared resources every worker is wired to.
#[derive(Clone)]
pub struct WorkerEnv {
    pub gate: Arc<TickGate>,
    pub reports: Sender<WorkReport>,
    pub samples: SampleQueue,
    pub sample_fn: SampleFn,
    /// Threshold the consumer uses to discretize samples.
    pub threshold: f64,
}

/// What a worker did with a released tick.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    Performed(Vec<TaskEffect>),
    /// First release after resuming from an interrupt: no work is done.
    SkippedResumeTick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkReport {
    pub task: TaskId,
    pub tick: Tick,
    pub outcome: WorkOutcome,
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct TaskWorker {
    task: TaskId,
    gate: Arc<TickGate>,
    suspend: Arc<SuspendGate>,
    cancel: Arc<AtomicBool>,
    skip_next: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TaskWorker {
    /// Start a worker for `task` running the work unit of `class`.
    pub fn spawn(task: TaskId, class: TaskClass, env: &WorkerEnv) -> io::Result<Self> {
        let unit = workload::for_class(class, env);
        let suspend = Arc::new(SuspendGate::new(true));
        let cancel = Arc::new(AtomicBool::new(false));
        let skip_next = Arc::new(AtomicBool::new(false));

        let cycle = WorkerCycle {
            task,
            unit,
            gate: Arc::clone(&env.gate),
            suspend: Arc::clone(&suspend),
            cancel: Arc::clone(&cancel),
            skip_next: Arc::clone(&skip_next),
            reports: env.reports.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("task-{task}"))
            .spawn(move || cycle.run())?;

        Ok(Self {
            task,
            gate: Arc::clone(&env.gate),
            suspend,
            cancel,
            skip_next,
            handle: Some(handle),
        })
    }

    /// Close the suspend gate and withdraw any release still addressed to
    /// this worker.
    pub fn pause(&self) {
        self.suspend.close();
        self.gate.revoke(self.task);
    }

    /// Reopen the suspend gate. After an interrupt, the next released tick
    /// is consumed without doing work.
    pub fn resume(&self, after_interrupt: bool) {
        if after_interrupt {
            self.skip_next.store(true, Ordering::Release);
        }
        self.suspend.open();
    }

    pub fn is_paused(&self) -> bool {
        !self.suspend.is_open()
    }

    /// Cancel the worker and wait for its thread to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancel.store(true, Ordering::Release);
        self.gate.revoke(self.task);
        self.gate.wake_all();
        self.suspend.wake();
        if handle.join().is_err() {
            warn!("worker for task {} panicked", self.task);
        }
    }
}

impl Drop for TaskWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the worker thread.
struct WorkerCycle {
    task: TaskId,
    unit: Box<dyn WorkUnit>,
    gate: Arc<TickGate>,
    suspend: Arc<SuspendGate>,
    cancel: Arc<AtomicBool>,
    skip_next: Arc<AtomicBool>,
    reports: Sender<WorkReport>,
}

impl WorkerCycle {
    fn run(mut self) {
        trace!("worker for task {} started", self.task);
        while !self.cancel.load(Ordering::Acquire) {
            let Some(now) = self.gate.wait(self.task, &self.cancel) else {
                break;
            };
            if !self.suspend.wait_open(&self.cancel) {
                break;
            }

            let outcome = if self.skip_next.swap(false, Ordering::AcqRel) {
                WorkOutcome::SkippedResumeTick
            } else {
                WorkOutcome::Performed(self.unit.perform(&now))
            };

            let report = WorkReport {
                task: self.task,
                tick: now.tick,
                outcome,
            };
            if self.reports.send(report).is_err() {
                break;
            }
        }
        trace!("worker for task {} exited", self.task);
    }
}
