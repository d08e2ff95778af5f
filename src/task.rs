//! # Task Control Block
//!
//! Defines the task model for TickOS. Every task, periodic or interrupt,
//! shares one state-machine record: the [`TaskControlBlock`]. Behavior that
//! differs per task class is selected by the [`TaskClass`] tag rather than
//! by separate types.
//!
//! ## States and Modes
//!
//! `state` says whether a task takes part in scheduling at all; `mode` is
//! the fine-grained scheduling phase inside that state.
//!
//! ```text
//!  Inactive/Disabled ──start time──► Active/WaitForRun ◄──period──┐
//!                                        │        ▲               │
//!                                 arbitration  interrupt done     │
//!                                        ▼        │               │
//!                                    Running ──► Interrupted      │
//!                                        │                        │
//!                         session done / budget break             │
//!                                        ▼                        │
//!                                 Active/WaitForReady ────────────┘
//!
//!  Active/WaitForRun ──critical delay──► Paused/Disabled ──skip──► Active/WaitForRun
//!  any ──stop time / shutdown──► Inactive/Disabled
//! ```
//!
//! The scheduler drives every transition. The methods here only keep the
//! record consistent; they never decide *when* a transition happens.

use log::debug;

use crate::error::{ConfigError, Param};
use crate::event::{CrossTaskAction, CrossTaskRequest};
use crate::worker::{TaskWorker, WorkerEnv};

/// Logical time, in ticks.
pub type Tick = u32;

/// Stable task identity within a run.
pub type TaskId = u32;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Whether a task currently participates in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Active,
    Inactive,
    /// Suspended until an operator command brings it back.
    Paused,
}

/// Scheduling phase of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// Owns the CPU this tick.
    Running,
    /// Ready and waiting for arbitration.
    WaitForRun,
    /// Finished its session; waiting for the next period boundary.
    WaitForReady,
    /// Preempted by an interrupt; resumes before new work starts.
    Interrupted,
    Disabled,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Periodic,
    Interrupt,
}

/// Closed set of task variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    /// Periodic task A: samples the signal into the FIFO.
    Producer,
    /// Periodic task B: drains the FIFO, raises cross-task requests and
    /// grows its session time after every completed session.
    Consumer,
    /// Sporadic interrupt handler, destroyed once its session completes.
    Interrupt,
}

impl TaskClass {
    #[inline]
    pub const fn kind(self) -> TaskKind {
        match self {
            TaskClass::Producer | TaskClass::Consumer => TaskKind::Periodic,
            TaskClass::Interrupt => TaskKind::Interrupt,
        }
    }
}

// ---------------------------------------------------------------------------
// Task configuration
// ---------------------------------------------------------------------------

/// Configured parameters of a task.
///
/// Runtime copies of the start time, stop time and session time live in
/// the [`TaskControlBlock`]; resetting a task restores them from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Lower value wins arbitration.
    pub priority: i32,
    /// Ticks between successive releases. Unused by interrupt tasks.
    pub period_time: u32,
    /// Ticks of work required per activation.
    pub session_time: u32,
    /// Maximum ticks a single activation may run before it is broken off.
    pub critical_run_time: u32,
    /// Maximum ticks a ready task may wait before the operator is asked.
    /// Unused by interrupt tasks.
    pub critical_delay_time: u32,
    pub start_time: Option<Tick>,
    pub stop_time: Option<Tick>,
}

impl TaskConfig {
    /// Check the constraints every periodic task must satisfy.
    pub fn validate_periodic(&self) -> Result<(), ConfigError> {
        positive(self.period_time, Param::Period)?;
        positive(self.session_time, Param::Session)?;
        positive(self.critical_run_time, Param::CriticalRun)?;
        positive(self.critical_delay_time, Param::CriticalDelay)?;
        if self.stop_time == Some(0) {
            return Err(ConfigError::NotPositive {
                param: Param::StopTime,
            });
        }
        if self.period_time < self.session_time {
            return Err(ConfigError::PeriodBelowSession {
                period: self.period_time,
                session: self.session_time,
            });
        }
        if self.period_time <= self.critical_run_time {
            return Err(ConfigError::PeriodNotAboveCriticalRun {
                period: self.period_time,
                critical_run: self.critical_run_time,
            });
        }
        self.validate_budget()
    }

    /// Check the constraints of an interrupt task.
    pub fn validate_interrupt(&self) -> Result<(), ConfigError> {
        positive(self.session_time, Param::Session)?;
        positive(self.critical_run_time, Param::CriticalRun)?;
        self.validate_budget()
    }

    fn validate_budget(&self) -> Result<(), ConfigError> {
        if self.critical_run_time < self.session_time {
            return Err(ConfigError::CriticalRunBelowSession {
                critical_run: self.critical_run_time,
                session: self.session_time,
            });
        }
        Ok(())
    }

    /// Configuration of an interrupt task.
    pub fn interrupt(start_time: Tick, critical_run_time: u32, session_time: u32) -> Self {
        Self {
            priority: 0,
            period_time: 0,
            session_time,
            critical_run_time,
            critical_delay_time: 0,
            start_time: Some(start_time),
            stop_time: None,
        }
    }
}

fn positive(value: u32, param: Param) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NotPositive { param })
    } else {
        Ok(())
    }
}

/// Cross-task requests raised by the consumer when it starts a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTriggers {
    pub target: TaskId,
    /// Every N-th session asks the target to stop now.
    pub stop_every: Option<u32>,
    /// Every N-th session asks the target to pause.
    pub pause_every: Option<u32>,
}

impl EventTriggers {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stop_every == Some(0) {
            return Err(ConfigError::NotPositive {
                param: Param::StopEventPeriod,
            });
        }
        if self.pause_every == Some(0) {
            return Err(ConfigError::NotPositive {
                param: Param::PauseEventPeriod,
            });
        }
        Ok(())
    }

    /// Actions due when session number `session` starts.
    fn due(&self, session: u32) -> impl Iterator<Item = CrossTaskAction> {
        let stop = self
            .stop_every
            .filter(|n| session % n == 0)
            .map(|_| CrossTaskAction::StopNow);
        let pause = self
            .pause_every
            .filter(|n| session % n == 0)
            .map(|_| CrossTaskAction::Pause);
        stop.into_iter().chain(pause)
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// The central record of one task: identity, configuration, scheduling
/// phase, per-activation counters and the worker of the live activation.
#[derive(Debug)]
pub struct TaskControlBlock {
    pub id: TaskId,
    pub class: TaskClass,
    pub state: TaskState,
    pub mode: TaskMode,
    pub config: TaskConfig,
    pub triggers: Option<EventTriggers>,

    /// Runtime start time; restored from `config` on reset.
    pub start_time: Option<Tick>,
    /// Runtime stop time; cross-task `StopNow` requests move it.
    pub stop_time: Option<Tick>,
    /// Runtime session time; the consumer grows it after each session.
    pub session_time: u32,

    /// Ticks of work done in the current activation.
    pub running_time: u32,
    /// Activations started so far.
    pub sessions_count: u32,
    pub time_when_become_wait_for_run: Tick,
    pub time_when_interrupted: Option<Tick>,

    worker: Option<TaskWorker>,
}

impl TaskControlBlock {
    /// A periodic task, initially `Inactive/Disabled`.
    pub fn periodic(
        id: TaskId,
        class: TaskClass,
        config: TaskConfig,
        triggers: Option<EventTriggers>,
    ) -> Self {
        debug_assert_eq!(class.kind(), TaskKind::Periodic);
        Self {
            id,
            class,
            state: TaskState::Inactive,
            mode: TaskMode::Disabled,
            config,
            triggers,
            start_time: config.start_time,
            stop_time: config.stop_time,
            session_time: config.session_time,
            running_time: 0,
            sessions_count: 0,
            time_when_become_wait_for_run: 0,
            time_when_interrupted: None,
            worker: None,
        }
    }

    /// An interrupt task, created directly in `Active/WaitForRun`.
    pub fn interrupt(id: TaskId, config: TaskConfig, now: Tick) -> Self {
        Self {
            id,
            class: TaskClass::Interrupt,
            state: TaskState::Active,
            mode: TaskMode::WaitForRun,
            config,
            triggers: None,
            start_time: config.start_time,
            stop_time: None,
            session_time: config.session_time,
            running_time: 0,
            sessions_count: 0,
            time_when_become_wait_for_run: now,
            time_when_interrupted: None,
            worker: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> TaskKind {
        self.class.kind()
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.kind() == TaskKind::Periodic
    }

    /// Active and either ready or preempted.
    #[inline]
    pub fn is_candidate(&self) -> bool {
        self.state == TaskState::Active
            && matches!(self.mode, TaskMode::WaitForRun | TaskMode::Interrupted)
    }

    /// Waiting on an operator decision after a deadline miss.
    #[inline]
    pub fn awaits_operator(&self) -> bool {
        self.state == TaskState::Paused && self.mode == TaskMode::Disabled
    }

    #[inline]
    pub fn session_complete(&self) -> bool {
        self.running_time == self.session_time
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    // --- transitions ------------------------------------------------------

    /// Become ready for arbitration as of `now`.
    pub fn arm(&mut self, now: Tick) {
        self.state = TaskState::Active;
        self.mode = TaskMode::WaitForRun;
        self.time_when_become_wait_for_run = now;
    }

    /// Whether `now` is a period boundary of this task.
    pub fn on_period_boundary(&self, now: Tick) -> bool {
        match self.start_time {
            Some(start) if now >= start && self.config.period_time > 0 => {
                (now - start) % self.config.period_time == 0
            }
            _ => false,
        }
    }

    /// Start a fresh activation: count it, clear the running time and
    /// spawn the worker. Returns the cross-task requests due at this start.
    pub fn begin_session(
        &mut self,
        env: &WorkerEnv,
        now: Tick,
    ) -> std::io::Result<Vec<CrossTaskRequest>> {
        self.stop_worker();
        self.worker = Some(TaskWorker::spawn(self.id, self.class, env)?);
        self.running_time = 0;
        self.sessions_count += 1;
        self.mode = TaskMode::Running;
        debug!(
            "task {} starts session {} at tick {}",
            self.id, self.sessions_count, now
        );

        let source = self.id;
        let session = self.sessions_count;
        Ok(self
            .triggers
            .map(|t| {
                t.due(session)
                    .map(|action| CrossTaskRequest {
                        source,
                        target: t.target,
                        action,
                        tick: now,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Finish the activation normally.
    pub fn complete_session(&mut self) {
        self.stop_worker();
        self.mode = TaskMode::WaitForReady;
        if self.class == TaskClass::Consumer {
            self.session_time += 1;
        }
    }

    /// Break off an activation that hit its critical run time.
    pub fn break_session(&mut self) {
        self.stop_worker();
        self.mode = TaskMode::WaitForReady;
        if self.class == TaskClass::Consumer {
            self.session_time = self.config.session_time;
        }
    }

    /// Preempt a running task in favor of an interrupt.
    pub fn interrupt_at(&mut self, now: Tick) {
        if let Some(worker) = &self.worker {
            worker.pause();
        }
        self.mode = TaskMode::Interrupted;
        self.time_when_interrupted = Some(now);
    }

    /// Give the CPU back to a preempted task. Its next released tick is a
    /// no-op.
    pub fn resume_after_interrupt(&mut self) {
        if let Some(worker) = &self.worker {
            worker.resume(true);
        }
        self.mode = TaskMode::Running;
    }

    /// Deadline miss: suspend and wait for the operator.
    pub fn suspend_for_operator(&mut self) {
        self.state = TaskState::Paused;
        self.mode = TaskMode::Disabled;
    }

    /// Cross-task pause. A live activation is abandoned.
    pub fn pause(&mut self) {
        self.stop_worker();
        self.state = TaskState::Paused;
        self.mode = TaskMode::Paused;
    }

    pub fn deactivate(&mut self) {
        self.stop_worker();
        self.state = TaskState::Inactive;
        self.mode = TaskMode::Disabled;
    }

    /// Stop everything and restore the configured parameters.
    pub fn reset(&mut self) {
        self.deactivate();
        self.start_time = self.config.start_time;
        self.stop_time = self.config.stop_time;
        self.session_time = self.config.session_time;
        self.running_time = 0;
        self.sessions_count = 0;
        self.time_when_become_wait_for_run = 0;
        self.time_when_interrupted = None;
    }

    pub fn stop_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }

    /// Ticks at which this task is planned to be released within
    /// `[start_time, min(stop_time, horizon))`.
    pub fn planned_releases(&self, horizon: Tick) -> Vec<Tick> {
        let (Some(start), true) = (self.start_time, self.config.period_time > 0) else {
            return Vec::new();
        };
        let end = self.stop_time.map_or(horizon, |stop| stop.min(horizon));
        (start..end)
            .step_by(self.config.period_time as usize)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
