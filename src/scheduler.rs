//! # Scheduler
//!
//! Core scheduling logic for TickOS. Owns the task collection and the
//! model clock, applies the per-tick decision algorithm and emits
//! notifications for observers.
//!
//! ## Scheduling Algorithm
//!
//! At each tick:
//! 1. **Advance the clock**: stop with `Done` once `max_ticks` is reached
//! 2. **Housekeeping**: fold queued cross-task requests, materialize due
//!    interrupt tasks, activate / deactivate / re-arm periodic tasks
//! 3. **Settle the running task**: retire finished work, preempt a periodic
//!    task if an interrupt is ready
//! 4. **Arbitrate**: if the CPU is free, pick the next task
//!    (see [`arbitration`](crate::arbitration))
//! 5. **Budgets**: deadline misses and critical-run violations
//! 6. **Waiting bars** for every ready periodic task left waiting
//! 7. **Release**: let the running task's worker do one unit of work and
//!    fold its report
//!
//! Every state transition happens on the thread calling into the
//! scheduler. Workers only report results.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, trace, warn};

use crate::arbitration;
use crate::config::{SimConfig, CONSUMER_ID, FIRST_INTERRUPT_ID, PRODUCER_ID};
use crate::error::{ConfigError, Param, SchedulerError};
use crate::event::{
    BarHeight, CrossTaskAction, CrossTaskRequest, Lifecycle, Marker, Notification, Property,
    TaskEffect,
};
use crate::sync::{ModelClock, SampleQueue, TickGate};
use crate::task::{
    EventTriggers, TaskClass, TaskConfig, TaskControlBlock, TaskId, TaskKind, TaskMode, TaskState,
    Tick,
};
use crate::worker::{WorkOutcome, WorkReport, WorkerEnv};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Scheduler run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Stopped,
    Running,
    Paused,
    /// The run reached `max_ticks`. Terminal until the next stop.
    Done,
}

/// What a call to [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was processed; `executed` is the task released on it.
    Processed { tick: Tick, executed: Option<TaskId> },
    /// The clock reached the end of the run.
    Done { tick: Tick },
    /// The scheduler is not running.
    Idle,
}

/// A single parameter change on a periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    Period(u32),
    CriticalDelay(u32),
    CriticalRun(u32),
    Priority(i32),
    Session(u32),
    StartTime(Option<Tick>),
    StopTime(Option<Tick>),
    /// Consumer only: raise `StopNow` every N sessions.
    StopEventPeriod(Option<u32>),
    /// Consumer only: raise `Pause` every N sessions.
    PauseEventPeriod(Option<u32>),
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The central scheduler state.
///
/// ## Design Notes
///
/// - Periodic tasks live at the front of `tasks` for the whole life of the
///   scheduler; interrupt tasks are appended and removed as they come and go
/// - `active` names the task owning the CPU; the task itself stays in
///   `tasks`
/// - The clock and the sample FIFO are never shared mutably; workers get a
///   snapshot and a channel endpoint
pub struct Scheduler {
    config: SimConfig,
    status: SchedulerStatus,
    clock: ModelClock,
    tasks: Vec<TaskControlBlock>,
    active: Option<TaskId>,
    /// Interrupt tasks waiting for their start time.
    pending_interrupts: Vec<(TaskId, TaskConfig)>,
    /// Cross-task requests raised during the previous tick.
    requests: VecDeque<CrossTaskRequest>,
    next_interrupt_id: TaskId,
    env: WorkerEnv,
    reports: Receiver<WorkReport>,
    notifications: Sender<Notification>,
}

impl Scheduler {
    /// Create a stopped scheduler with the two periodic tasks of `config`.
    ///
    /// Returns the scheduler and the receiving end of its notifications.
    pub fn new(config: SimConfig) -> Result<(Self, Receiver<Notification>), SchedulerError> {
        config.producer.validate_periodic()?;
        config.consumer.validate_periodic()?;
        config.consumer_triggers.validate()?;
        if config.producer.priority == config.consumer.priority {
            return Err(ConfigError::DuplicatePriority {
                priority: config.consumer.priority,
                other: PRODUCER_ID,
            }
            .into());
        }

        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let (note_tx, note_rx) = crossbeam_channel::unbounded();
        let env = WorkerEnv {
            gate: Arc::new(TickGate::new()),
            reports: report_tx,
            samples: SampleQueue::new(),
            sample_fn: config.sample_fn.clone(),
            threshold: config.signal.middle(),
        };
        let tasks = vec![
            TaskControlBlock::periodic(PRODUCER_ID, TaskClass::Producer, config.producer, None),
            TaskControlBlock::periodic(
                CONSUMER_ID,
                TaskClass::Consumer,
                config.consumer,
                Some(config.consumer_triggers),
            ),
        ];

        let scheduler = Self {
            config,
            status: SchedulerStatus::Stopped,
            clock: ModelClock::new(),
            tasks,
            active: None,
            pending_interrupts: Vec::new(),
            requests: VecDeque::new(),
            next_interrupt_id: FIRST_INTERRUPT_ID,
            env,
            reports: report_rx,
            notifications: note_tx,
        };
        Ok((scheduler, note_rx))
    }

    // --- queries ----------------------------------------------------------

    pub fn status(&self) -> SchedulerStatus {
        self.status
    }

    pub fn current_time(&self) -> Tick {
        self.clock.now()
    }

    /// The task owning the CPU, if any.
    pub fn active_task(&self) -> Option<TaskId> {
        self.active
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskControlBlock> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks(&self) -> &[TaskControlBlock] {
        &self.tasks
    }

    /// Samples produced but not yet consumed.
    pub fn sample_backlog(&self) -> usize {
        self.env.samples.len()
    }

    /// Planned release ticks of a periodic task within the run window.
    pub fn planned_releases(&self, id: TaskId) -> Result<Vec<Tick>, SchedulerError> {
        let idx = self.periodic_index(id)?;
        Ok(self.tasks[idx].planned_releases(self.config.max_ticks))
    }

    // --- lifecycle --------------------------------------------------------

    /// Start a fresh run from `Stopped`, or resume from `Paused`.
    ///
    /// Starting processes the current tick right away. Calling it while
    /// running is a no-op; after `Done` the scheduler must be stopped first.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.status {
            SchedulerStatus::Stopped => {
                self.clock.reset();
                self.emit(Notification::PropertyChanged(Property::CurrentTime(0)));
                self.emit(Notification::Lifecycle(Lifecycle::Started));
                self.emit_planned_markers();
                info!("scheduler started");
            }
            SchedulerStatus::Paused => {
                self.emit(Notification::Lifecycle(Lifecycle::Resumed));
                info!("scheduler resumed at tick {}", self.clock.now());
            }
            SchedulerStatus::Running => return Ok(()),
            SchedulerStatus::Done => {
                warn!("start ignored: run already finished, stop the scheduler first");
                return Ok(());
            }
        }
        self.status = SchedulerStatus::Running;
        self.process_tick()?;
        Ok(())
    }

    /// Freeze at the next tick boundary. The frozen tick is processed on
    /// resume. Ignored when fewer than two ticks remain.
    pub fn pause(&mut self) {
        if self.status != SchedulerStatus::Running {
            return;
        }
        if self.clock.now() + 1 >= self.config.max_ticks {
            debug!("pause ignored at tick {}: run is ending", self.clock.now());
            return;
        }
        let now = self.clock.advance();
        self.emit(Notification::PropertyChanged(Property::CurrentTime(now)));
        self.status = SchedulerStatus::Paused;
        self.emit(Notification::Lifecycle(Lifecycle::Paused));
        info!("scheduler paused at tick {now}");
    }

    /// Stop every task, drop all interrupts and reset the clock.
    pub fn stop(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
        self.tasks.retain(|t| t.kind() == TaskKind::Periodic);
        self.pending_interrupts.clear();
        self.requests.clear();
        self.next_interrupt_id = FIRST_INTERRUPT_ID;
        self.active = None;
        self.clock.reset();

        let dropped = self.env.samples.clear();
        if dropped > 0 {
            debug!("dropped {dropped} unconsumed samples");
        }
        while self.reports.try_recv().is_ok() {}

        self.status = SchedulerStatus::Stopped;
        self.emit(Notification::PropertyChanged(Property::CurrentTime(0)));
        self.emit(Notification::Lifecycle(Lifecycle::Stopped));
        info!("scheduler stopped");
    }

    /// Advance the clock by one tick and run the decision algorithm.
    pub fn tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        if self.status != SchedulerStatus::Running {
            return Ok(TickOutcome::Idle);
        }

        let now = self.clock.advance();
        self.emit(Notification::PropertyChanged(Property::CurrentTime(now)));

        if now >= self.config.max_ticks {
            self.finish(now);
            return Ok(TickOutcome::Done { tick: now });
        }

        let executed = self.process_tick()?;
        Ok(TickOutcome::Processed {
            tick: now,
            executed,
        })
    }

    fn finish(&mut self, now: Tick) {
        for task in &mut self.tasks {
            task.stop_worker();
        }
        self.active = None;
        self.status = SchedulerStatus::Done;
        self.emit(Notification::Lifecycle(Lifecycle::Done));
        info!("scheduler done at tick {now}");
    }

    // --- commands ---------------------------------------------------------

    /// Request an interrupt task. It joins the task collection, ready to
    /// run, on the first tick at or after `start_time`.
    pub fn add_interrupt_task(
        &mut self,
        start_time: Tick,
        critical_run_time: u32,
        session_time: u32,
    ) -> Result<TaskId, SchedulerError> {
        let config = TaskConfig::interrupt(start_time, critical_run_time, session_time);
        config.validate_interrupt()?;

        let id = self.next_interrupt_id;
        self.next_interrupt_id += 1;
        self.pending_interrupts.push((id, config));
        debug!("interrupt task {id} requested for tick {start_time}");
        Ok(id)
    }

    /// Change one parameter of a periodic task.
    pub fn set_param(&mut self, id: TaskId, change: ParamChange) -> Result<(), SchedulerError> {
        let idx = self.periodic_index(id)?;
        let mut config = self.tasks[idx].config;
        let mut triggers = self.tasks[idx].triggers;

        match change {
            ParamChange::Period(v) => config.period_time = v,
            ParamChange::CriticalDelay(v) => config.critical_delay_time = v,
            ParamChange::CriticalRun(v) => config.critical_run_time = v,
            ParamChange::Priority(v) => config.priority = v,
            ParamChange::Session(v) => config.session_time = v,
            ParamChange::StartTime(t) => config.start_time = t,
            ParamChange::StopTime(t) => config.stop_time = t,
            ParamChange::StopEventPeriod(n) => {
                triggers_mut(&mut triggers, id, Param::StopEventPeriod)?.stop_every = n
            }
            ParamChange::PauseEventPeriod(n) => {
                triggers_mut(&mut triggers, id, Param::PauseEventPeriod)?.pause_every = n
            }
        }

        self.commit(idx, config, triggers)
    }

    /// Replace the whole configuration of a periodic task.
    pub fn configure(&mut self, id: TaskId, config: TaskConfig) -> Result<(), SchedulerError> {
        let idx = self.periodic_index(id)?;
        let triggers = self.tasks[idx].triggers;
        self.commit(idx, config, triggers)
    }

    fn commit(
        &mut self,
        idx: usize,
        config: TaskConfig,
        triggers: Option<EventTriggers>,
    ) -> Result<(), SchedulerError> {
        config.validate_periodic()?;
        if let Some(triggers) = &triggers {
            triggers.validate()?;
        }

        let id = self.tasks[idx].id;
        if let Some(other) = self
            .tasks
            .iter()
            .find(|t| t.is_periodic() && t.id != id && t.config.priority == config.priority)
        {
            return Err(ConfigError::DuplicatePriority {
                priority: config.priority,
                other: other.id,
            }
            .into());
        }

        let now = self.clock.now();
        let task = &self.tasks[idx];
        if let Some(start) = config.start_time {
            let changed = task.config.start_time != config.start_time;
            if changed && self.status != SchedulerStatus::Stopped && start <= now {
                return Err(ConfigError::StartInPast { start, now }.into());
            }
        }

        let task = &mut self.tasks[idx];
        let previous = std::mem::replace(&mut task.config, config);
        task.triggers = triggers;
        if previous.start_time != config.start_time {
            task.start_time = config.start_time;
        }
        if previous.stop_time != config.stop_time {
            task.stop_time = config.stop_time;
        }
        if previous.session_time != config.session_time {
            task.session_time = config.session_time;
        }
        debug!("task {id} reconfigured: {config:?}");

        if previous.start_time != config.start_time && self.status != SchedulerStatus::Stopped {
            self.emit_task_markers(idx);
        }
        Ok(())
    }

    /// Answer a deadline-miss request by putting the task back in line.
    pub fn skip(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let idx = self.periodic_index(id)?;
        let now = self.clock.now();
        let task = &mut self.tasks[idx];
        if !task.awaits_operator() {
            return Err(SchedulerError::NoPendingRequest(id));
        }
        task.arm(now);
        self.marker(id, now, Marker::Skip);
        info!("task {id} skipped its missed deadline");
        Ok(())
    }

    /// Deactivate a periodic task.
    pub fn shutdown(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let idx = self.periodic_index(id)?;
        let now = self.clock.now();
        self.tasks[idx].deactivate();
        if self.active == Some(id) {
            self.active = None;
        }
        self.marker(id, now, Marker::Shutdown);
        info!("task {id} shut down");
        Ok(())
    }

    /// Bring back a task paused by a cross-task request.
    pub fn resume_task(&mut self, id: TaskId) -> Result<(), SchedulerError> {
        let idx = self.periodic_index(id)?;
        let now = self.clock.now();
        let task = &mut self.tasks[idx];
        if !(task.state == TaskState::Paused && task.mode == TaskMode::Paused) {
            return Err(SchedulerError::NotPaused(id));
        }
        task.state = TaskState::Active;
        task.mode = TaskMode::WaitForReady;
        self.marker(id, now, Marker::Resume);
        info!("task {id} resumed");
        Ok(())
    }

    // --- per-tick algorithm -----------------------------------------------

    /// Run the tick body. A lost or unspawnable worker leaves the run in an
    /// unknown state, so the scheduler stops itself before reporting it.
    fn process_tick(&mut self) -> Result<Option<TaskId>, SchedulerError> {
        let result = self.run_tick_steps();
        if let Err(err) = &result {
            if err.is_fatal() {
                warn!("stopping the run: {err}");
                self.stop();
            }
        }
        result
    }

    fn run_tick_steps(&mut self) -> Result<Option<TaskId>, SchedulerError> {
        let now = self.clock.now();

        self.apply_requests(now);
        self.materialize_interrupts(now);
        self.update_periodic(now);
        self.settle_active(now);
        if self.active.is_none() {
            self.arbitrate(now)?;
        }
        self.assert_single_runner(now);
        self.enforce_budgets(now);
        self.emit_waiting(now);

        let executed = self.release_active(now)?;
        self.emit(Notification::Tick(now));
        Ok(executed)
    }

    fn apply_requests(&mut self, now: Tick) {
        while let Some(req) = self.requests.pop_front() {
            let Some(idx) = self.index_of(req.target).filter(|&i| self.tasks[i].is_periodic())
            else {
                debug!(
                    "task {} requested {:?} on unknown task {}",
                    req.source, req.action, req.target
                );
                continue;
            };

            let target = &mut self.tasks[idx];
            if target.state == TaskState::Active {
                match req.action {
                    CrossTaskAction::StopNow => {
                        target.stop_time = Some(req.tick);
                        self.marker(req.target, now, Marker::StopTime);
                    }
                    CrossTaskAction::Pause => {
                        target.pause();
                        if self.active == Some(req.target) {
                            self.active = None;
                        }
                        self.marker(req.target, now, Marker::Pause);
                    }
                }
                debug!(
                    "applied {:?} from task {} to task {}",
                    req.action, req.source, req.target
                );
            }
            self.marker(req.source, now, Marker::Event);
        }
    }

    fn materialize_interrupts(&mut self, now: Tick) {
        if self.pending_interrupts.is_empty() {
            return;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_interrupts)
            .into_iter()
            .partition(|(_, cfg)| cfg.start_time.map_or(true, |start| start <= now));
        self.pending_interrupts = waiting;

        for (id, cfg) in due {
            self.tasks.push(TaskControlBlock::interrupt(id, cfg, now));
            self.marker(id, now, Marker::StartTime);
            info!("interrupt task {id} raised at tick {now}");
        }
    }

    fn update_periodic(&mut self, now: Tick) {
        let mut events = Vec::new();
        for task in self.tasks.iter_mut().filter(|t| t.is_periodic()) {
            if task.state == TaskState::Inactive
                && task.mode == TaskMode::Disabled
                && task.start_time == Some(now)
            {
                task.arm(now);
                debug!("task {} activated at tick {now}", task.id);
            } else if task.state == TaskState::Active && task.stop_time.is_some_and(|s| now >= s) {
                task.deactivate();
                if self.active == Some(task.id) {
                    self.active = None;
                }
                events.push((task.id, Marker::StopTime));
                debug!("task {} reached its stop time at tick {now}", task.id);
            } else if task.state == TaskState::Active
                && task.mode == TaskMode::WaitForReady
                && task.on_period_boundary(now)
            {
                task.arm(now);
                trace!("task {} re-armed at tick {now}", task.id);
            }
        }
        for (id, marker) in events {
            self.marker(id, now, marker);
        }
    }

    fn settle_active(&mut self, now: Tick) {
        let Some(id) = self.active else {
            return;
        };
        let Some(idx) = self.index_of(id) else {
            self.active = None;
            return;
        };

        match self.tasks[idx].kind() {
            TaskKind::Interrupt => {
                if self.tasks[idx].session_complete() {
                    let mut done = self.tasks.remove(idx);
                    done.stop_worker();
                    self.active = None;
                    self.marker(id, now, Marker::StopTime);
                    info!("interrupt task {id} completed at tick {now}");
                }
            }
            TaskKind::Periodic => {
                if self.tasks[idx].session_complete() {
                    self.tasks[idx].complete_session();
                    self.active = None;
                    debug!("task {id} completed its session at tick {now}");
                } else if self.has_ready_interrupt() {
                    self.tasks[idx].interrupt_at(now);
                    self.active = None;
                    self.marker(id, now, Marker::Interrupt);
                    debug!("task {id} interrupted at tick {now}");
                }
            }
        }
    }

    fn has_ready_interrupt(&self) -> bool {
        self.tasks.iter().any(|t| {
            t.kind() == TaskKind::Interrupt
                && t.state == TaskState::Active
                && t.mode == TaskMode::WaitForRun
        })
    }

    fn arbitrate(&mut self, now: Tick) -> Result<(), SchedulerError> {
        let Some(idx) = arbitration::select(&self.tasks) else {
            return Ok(());
        };

        let task = &mut self.tasks[idx];
        let id = task.id;
        if task.mode == TaskMode::Interrupted {
            task.resume_after_interrupt();
            self.active = Some(id);
            self.marker(id, now, Marker::Continue);
            debug!("task {id} resumes after interrupt at tick {now}");
        } else {
            let raised = task
                .begin_session(&self.env, now)
                .map_err(|source| SchedulerError::Spawn { task: id, source })?;
            self.active = Some(id);
            self.requests.extend(raised);
        }
        Ok(())
    }

    fn assert_single_runner(&self, now: Tick) {
        let running = self
            .tasks
            .iter()
            .filter(|t| t.mode == TaskMode::Running)
            .count();
        assert!(running <= 1, "{running} tasks running at tick {now}");
    }

    fn enforce_budgets(&mut self, now: Tick) {
        let mut events = Vec::new();
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| t.is_periodic() && t.state == TaskState::Active)
        {
            if task.mode == TaskMode::WaitForRun
                && now.saturating_sub(task.time_when_become_wait_for_run)
                    >= task.config.critical_delay_time
            {
                task.suspend_for_operator();
                warn!("task {} missed its deadline at tick {now}", task.id);
                events.push(Notification::Marker {
                    task: task.id,
                    tick: now,
                    marker: Marker::Request,
                });
                events.push(Notification::DeadlineMiss {
                    task: task.id,
                    tick: now,
                });
            } else if task.mode == TaskMode::Running
                && task.running_time >= task.config.critical_run_time
            {
                task.break_session();
                if self.active == Some(task.id) {
                    self.active = None;
                }
                warn!(
                    "task {} broken off after {} ticks at tick {now}",
                    task.id, task.running_time
                );
                events.push(Notification::Marker {
                    task: task.id,
                    tick: now,
                    marker: Marker::Break,
                });
            }
        }
        for event in events {
            self.emit(event);
        }
    }

    fn emit_waiting(&self, now: Tick) {
        for task in self.tasks.iter().filter(|t| t.is_periodic() && t.is_candidate()) {
            self.emit(Notification::DrawState {
                task: task.id,
                tick: now,
                bar: BarHeight::Small,
            });
        }
    }

    fn release_active(&mut self, now: Tick) -> Result<Option<TaskId>, SchedulerError> {
        let Some(id) = self.active else {
            return Ok(None);
        };

        self.env.gate.release(id, self.clock.snapshot());
        let report = self.await_report(id, now)?;

        match report.outcome {
            WorkOutcome::Performed(effects) => {
                if let Some(idx) = self.index_of(id) {
                    self.tasks[idx].running_time += 1;
                }
                for effect in effects {
                    self.fold_effect(id, now, effect);
                }
            }
            WorkOutcome::SkippedResumeTick => {
                trace!("task {id} spent tick {now} resuming");
            }
        }
        Ok(Some(id))
    }

    fn await_report(&mut self, id: TaskId, now: Tick) -> Result<WorkReport, SchedulerError> {
        let deadline = Instant::now() + self.config.report_timeout;
        loop {
            match self.reports.recv_deadline(deadline) {
                Ok(report) if report.task == id && report.tick == now => return Ok(report),
                Ok(stale) => {
                    debug!(
                        "discarding stale report from task {} for tick {}",
                        stale.task, stale.tick
                    );
                }
                Err(_) => {
                    self.env.gate.revoke(id);
                    error!("worker for task {id} did not report tick {now}");
                    return Err(SchedulerError::WorkerLost { task: id, tick: now });
                }
            }
        }
    }

    fn fold_effect(&mut self, id: TaskId, now: Tick, effect: TaskEffect) {
        match effect {
            TaskEffect::Draw(bar) => self.emit(Notification::DrawState {
                task: id,
                tick: now,
                bar,
            }),
            TaskEffect::Io { op, value } => self.emit(Notification::Io {
                task: id,
                tick: now,
                op,
                value,
            }),
        }
    }

    // --- helpers ----------------------------------------------------------

    fn index_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn periodic_index(&self, id: TaskId) -> Result<usize, SchedulerError> {
        let idx = self.index_of(id).ok_or(SchedulerError::UnknownTask(id))?;
        if self.tasks[idx].is_periodic() {
            Ok(idx)
        } else {
            Err(SchedulerError::NotPeriodic(id))
        }
    }

    fn emit_planned_markers(&self) {
        for idx in 0..self.tasks.len() {
            if self.tasks[idx].is_periodic() {
                self.emit_task_markers(idx);
            }
        }
    }

    /// Start, planned and stop markers of one periodic task.
    fn emit_task_markers(&self, idx: usize) {
        let horizon = self.config.max_ticks;
        let task = &self.tasks[idx];
        let mut releases = task.planned_releases(horizon).into_iter();
        if let Some(start) = releases.next() {
            self.marker(task.id, start, Marker::StartTime);
        }
        for tick in releases {
            self.marker(task.id, tick, Marker::PlannedTime);
        }
        if let Some(stop) = task.stop_time.filter(|&s| s < horizon) {
            self.marker(task.id, stop, Marker::StopTime);
        }
    }

    fn marker(&self, task: TaskId, tick: Tick, marker: Marker) {
        self.emit(Notification::Marker { task, tick, marker });
    }

    fn emit(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            trace!("notification dropped: no observer");
        }
    }
}

fn triggers_mut(
    triggers: &mut Option<EventTriggers>,
    task: TaskId,
    param: Param,
) -> Result<&mut EventTriggers, SchedulerError> {
    triggers
        .as_mut()
        .ok_or(ConfigError::NotApplicable { param, task }.into())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::IoOp;
    use proptest::prelude::*;
    use std::time::Duration;

    fn periodic(priority: i32, period: u32, start: Tick) -> TaskConfig {
        TaskConfig {
            priority,
            period_time: period,
            session_time: 2,
            critical_run_time: 3,
            critical_delay_time: 10,
            start_time: Some(start),
            stop_time: None,
        }
    }

    /// Priority 1 / period 5 / start 1 against priority 2 / period 7 / start 2.
    fn two_task_config() -> SimConfig {
        SimConfig {
            report_timeout: Duration::from_secs(2),
            producer: periodic(1, 5, 1),
            consumer: periodic(2, 7, 2),
            ..SimConfig::default()
        }
    }

    fn started(config: SimConfig) -> (Scheduler, Receiver<Notification>) {
        let (mut scheduler, notes) = Scheduler::new(config).unwrap();
        scheduler.start().unwrap();
        (scheduler, notes)
    }

    fn run_to(scheduler: &mut Scheduler, tick: Tick) {
        while scheduler.current_time() < tick {
            scheduler.tick().unwrap();
        }
    }

    fn mode(scheduler: &Scheduler, id: TaskId) -> TaskMode {
        scheduler.task(id).unwrap().mode
    }

    #[test]
    fn test_new_rejects_duplicate_priorities() {
        let config = SimConfig {
            producer: periodic(3, 5, 1),
            consumer: periodic(3, 7, 2),
            ..SimConfig::default()
        };
        let err = Scheduler::new(config).err().unwrap();
        assert!(matches!(
            err,
            SchedulerError::Config(ConfigError::DuplicatePriority { priority: 3, .. })
        ));
    }

    #[test]
    fn test_start_processes_tick_zero() {
        let config = SimConfig {
            producer: periodic(1, 5, 0),
            ..two_task_config()
        };
        let (scheduler, notes) = started(config);
        assert_eq!(scheduler.status(), SchedulerStatus::Running);
        assert_eq!(scheduler.current_time(), 0);
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().running_time, 1);

        let notes: Vec<_> = notes.try_iter().collect();
        assert_eq!(notes[1], Notification::Lifecycle(Lifecycle::Started));
        assert!(notes.contains(&Notification::Tick(0)));
    }

    #[test]
    fn test_priority_one_wins_every_tie() {
        let (mut scheduler, _notes) = started(two_task_config());
        let mut consumer_sessions = 0;

        for tick in 1..=20 {
            run_to(&mut scheduler, tick);
            let consumer = scheduler.task(CONSUMER_ID).unwrap();
            if consumer.sessions_count > consumer_sessions {
                consumer_sessions = consumer.sessions_count;
                // The consumer only ever gets the CPU when the producer is
                // not waiting for it.
                assert_ne!(mode(&scheduler, PRODUCER_ID), TaskMode::WaitForRun);
            }
            if tick == 16 {
                // Both released on tick 16: the producer takes it.
                assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::Running);
                assert_eq!(mode(&scheduler, CONSUMER_ID), TaskMode::WaitForRun);
            }
        }
        assert_eq!(consumer_sessions, 3);
    }

    #[test]
    fn test_interrupt_preempts_and_resumes() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 9);
        assert_eq!(scheduler.active_task(), Some(CONSUMER_ID));

        let int_id = scheduler.add_interrupt_task(10, 2, 2).unwrap();
        assert_eq!(int_id, FIRST_INTERRUPT_ID);

        run_to(&mut scheduler, 10);
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.mode, TaskMode::Interrupted);
        assert_eq!(consumer.running_time, 1);
        assert_eq!(consumer.time_when_interrupted, Some(10));
        assert_eq!(mode(&scheduler, int_id), TaskMode::Running);

        run_to(&mut scheduler, 11);
        assert_eq!(mode(&scheduler, CONSUMER_ID), TaskMode::Interrupted);
        assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::WaitForRun);

        run_to(&mut scheduler, 12);
        assert!(scheduler.task(int_id).is_none());
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.mode, TaskMode::Running);
        assert_eq!(consumer.running_time, 1);
        assert_eq!(consumer.sessions_count, 2);

        let notes: Vec<_> = notes.try_iter().collect();
        assert!(notes.contains(&Notification::Marker {
            task: CONSUMER_ID,
            tick: 10,
            marker: Marker::Interrupt,
        }));
        assert!(notes.contains(&Notification::Marker {
            task: CONSUMER_ID,
            tick: 12,
            marker: Marker::Continue,
        }));
    }

    /// The tick a task resumes on after an interrupt does no work. This is
    /// kept as observed behavior, not as a claim that it is the right call.
    #[test]
    fn test_resume_after_interrupt_spends_one_tick_without_work() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 9);
        scheduler.add_interrupt_task(10, 2, 2).unwrap();
        run_to(&mut scheduler, 12);
        let _ = notes.try_iter().count();

        run_to(&mut scheduler, 13);
        assert_eq!(scheduler.task(CONSUMER_ID).unwrap().running_time, 2);

        let notes: Vec<_> = notes.try_iter().collect();
        assert!(notes.contains(&Notification::DrawState {
            task: CONSUMER_ID,
            tick: 13,
            bar: BarHeight::Big,
        }));
    }

    #[test]
    fn test_interrupt_beats_waiting_periodic() {
        let (mut scheduler, _notes) = started(two_task_config());
        scheduler.add_interrupt_task(1, 1, 1).unwrap();
        run_to(&mut scheduler, 1);
        assert_eq!(scheduler.active_task(), Some(FIRST_INTERRUPT_ID));
        assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::WaitForRun);

        run_to(&mut scheduler, 2);
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));
        assert_eq!(scheduler.tasks().len(), 2);
    }

    #[test]
    fn test_deadline_miss_raised_once_and_skip() {
        let config = SimConfig {
            report_timeout: Duration::from_secs(2),
            producer: TaskConfig {
                period_time: 10,
                session_time: 4,
                critical_run_time: 5,
                ..periodic(1, 10, 1)
            },
            consumer: TaskConfig {
                critical_delay_time: 3,
                ..periodic(2, 10, 1)
            },
            ..SimConfig::default()
        };
        let (mut scheduler, notes) = started(config);

        run_to(&mut scheduler, 3);
        assert_eq!(mode(&scheduler, CONSUMER_ID), TaskMode::WaitForRun);
        run_to(&mut scheduler, 4);
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.state, TaskState::Paused);
        assert_eq!(consumer.mode, TaskMode::Disabled);

        run_to(&mut scheduler, 8);
        let misses: Vec<_> = notes
            .try_iter()
            .filter(|n| matches!(n, Notification::DeadlineMiss { .. }))
            .collect();
        assert_eq!(
            misses,
            vec![Notification::DeadlineMiss {
                task: CONSUMER_ID,
                tick: 4
            }]
        );

        scheduler.skip(CONSUMER_ID).unwrap();
        assert_eq!(mode(&scheduler, CONSUMER_ID), TaskMode::WaitForRun);
        assert!(matches!(
            scheduler.skip(CONSUMER_ID),
            Err(SchedulerError::NoPendingRequest(CONSUMER_ID))
        ));
        run_to(&mut scheduler, 9);
        assert_eq!(scheduler.active_task(), Some(CONSUMER_ID));
    }

    #[test]
    fn test_shutdown_answers_deadline_request() {
        let config = SimConfig {
            producer: TaskConfig {
                session_time: 4,
                critical_run_time: 5,
                ..periodic(1, 10, 1)
            },
            consumer: TaskConfig {
                critical_delay_time: 1,
                ..periodic(2, 10, 1)
            },
            ..two_task_config()
        };
        let (mut scheduler, _notes) = started(config);
        run_to(&mut scheduler, 2);
        assert!(scheduler.task(CONSUMER_ID).unwrap().awaits_operator());

        scheduler.shutdown(CONSUMER_ID).unwrap();
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.state, TaskState::Inactive);
        assert_eq!(consumer.mode, TaskMode::Disabled);
        run_to(&mut scheduler, 20);
        assert_eq!(mode(&scheduler, CONSUMER_ID), TaskMode::Disabled);
    }

    #[test]
    fn test_consumer_budget_break_rolls_back_session() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 20);
        assert_eq!(scheduler.task(CONSUMER_ID).unwrap().session_time, 4);

        run_to(&mut scheduler, 21);
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.mode, TaskMode::WaitForReady);
        assert_eq!(consumer.session_time, 2);
        assert!(consumer.running_time <= consumer.config.critical_run_time);
        assert!(notes.try_iter().any(|n| n
            == Notification::Marker {
                task: CONSUMER_ID,
                tick: 21,
                marker: Marker::Break,
            }));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut scheduler, notes) = started(two_task_config());
        scheduler.add_interrupt_task(5, 2, 2).unwrap();
        scheduler.add_interrupt_task(40, 2, 2).unwrap();
        run_to(&mut scheduler, 6);

        scheduler.stop();
        let snapshot = |s: &Scheduler| {
            s.tasks()
                .iter()
                .map(|t| (t.id, t.state, t.mode, t.sessions_count, t.stop_time))
                .collect::<Vec<_>>()
        };
        let first = snapshot(&scheduler);
        assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
        assert_eq!(scheduler.current_time(), 0);
        assert_eq!(scheduler.active_task(), None);
        assert_eq!(scheduler.sample_backlog(), 0);
        assert_eq!(first.len(), 2);
        for (_, state, mode, sessions, _) in &first {
            assert_eq!(*state, TaskState::Inactive);
            assert_eq!(*mode, TaskMode::Disabled);
            assert_eq!(*sessions, 0);
        }
        let _ = notes.try_iter().count();

        scheduler.stop();
        assert_eq!(snapshot(&scheduler), first);
        assert_eq!(scheduler.current_time(), 0);
        let again: Vec<_> = notes.try_iter().collect();
        assert!(again.contains(&Notification::Lifecycle(Lifecycle::Stopped)));

        // Interrupt ids start over after a stop.
        assert_eq!(
            scheduler.add_interrupt_task(1, 1, 1).unwrap(),
            FIRST_INTERRUPT_ID
        );
    }

    #[test]
    fn test_pause_freezes_at_next_boundary() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 5);
        scheduler.pause();
        assert_eq!(scheduler.status(), SchedulerStatus::Paused);
        assert_eq!(scheduler.current_time(), 6);
        assert_eq!(scheduler.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(scheduler.current_time(), 6);

        let _ = notes.try_iter().count();
        scheduler.start().unwrap();
        assert_eq!(scheduler.status(), SchedulerStatus::Running);
        // The frozen tick is processed on resume: the producer re-arms on 6.
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));
        let notes: Vec<_> = notes.try_iter().collect();
        assert_eq!(notes[0], Notification::Lifecycle(Lifecycle::Resumed));
        assert!(notes.contains(&Notification::Tick(6)));
    }

    #[test]
    fn test_run_ends_done() {
        let config = SimConfig {
            max_ticks: 5,
            ..two_task_config()
        };
        let (mut scheduler, notes) = started(config);
        run_to(&mut scheduler, 4);
        scheduler.pause();
        assert_eq!(scheduler.status(), SchedulerStatus::Running);

        assert_eq!(scheduler.tick().unwrap(), TickOutcome::Done { tick: 5 });
        assert_eq!(scheduler.status(), SchedulerStatus::Done);
        assert_eq!(scheduler.tick().unwrap(), TickOutcome::Idle);
        assert!(scheduler.tasks().iter().all(|t| !t.has_worker()));

        scheduler.start().unwrap();
        assert_eq!(scheduler.status(), SchedulerStatus::Done);
        assert!(notes
            .try_iter()
            .any(|n| n == Notification::Lifecycle(Lifecycle::Done)));
    }

    #[test]
    fn test_cross_task_stop_request() {
        let config = SimConfig {
            consumer_triggers: EventTriggers {
                target: PRODUCER_ID,
                stop_every: Some(1),
                pause_every: None,
            },
            ..two_task_config()
        };
        let (mut scheduler, notes) = started(config);

        // The consumer starts its first session on tick 3 and raises the
        // request; it is folded in on tick 4.
        run_to(&mut scheduler, 3);
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().stop_time, None);
        run_to(&mut scheduler, 4);
        let producer = scheduler.task(PRODUCER_ID).unwrap();
        assert_eq!(producer.stop_time, Some(3));
        assert_eq!(producer.state, TaskState::Inactive);

        let notes: Vec<_> = notes.try_iter().collect();
        assert!(notes.contains(&Notification::Marker {
            task: CONSUMER_ID,
            tick: 4,
            marker: Marker::Event,
        }));

        // Reset restores the configured stop time.
        scheduler.stop();
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().stop_time, None);
    }

    #[test]
    fn test_cross_task_pause_and_resume() {
        let config = SimConfig {
            consumer_triggers: EventTriggers {
                target: PRODUCER_ID,
                stop_every: None,
                pause_every: Some(1),
            },
            ..two_task_config()
        };
        let (mut scheduler, _notes) = started(config);
        run_to(&mut scheduler, 4);
        let producer = scheduler.task(PRODUCER_ID).unwrap();
        assert_eq!(producer.state, TaskState::Paused);
        assert_eq!(producer.mode, TaskMode::Paused);

        // Not re-armed while paused.
        run_to(&mut scheduler, 6);
        assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::Paused);

        scheduler.resume_task(PRODUCER_ID).unwrap();
        assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::WaitForReady);
        assert!(matches!(
            scheduler.resume_task(PRODUCER_ID),
            Err(SchedulerError::NotPaused(PRODUCER_ID))
        ));
        scheduler
            .set_param(CONSUMER_ID, ParamChange::PauseEventPeriod(None))
            .unwrap();

        // Re-armed on 11, gets the CPU once the consumer finishes on 12.
        run_to(&mut scheduler, 11);
        assert_eq!(mode(&scheduler, PRODUCER_ID), TaskMode::WaitForRun);
        run_to(&mut scheduler, 12);
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));
    }

    #[test]
    fn test_cross_task_pause_abandons_running_activation() {
        let mut config = SimConfig {
            consumer_triggers: EventTriggers {
                target: CONSUMER_ID,
                stop_every: None,
                pause_every: Some(1),
            },
            ..two_task_config()
        };
        config.producer.start_time = None;
        let (mut scheduler, notes) = started(config);

        // The consumer starts on tick 2 and pauses itself; the request
        // lands on tick 3 while it still owns the CPU.
        run_to(&mut scheduler, 2);
        assert_eq!(scheduler.active_task(), Some(CONSUMER_ID));
        assert!(scheduler.task(CONSUMER_ID).unwrap().has_worker());

        run_to(&mut scheduler, 3);
        let consumer = scheduler.task(CONSUMER_ID).unwrap();
        assert_eq!(consumer.state, TaskState::Paused);
        assert_eq!(consumer.mode, TaskMode::Paused);
        assert!(!consumer.has_worker());
        assert_eq!(scheduler.active_task(), None);
        assert!(notes.try_iter().any(|n| n
            == Notification::Marker {
                task: CONSUMER_ID,
                tick: 3,
                marker: Marker::Pause,
            }));
    }

    #[test]
    fn test_unknown_cross_task_target_is_ignored() {
        let config = SimConfig {
            consumer_triggers: EventTriggers {
                target: 42,
                stop_every: Some(1),
                pause_every: Some(1),
            },
            ..two_task_config()
        };
        let (mut scheduler, _notes) = started(config);
        run_to(&mut scheduler, 10);
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().state, TaskState::Active);
    }

    #[test]
    fn test_param_validation() {
        let (mut scheduler, _notes) = Scheduler::new(two_task_config()).unwrap();

        let err = scheduler
            .set_param(PRODUCER_ID, ParamChange::Priority(2))
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Config(ConfigError::DuplicatePriority {
                priority: 2,
                other: CONSUMER_ID
            })
        ));

        let err = scheduler
            .set_param(PRODUCER_ID, ParamChange::Period(0))
            .unwrap_err();
        match err {
            SchedulerError::Config(e) => assert_eq!(e.param(), Param::Period),
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            scheduler.set_param(PRODUCER_ID, ParamChange::StopEventPeriod(Some(2))),
            Err(SchedulerError::Config(ConfigError::NotApplicable { .. }))
        ));
        assert!(matches!(
            scheduler.set_param(CONSUMER_ID, ParamChange::PauseEventPeriod(Some(0))),
            Err(SchedulerError::Config(ConfigError::NotPositive {
                param: Param::PauseEventPeriod
            }))
        ));
        assert!(matches!(
            scheduler.set_param(9, ParamChange::Period(5)),
            Err(SchedulerError::UnknownTask(9))
        ));

        // Rejected changes leave the configuration untouched.
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().config.period_time, 5);
        assert_eq!(scheduler.task(PRODUCER_ID).unwrap().config.priority, 1);

        scheduler
            .set_param(CONSUMER_ID, ParamChange::StopEventPeriod(Some(3)))
            .unwrap();
        scheduler
            .set_param(PRODUCER_ID, ParamChange::Session(3))
            .unwrap();
        let producer = scheduler.task(PRODUCER_ID).unwrap();
        assert_eq!(producer.session_time, 3);
        assert_eq!(
            scheduler.task(CONSUMER_ID).unwrap().triggers.unwrap().stop_every,
            Some(3)
        );
    }

    #[test]
    fn test_interrupt_validation_and_target_checks() {
        let (mut scheduler, _notes) = Scheduler::new(two_task_config()).unwrap();
        assert!(scheduler.add_interrupt_task(3, 1, 2).is_err());
        assert!(scheduler.add_interrupt_task(3, 2, 0).is_err());

        let id = scheduler.add_interrupt_task(1, 2, 2).unwrap();
        scheduler.start().unwrap();
        run_to(&mut scheduler, 1);
        assert!(matches!(
            scheduler.set_param(id, ParamChange::Period(5)),
            Err(SchedulerError::NotPeriodic(_))
        ));
    }

    #[test]
    fn test_start_time_in_past_rejected_while_running() {
        let (mut scheduler, _notes) = started(two_task_config());
        run_to(&mut scheduler, 5);
        assert!(matches!(
            scheduler.set_param(PRODUCER_ID, ParamChange::StartTime(Some(3))),
            Err(SchedulerError::Config(ConfigError::StartInPast { start: 3, now: 5 }))
        ));
        scheduler
            .set_param(PRODUCER_ID, ParamChange::StartTime(Some(6)))
            .unwrap();
    }

    #[test]
    fn test_start_time_change_while_running_redraws_plan() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 5);
        let _ = notes.try_iter().count();

        scheduler
            .set_param(PRODUCER_ID, ParamChange::StartTime(Some(8)))
            .unwrap();
        let markers: Vec<_> = notes
            .try_iter()
            .filter_map(|n| match n {
                Notification::Marker {
                    task: PRODUCER_ID,
                    tick,
                    marker,
                } => Some((tick, marker)),
                _ => None,
            })
            .collect();
        assert_eq!(markers[0], (8, Marker::StartTime));
        assert_eq!(markers[1], (13, Marker::PlannedTime));
        assert_eq!(markers.len(), 12);

        // Stopped: the plan is drawn by the next start instead.
        scheduler.stop();
        let _ = notes.try_iter().count();
        scheduler
            .set_param(PRODUCER_ID, ParamChange::StartTime(Some(3)))
            .unwrap();
        assert_eq!(notes.try_iter().count(), 0);
    }

    #[test]
    fn test_lost_worker_stops_the_run() {
        let config = SimConfig {
            report_timeout: Duration::from_millis(100),
            ..two_task_config()
        };
        let (mut scheduler, notes) = started(config);
        run_to(&mut scheduler, 1);
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));

        // Kill the producer's worker behind the scheduler's back.
        let idx = scheduler.index_of(PRODUCER_ID).unwrap();
        scheduler.tasks[idx].stop_worker();
        let _ = notes.try_iter().count();

        let err = scheduler.tick().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::WorkerLost {
                task: PRODUCER_ID,
                tick: 2
            }
        ));
        assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
        assert_eq!(scheduler.active_task(), None);
        assert_eq!(scheduler.current_time(), 0);
        assert!(scheduler.tasks().iter().all(|t| !t.has_worker()));
        assert!(scheduler
            .tasks()
            .iter()
            .all(|t| t.mode == TaskMode::Disabled));
        assert!(notes
            .try_iter()
            .any(|n| n == Notification::Lifecycle(Lifecycle::Stopped)));

        // Later ticks are idle and a fresh start works again.
        assert_eq!(scheduler.tick().unwrap(), TickOutcome::Idle);
        scheduler.start().unwrap();
        run_to(&mut scheduler, 1);
        assert_eq!(scheduler.active_task(), Some(PRODUCER_ID));
    }

    #[test]
    fn test_sample_pipeline() {
        let (mut scheduler, notes) = started(two_task_config());
        run_to(&mut scheduler, 30);
        let notes: Vec<_> = notes.try_iter().collect();
        let reads = notes
            .iter()
            .filter(|n| matches!(n, Notification::Io { op: IoOp::Read, task: PRODUCER_ID, .. }))
            .count();
        let writes = notes
            .iter()
            .filter(|n| matches!(n, Notification::Io { op: IoOp::Write, task: CONSUMER_ID, .. }))
            .count();
        assert!(reads > 0);
        assert!(writes > 0);
        assert_eq!(scheduler.sample_backlog(), reads - writes);
    }

    #[test]
    fn test_planned_markers_on_start() {
        let (scheduler, notes) = started(two_task_config());
        assert_eq!(
            scheduler.planned_releases(PRODUCER_ID).unwrap()[..3],
            [1, 6, 11]
        );
        let planned = notes
            .try_iter()
            .filter(|n| {
                matches!(
                    n,
                    Notification::Marker {
                        task: PRODUCER_ID,
                        marker: Marker::PlannedTime,
                        ..
                    }
                )
            })
            .count();
        // 6, 11, ..., 61
        assert_eq!(planned, 12);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_periodic_rearm_has_no_drift(period in 2u32..10, start in 0u32..10, session_seed in 0u32..8) {
            let session = 1 + session_seed % (period - 1);
            let config = SimConfig {
                report_timeout: Duration::from_secs(2),
                producer: TaskConfig {
                    priority: 1,
                    period_time: period,
                    session_time: session,
                    critical_run_time: session,
                    critical_delay_time: 1,
                    start_time: Some(start),
                    stop_time: None,
                },
                consumer: TaskConfig {
                    start_time: None,
                    ..periodic(2, 7, 0)
                },
                ..SimConfig::default()
            };
            let (mut scheduler, _notes) = started(config);
            let mut releases = Vec::new();
            let mut sessions = 0;
            loop {
                let producer = scheduler.task(PRODUCER_ID).unwrap();
                if producer.sessions_count > sessions {
                    sessions = producer.sessions_count;
                    releases.push(scheduler.current_time());
                }
                if scheduler.tick().unwrap() == (TickOutcome::Done { tick: 65 }) {
                    break;
                }
            }
            let expected: Vec<Tick> = (start..65).step_by(period as usize).collect();
            prop_assert_eq!(releases, expected);
        }

        #[test]
        fn prop_at_most_one_task_running(interrupts in proptest::collection::vec((1u32..40, 1u32..4), 0..4)) {
            let (mut scheduler, _notes) = started(two_task_config());
            for (start, session) in interrupts {
                scheduler.add_interrupt_task(start, session, session).unwrap();
            }
            for _ in 0..45 {
                scheduler.tick().unwrap();
                let running = scheduler
                    .tasks()
                    .iter()
                    .filter(|t| t.mode == TaskMode::Running)
                    .count();
                prop_assert!(running <= 1);
                if let Some(id) = scheduler.active_task() {
                    prop_assert_eq!(mode(&scheduler, id), TaskMode::Running);
                }
            }
        }
    }
}
