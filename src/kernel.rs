//! # Kernel
//!
//! Top-level runtime and public API for TickOS.
//!
//! The kernel owns the [`Scheduler`] on a dedicated driver thread and paces
//! it with a wall-clock ticker. Every public method sends a command to the
//! driver and waits for its reply, so all scheduling decisions stay on one
//! thread no matter who calls in.
//!
//! ## Startup Sequence
//!
//! ```text
//! Kernel::spawn(config)
//!   ├─► Scheduler::new()          ← Validate tasks, wire the worker env
//!   └─► driver thread
//!         ├─► commands            ← start / stop / pause / edits / queries
//!         └─► ticker              ← Scheduler::tick() every interval,
//!                                   armed only while Running
//! ```

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::error::SchedulerError;
use crate::event::{Lifecycle, Notification};
use crate::scheduler::{ParamChange, Scheduler, SchedulerStatus};
use crate::task::{TaskConfig, TaskId, Tick};

type Reply<T> = Sender<Result<T, SchedulerError>>;

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStatus {
    pub status: SchedulerStatus,
    pub current_time: Tick,
    pub active_task: Option<TaskId>,
}

enum Command {
    Start(Reply<()>),
    Stop(Reply<()>),
    Pause(Reply<()>),
    AddInterrupt {
        start_time: Tick,
        critical_run_time: u32,
        session_time: u32,
        reply: Reply<TaskId>,
    },
    SetParam {
        task: TaskId,
        change: ParamChange,
        reply: Reply<()>,
    },
    Configure {
        task: TaskId,
        config: TaskConfig,
        reply: Reply<()>,
    },
    Skip(TaskId, Reply<()>),
    Shutdown(TaskId, Reply<()>),
    Resume(TaskId, Reply<()>),
    Status(Reply<KernelStatus>),
    Exit,
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Handle to a running TickOS instance.
///
/// Dropping the handle stops the scheduler and joins the driver thread.
pub struct Kernel {
    commands: Sender<Command>,
    notifications: Receiver<Notification>,
    driver: Option<JoinHandle<()>>,
}

impl Kernel {
    /// Validate `config`, build the scheduler and start the driver thread.
    /// The scheduler starts out `Stopped`.
    pub fn spawn(config: SimConfig) -> Result<Self, SchedulerError> {
        let interval = config.tick_interval;
        let (scheduler, notifications) = Scheduler::new(config)?;
        let (tx, rx) = unbounded();

        let driver = thread::Builder::new()
            .name("tickos-driver".into())
            .spawn(move || Driver::new(scheduler, rx, interval).run())
            .map_err(SchedulerError::DriverSpawn)?;

        info!("kernel up, tick interval {interval:?}");
        Ok(Self {
            commands: tx,
            notifications,
            driver: Some(driver),
        })
    }

    /// Observer side of the scheduler's notification stream.
    pub fn notifications(&self) -> &Receiver<Notification> {
        &self.notifications
    }

    pub fn start(&self) -> Result<(), SchedulerError> {
        self.request(Command::Start)
    }

    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.request(Command::Stop)
    }

    pub fn pause(&self) -> Result<(), SchedulerError> {
        self.request(Command::Pause)
    }

    pub fn add_interrupt_task(
        &self,
        start_time: Tick,
        critical_run_time: u32,
        session_time: u32,
    ) -> Result<TaskId, SchedulerError> {
        self.request(|reply| Command::AddInterrupt {
            start_time,
            critical_run_time,
            session_time,
            reply,
        })
    }

    pub fn set_param(&self, task: TaskId, change: ParamChange) -> Result<(), SchedulerError> {
        self.request(|reply| Command::SetParam {
            task,
            change,
            reply,
        })
    }

    pub fn configure(&self, task: TaskId, config: TaskConfig) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Configure {
            task,
            config,
            reply,
        })
    }

    /// Operator answer to a deadline miss: run the task anyway.
    pub fn skip(&self, task: TaskId) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Skip(task, reply))
    }

    /// Operator answer to a deadline miss: take the task out of the run.
    pub fn shutdown(&self, task: TaskId) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Shutdown(task, reply))
    }

    pub fn resume_task(&self, task: TaskId) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Resume(task, reply))
    }

    pub fn status(&self) -> Result<KernelStatus, SchedulerError> {
        self.request(Command::Status)
    }

    /// Block until the run ends or `timeout` elapses, passing every
    /// notification to `observe` on the way. Returns whether the run ended.
    pub fn run_until_done<F>(&self, timeout: Duration, mut observe: F) -> bool
    where
        F: FnMut(&Notification),
    {
        let deadline = Instant::now() + timeout;
        while let Ok(note) = self.notifications.recv_deadline(deadline) {
            observe(&note);
            if note == Notification::Lifecycle(Lifecycle::Done) {
                return true;
            }
        }
        false
    }

    /// Stop the scheduler and join the driver thread.
    pub fn exit(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        let _ = self.commands.send(Command::Exit);
        if driver.join().is_err() {
            error!("kernel driver panicked");
        }
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, SchedulerError> {
        let (tx, rx) = bounded(1);
        self.commands
            .send(build(tx))
            .map_err(|_| SchedulerError::KernelGone)?;
        rx.recv().map_err(|_| SchedulerError::KernelGone)?
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.halt();
    }
}

// ---------------------------------------------------------------------------
// Driver thread
// ---------------------------------------------------------------------------

struct Driver {
    scheduler: Scheduler,
    commands: Receiver<Command>,
    interval: Duration,
    ticker: Receiver<Instant>,
    armed_for: SchedulerStatus,
}

impl Driver {
    fn new(scheduler: Scheduler, commands: Receiver<Command>, interval: Duration) -> Self {
        let armed_for = scheduler.status();
        Self {
            scheduler,
            commands,
            interval,
            ticker: never(),
            armed_for,
        }
    }

    fn run(mut self) {
        loop {
            let commands = self.commands.clone();
            let ticker = self.ticker.clone();
            select! {
                recv(commands) -> msg => match msg {
                    Ok(Command::Exit) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(ticker) -> _ => {
                    if let Err(err) = self.scheduler.tick() {
                        self.fail(&err);
                    }
                }
            }
            self.rearm();
        }
        self.scheduler.stop();
        debug!("kernel driver exited");
    }

    /// The ticker only fires while the scheduler is running. It is rebuilt
    /// on status changes so a resume does not inherit a stale tick.
    fn rearm(&mut self) {
        let status = self.scheduler.status();
        if status == self.armed_for {
            return;
        }
        self.armed_for = status;
        self.ticker = if status == SchedulerStatus::Running {
            tick(self.interval)
        } else {
            never()
        };
    }

    fn handle(&mut self, command: Command) {
        let s = &mut self.scheduler;
        match command {
            Command::Start(reply) => {
                let result = s.start();
                if let Err(err) = &result {
                    self.fail(err);
                }
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                s.stop();
                let _ = reply.send(Ok(()));
            }
            Command::Pause(reply) => {
                s.pause();
                let _ = reply.send(Ok(()));
            }
            Command::AddInterrupt {
                start_time,
                critical_run_time,
                session_time,
                reply,
            } => {
                let result = s.add_interrupt_task(start_time, critical_run_time, session_time);
                answer(reply, result);
            }
            Command::SetParam {
                task,
                change,
                reply,
            } => {
                answer(reply, s.set_param(task, change));
            }
            Command::Configure {
                task,
                config,
                reply,
            } => {
                answer(reply, s.configure(task, config));
            }
            Command::Skip(task, reply) => {
                answer(reply, s.skip(task));
            }
            Command::Shutdown(task, reply) => {
                answer(reply, s.shutdown(task));
            }
            Command::Resume(task, reply) => {
                answer(reply, s.resume_task(task));
            }
            Command::Status(reply) => {
                let _ = reply.send(Ok(KernelStatus {
                    status: s.status(),
                    current_time: s.current_time(),
                    active_task: s.active_task(),
                }));
            }
            Command::Exit => {}
        }
    }

    /// The scheduler has already stopped itself if `err` is fatal.
    fn fail(&self, err: &SchedulerError) {
        error!("scheduler failed: {err}");
    }
}

fn answer<T>(reply: Reply<T>, result: Result<T, SchedulerError>) {
    if let Err(err) = &result {
        warn!("command rejected: {err}");
    }
    let _ = reply.send(result);
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
