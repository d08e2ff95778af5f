//! # Errors
//!
//! Configuration errors are raised at the parameter-setting boundary and
//! name the offending parameter together with the violated constraint.
//! Scheduler errors cover lookups, operator commands and worker failures.
//! Neither is ever raised for reaching the end of a run.

use std::fmt;

use crate::task::{TaskId, Tick};

/// Task parameter named by a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Period,
    Session,
    CriticalRun,
    CriticalDelay,
    Priority,
    StartTime,
    StopTime,
    StopEventPeriod,
    PauseEventPeriod,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Param::Period => "period time",
            Param::Session => "session time",
            Param::CriticalRun => "critical run time",
            Param::CriticalDelay => "critical delay time",
            Param::Priority => "priority",
            Param::StartTime => "start time",
            Param::StopTime => "stop time",
            Param::StopEventPeriod => "stop event period",
            Param::PauseEventPeriod => "pause event period",
        };
        f.write_str(name)
    }
}

/// An invalid task parameter. Never clamped, always rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{param} must be positive")]
    NotPositive { param: Param },

    #[error("period time ({period}) must not be less than session time ({session})")]
    PeriodBelowSession { period: u32, session: u32 },

    #[error("period time ({period}) must be greater than critical run time ({critical_run})")]
    PeriodNotAboveCriticalRun { period: u32, critical_run: u32 },

    #[error("critical run time ({critical_run}) must not be less than session time ({session})")]
    CriticalRunBelowSession { critical_run: u32, session: u32 },

    #[error("priority {priority} is already used by periodic task {other}")]
    DuplicatePriority { priority: i32, other: TaskId },

    #[error("start time {start} is already in the past (current tick {now})")]
    StartInPast { start: Tick, now: Tick },

    #[error("{param} does not apply to task {task}")]
    NotApplicable { param: Param, task: TaskId },
}

impl ConfigError {
    /// The parameter the boundary layer should highlight.
    pub fn param(&self) -> Param {
        match self {
            ConfigError::NotPositive { param } => *param,
            ConfigError::PeriodBelowSession { .. } => Param::Period,
            ConfigError::PeriodNotAboveCriticalRun { .. } => Param::Period,
            ConfigError::CriticalRunBelowSession { .. } => Param::CriticalRun,
            ConfigError::DuplicatePriority { .. } => Param::Priority,
            ConfigError::StartInPast { .. } => Param::StartTime,
            ConfigError::NotApplicable { param, .. } => *param,
        }
    }
}

/// Failure of a scheduler or kernel operation.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no task with id {0}")]
    UnknownTask(TaskId),

    #[error("task {0} is not a periodic task")]
    NotPeriodic(TaskId),

    #[error("task {0} has no pending deadline request")]
    NoPendingRequest(TaskId),

    #[error("task {0} is not paused")]
    NotPaused(TaskId),

    #[error("failed to spawn worker for task {task}: {source}")]
    Spawn {
        task: TaskId,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for task {task} did not report tick {tick}")]
    WorkerLost { task: TaskId, tick: Tick },

    #[error("failed to spawn kernel driver: {0}")]
    DriverSpawn(#[source] std::io::Error),

    #[error("kernel driver is no longer running")]
    KernelGone,
}

impl SchedulerError {
    /// Worker failures leave the run in an unknown state; the kernel stops
    /// the scheduler when it sees one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Spawn { .. } | SchedulerError::WorkerLost { .. }
        )
    }
}
