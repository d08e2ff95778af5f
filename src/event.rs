//! # Events
//!
//! Outbound notifications for observers (the visualizer boundary) and the
//! cross-task requests that task workers hand back to the scheduler.

use crate::task::{TaskId, Tick};

/// Height class of a bar in the activity diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarHeight {
    /// The task executed on this tick.
    Big,
    /// The task was ready but waiting on this tick.
    Small,
}

impl BarHeight {
    /// Height in diagram points.
    pub const fn points(self) -> u32 {
        match self {
            BarHeight::Big => 15,
            BarHeight::Small => 5,
        }
    }
}

/// Direction of a sample operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
}

/// Scheduler lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Started,
    Paused,
    Resumed,
    Stopped,
    Done,
}

/// Observable scheduler property that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    CurrentTime(Tick),
}

/// Point-in-time annotations for the activity diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    StartTime,
    StopTime,
    /// A planned periodic release inside the run window.
    PlannedTime,
    Interrupt,
    Continue,
    /// Forced suspension after exceeding the critical run time.
    Break,
    /// The task raised a cross-task request.
    Event,
    Pause,
    Resume,
    /// The scheduler asked the operator what to do with the task.
    Request,
    Skip,
    Shutdown,
}

/// Everything the scheduler tells its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Lifecycle(Lifecycle),
    /// A tick finished processing.
    Tick(Tick),
    DrawState {
        task: TaskId,
        tick: Tick,
        bar: BarHeight,
    },
    Io {
        task: TaskId,
        tick: Tick,
        op: IoOp,
        value: bool,
    },
    /// A periodic task waited past its critical delay time and needs an
    /// operator decision (skip or shutdown).
    DeadlineMiss {
        task: TaskId,
        tick: Tick,
    },
    Marker {
        task: TaskId,
        tick: Tick,
        marker: Marker,
    },
    PropertyChanged(Property),
}

// ---------------------------------------------------------------------------
// Cross-task requests
// ---------------------------------------------------------------------------

/// Parameter change one task asks the scheduler to make on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossTaskAction {
    /// Set the target's stop time to the tick the request was raised on.
    StopNow,
    /// Suspend the target until an operator resumes it.
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossTaskRequest {
    pub source: TaskId,
    pub target: TaskId,
    pub action: CrossTaskAction,
    pub tick: Tick,
}

/// Result of one unit of work, produced on a worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEffect {
    Draw(BarHeight),
    Io { op: IoOp, value: bool },
}
