//! # TickOS — tick-driven RTOS scheduler simulator
//!
//! A discrete-time model of a single-CPU real-time operating system running
//! two periodic tasks and any number of sporadic interrupt tasks.
//!
//! ## Overview
//!
//! Time advances in integer ticks. On every tick the scheduler decides which
//! single task owns the CPU, lets that task's worker thread do exactly one
//! unit of work, and reports what happened to its observers:
//!
//! - **Periodic task A** samples a signal into a FIFO queue
//! - **Periodic task B** drains the queue, writes a discretized value and can
//!   ask the scheduler to stop or pause task A
//! - **Interrupt tasks** preempt whatever periodic task is running and are
//!   destroyed once their session completes
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                Observers (main.rs, tests)              │
//! ├────────────────────────────────────────────────────────┤
//! │                  Kernel API (kernel.rs)                │
//! │      spawn() · start() · pause() · stop() · skip()     │
//! ├──────────────┬────────────────────┬────────────────────┤
//! │  Scheduler   │   Arbitration      │  Notifications     │
//! │ scheduler.rs │   arbitration.rs   │  event.rs          │
//! │  ─ tick()    │   ─ select()       │  ─ Notification    │
//! │  ─ requests  │                    │  ─ Marker          │
//! ├──────────────┴────────────────────┴────────────────────┤
//! │              Task Model (task.rs)                      │
//! │    TCB · TaskConfig · TaskState · TaskMode             │
//! ├────────────────────────────────────────────────────────┤
//! │      Workers (worker.rs, workload.rs, sync.rs)         │
//! │    thread per activation · TickGate · SampleQueue      │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! - **One decision thread**: the scheduler mutates all task state
//! - **Worker threads** only wait for their release, do their work and send
//!   back a report; they never touch the task collection
//! - **Lock-step ticks**: the scheduler waits for the released worker's
//!   report before the tick ends, so at most one task is ever `Running`

pub mod arbitration;
pub mod config;
pub mod error;
pub mod event;
pub mod kernel;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod worker;
pub mod workload;

pub use config::SimConfig;
pub use error::{ConfigError, SchedulerError};
pub use event::Notification;
pub use kernel::{Kernel, KernelStatus};
pub use scheduler::{ParamChange, Scheduler, SchedulerStatus, TickOutcome};
pub use task::{TaskConfig, TaskId, Tick};
