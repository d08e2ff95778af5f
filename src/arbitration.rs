//! # Arbitration
//!
//! Picks the task that owns the CPU for a tick when nothing is running.
//!
//! ## Rules
//!
//! Candidates are tasks with `state == Active` and mode `WaitForRun` or
//! `Interrupted`. Walking the collection in order, the current pick is
//! replaced when:
//!
//! | Current pick | Challenger | Replaced if |
//! |---|---|---|
//! | periodic | interrupt | always |
//! | periodic, not interrupted | periodic, interrupted | always |
//! | periodic, not interrupted | periodic, not interrupted | challenger has a lower priority value |
//! | interrupt | anything | never |
//!
//! Everything else keeps the earlier pick, so ties fall to collection order.
//! Equal priorities between periodic tasks are rejected at configuration
//! time, which keeps that fallback from ever deciding between them.

use crate::task::{TaskControlBlock, TaskKind, TaskMode};

/// Index of the task to run, or `None` if no task is ready.
pub fn select(tasks: &[TaskControlBlock]) -> Option<usize> {
    let mut pick: Option<usize> = None;

    for (i, task) in tasks.iter().enumerate() {
        if !task.is_candidate() {
            continue;
        }
        let Some(best) = pick else {
            pick = Some(i);
            continue;
        };
        if outranks(task, &tasks[best]) {
            pick = Some(i);
        }
    }

    pick
}

/// Whether `challenger` takes the CPU from the current `pick`.
fn outranks(challenger: &TaskControlBlock, pick: &TaskControlBlock) -> bool {
    match (pick.kind(), challenger.kind()) {
        (TaskKind::Periodic, TaskKind::Interrupt) => true,
        (TaskKind::Periodic, TaskKind::Periodic) => {
            let pick_resumes = pick.mode == TaskMode::Interrupted;
            let challenger_resumes = challenger.mode == TaskMode::Interrupted;
            if pick_resumes {
                false
            } else if challenger_resumes {
                true
            } else {
                challenger.config.priority < pick.config.priority
            }
        }
        (TaskKind::Interrupt, _) => false,
    }
}
