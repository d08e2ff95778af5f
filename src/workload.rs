//! # Workloads
//!
//! What each task class does with one released tick. Work units run on the
//! task's worker thread and only *describe* their results as
//! [`TaskEffect`]s; the scheduler turns them into notifications and state
//! changes after the worker reports back.

use crate::config::SampleFn;
use crate::event::{BarHeight, IoOp, TaskEffect};
use crate::sync::{SampleConsumer, SampleProducer, TickSnapshot};
use crate::task::TaskClass;
use crate::worker::WorkerEnv;

/// One tick's worth of work for a task.
pub trait WorkUnit: Send {
    fn perform(&mut self, now: &TickSnapshot) -> Vec<TaskEffect>;
}

/// Build the work unit for a task class, wiring it to the shared resources
/// in `env`.
pub fn for_class(class: TaskClass, env: &WorkerEnv) -> Box<dyn WorkUnit> {
    match class {
        TaskClass::Producer => Box::new(ProducerWork {
            samples: env.samples.producer(),
            sample_fn: env.sample_fn.clone(),
        }),
        TaskClass::Consumer => Box::new(ConsumerWork {
            samples: env.samples.consumer(),
            threshold: env.threshold,
        }),
        TaskClass::Interrupt => Box::new(InterruptWork),
    }
}

/// Periodic task A: samples the signal and appends it to the FIFO.
pub struct ProducerWork {
    samples: SampleProducer,
    sample_fn: SampleFn,
}

impl WorkUnit for ProducerWork {
    fn perform(&mut self, now: &TickSnapshot) -> Vec<TaskEffect> {
        self.samples.push((self.sample_fn)(now.tick));
        vec![
            TaskEffect::Draw(BarHeight::Big),
            TaskEffect::Io {
                op: IoOp::Read,
                value: false,
            },
        ]
    }
}

/// Periodic task B: pops one sample, if any, and writes its discrete value.
pub struct ConsumerWork {
    samples: SampleConsumer,
    threshold: f64,
}

impl WorkUnit for ConsumerWork {
    fn perform(&mut self, _now: &TickSnapshot) -> Vec<TaskEffect> {
        let mut effects = vec![TaskEffect::Draw(BarHeight::Big)];
        // An empty queue is not an error; the write is simply skipped.
        if let Some(sample) = self.samples.try_pop() {
            effects.push(TaskEffect::Io {
                op: IoOp::Write,
                value: sample > self.threshold,
            });
        }
        effects
    }
}

/// Interrupt handler: occupies the CPU and nothing else.
pub struct InterruptWork;

impl WorkUnit for InterruptWork {
    fn perform(&mut self, _now: &TickSnapshot) -> Vec<TaskEffect> {
        vec![TaskEffect::Draw(BarHeight::Big)]
    }
}
