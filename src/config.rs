//! # TickOS Configuration
//!
//! Default constants for the simulated system and the injectable
//! [`SimConfig`] that carries them into a [`Scheduler`](crate::scheduler::Scheduler).
//! Nothing in the scheduler reads these constants directly; tests and the
//! demo binary override whatever they need through `SimConfig`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::task::{EventTriggers, TaskConfig, TaskId, Tick};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Wall-clock length of one logical tick when driven by the kernel thread.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Length of a simulation run. The scheduler reaches `Done` on this tick.
pub const MAX_WORKING_TIME: Tick = 65;

/// Maximum value of the sample signal.
pub const FUNC_MAX: f64 = 1.571;

/// Minimum value of the sample signal.
pub const FUNC_MIN: f64 = 0.197;

/// Argument at which the sample signal peaks.
pub const FUNC_MAX_ARG: f64 = 0.0;

/// Argument at which the sample signal bottoms out.
pub const FUNC_MIN_ARG: f64 = 13.0;

/// How long the scheduler waits for a released worker to report its unit
/// of work before declaring it lost.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Id of periodic task A (the sample producer).
pub const PRODUCER_ID: TaskId = 0;

/// Id of periodic task B (the sample consumer).
pub const CONSUMER_ID: TaskId = 1;

/// First id handed out to interrupt tasks.
pub const FIRST_INTERRUPT_ID: TaskId = 2;

// ---------------------------------------------------------------------------
// Sample signal
// ---------------------------------------------------------------------------

/// Function producing the sample value for a given tick.
pub type SampleFn = Arc<dyn Fn(Tick) -> f64 + Send + Sync>;

/// Default sample signal: a saw-tooth of arc-cotangents repeating every
/// 13 ticks, from [`FUNC_MAX`] at `t mod 13 == 0` down towards [`FUNC_MIN`].
pub fn default_sample(t: Tick) -> f64 {
    SignalConfig::default().sample(t)
}

/// Range of the sample signal. The consumer turns each sample into a
/// discrete value by comparing it against [`SignalConfig::middle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalConfig {
    pub max: f64,
    pub min: f64,
    pub max_arg: f64,
    pub min_arg: f64,
}

impl SignalConfig {
    /// Threshold between the `false` and `true` discrete values.
    pub fn middle(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Arc-cotangent saw-tooth peaking at `max_arg` and repeating every
    /// `min_arg - max_arg` ticks.
    pub fn sample(&self, t: Tick) -> f64 {
        let span = self.min_arg - self.max_arg;
        let phase = (f64::from(t) - self.max_arg).rem_euclid(span);
        let x = phase / (span / 20.0) / 4.0;
        // acot(0) is pi/2, which `atan(inf)` gives us for free.
        (1.0 / x).atan()
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            max: FUNC_MAX,
            min: FUNC_MIN,
            max_arg: FUNC_MAX_ARG,
            min_arg: FUNC_MIN_ARG,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation configuration
// ---------------------------------------------------------------------------

/// Everything a scheduler needs to know about the simulated system.
#[derive(Clone)]
pub struct SimConfig {
    /// Wall-clock pacing of the kernel's tick driver.
    pub tick_interval: Duration,
    /// The run ends (status `Done`) when the clock reaches this tick.
    pub max_ticks: Tick,
    pub signal: SignalConfig,
    pub sample_fn: SampleFn,
    pub report_timeout: Duration,
    /// Initial configuration of periodic task A.
    pub producer: TaskConfig,
    /// Initial configuration of periodic task B.
    pub consumer: TaskConfig,
    /// Cross-task triggers carried by task B.
    pub consumer_triggers: EventTriggers,
}

impl SimConfig {
    /// Replace the sample signal.
    pub fn with_sample_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Tick) -> f64 + Send + Sync + 'static,
    {
        self.sample_fn = Arc::new(f);
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        let signal = SignalConfig::default();
        Self {
            tick_interval: TICK_INTERVAL,
            max_ticks: MAX_WORKING_TIME,
            signal,
            sample_fn: Arc::new(move |t| signal.sample(t)),
            report_timeout: REPORT_TIMEOUT,
            producer: TaskConfig {
                priority: 1,
                period_time: 5,
                session_time: 2,
                critical_run_time: 3,
                critical_delay_time: 4,
                start_time: None,
                stop_time: None,
            },
            consumer: TaskConfig {
                priority: 2,
                period_time: 7,
                session_time: 2,
                critical_run_time: 4,
                critical_delay_time: 5,
                start_time: None,
                stop_time: None,
            },
            consumer_triggers: EventTriggers {
                target: PRODUCER_ID,
                stop_every: None,
                pause_every: None,
            },
        }
    }
}

impl fmt::Debug for SimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimConfig")
            .field("tick_interval", &self.tick_interval)
            .field("max_ticks", &self.max_ticks)
            .field("signal", &self.signal)
            .field("report_timeout", &self.report_timeout)
            .field("producer", &self.producer)
            .field("consumer", &self.consumer)
            .field("consumer_triggers", &self.consumer_triggers)
            .finish_non_exhaustive()
    }
}
