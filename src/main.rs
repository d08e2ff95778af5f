//! # TickOS Demo
//!
//! Runs one simulation to completion and logs every notification:
//!
//! | Task | Id | Priority | Period | Session | Behavior |
//! |------|----|----------|--------|---------|----------|
//! | Producer | 0 | 1 | 5 | 2 | Samples the signal into the FIFO |
//! | Consumer | 1 | 2 | 7 | 2+ | Writes discretized samples, grows its session |
//! | Interrupt | 2.. | - | - | `--interrupt-session` | Preempts periodic work |
//!
//! Deadline misses are answered automatically with `--on-miss`.
//!
//! ```text
//! RUST_LOG=debug tickos --interval-ms 20 --interrupt-at 10 --interrupt-at 31
//! ```

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, trace, warn};

use tickos::event::{Lifecycle, Marker};
use tickos::{Kernel, Notification, SimConfig, Tick};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnMiss {
    /// Put the task back in line.
    Skip,
    /// Take the task out of the run.
    Shutdown,
}

/// Tick-driven RTOS scheduler simulator.
#[derive(Debug, Parser)]
#[command(name = "tickos", version, about)]
struct Args {
    /// Ticks in the run.
    #[arg(long, default_value_t = tickos::config::MAX_WORKING_TIME)]
    max_ticks: Tick,

    /// Wall-clock milliseconds per tick.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Start tick of the producer.
    #[arg(long, default_value_t = 1)]
    producer_start: Tick,

    /// Start tick of the consumer.
    #[arg(long, default_value_t = 2)]
    consumer_start: Tick,

    /// Raise an interrupt task at this tick. Repeatable.
    #[arg(long = "interrupt-at")]
    interrupt_at: Vec<Tick>,

    #[arg(long, default_value_t = 2)]
    interrupt_session: u32,

    #[arg(long, default_value_t = 3)]
    interrupt_critical_run: u32,

    /// Every N-th consumer session stops the producer.
    #[arg(long)]
    stop_every: Option<u32>,

    /// Every N-th consumer session pauses the producer.
    #[arg(long)]
    pause_every: Option<u32>,

    #[arg(long, value_enum, default_value_t = OnMiss::Skip)]
    on_miss: OnMiss,
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig {
            tick_interval: Duration::from_millis(self.interval_ms),
            max_ticks: self.max_ticks,
            ..SimConfig::default()
        };
        config.producer.start_time = Some(self.producer_start);
        config.consumer.start_time = Some(self.consumer_start);
        config.consumer_triggers.stop_every = self.stop_every;
        config.consumer_triggers.pause_every = self.pause_every;
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let kernel = Kernel::spawn(args.sim_config()).context("invalid simulation config")?;
    for &tick in &args.interrupt_at {
        let id = kernel
            .add_interrupt_task(tick, args.interrupt_critical_run, args.interrupt_session)
            .with_context(|| format!("interrupt at tick {tick}"))?;
        info!("interrupt task {id} scheduled for tick {tick}");
    }
    kernel.start()?;

    let budget = Duration::from_millis(args.interval_ms) * (args.max_ticks + 10);
    let done = kernel.run_until_done(budget, |note| {
        log_notification(note);
        if let Notification::DeadlineMiss { task, .. } = *note {
            let answer = match args.on_miss {
                OnMiss::Skip => kernel.skip(task),
                OnMiss::Shutdown => kernel.shutdown(task),
            };
            if let Err(err) = answer {
                warn!("could not answer deadline miss of task {task}: {err}");
            }
        }
    });

    let status = kernel.status()?;
    kernel.exit();
    if !done {
        bail!("run did not finish (stopped at tick {})", status.current_time);
    }
    info!("run finished at tick {}", status.current_time);
    Ok(())
}

fn log_notification(note: &Notification) {
    match note {
        Notification::Lifecycle(Lifecycle::Done) => info!("run complete"),
        Notification::Lifecycle(l) => info!("scheduler {l:?}"),
        Notification::Tick(t) => debug!("tick {t}"),
        Notification::DrawState { task, tick, bar } => {
            trace!("task {task} bar {} at {tick}", bar.points())
        }
        Notification::Io {
            task,
            tick,
            op,
            value,
        } => info!("task {task} {op:?} {} at {tick}", u8::from(*value)),
        Notification::DeadlineMiss { task, tick } => {
            warn!("task {task} missed its deadline at {tick}")
        }
        Notification::Marker {
            task,
            tick,
            marker: marker @ (Marker::Interrupt | Marker::Continue | Marker::Break | Marker::Event),
        } => info!("task {task} {marker:?} at {tick}"),
        Notification::Marker { .. } | Notification::PropertyChanged(_) => {}
    }
}
