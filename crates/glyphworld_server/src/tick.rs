//! # Server Tick Loop
//!
//! Fixed-timestep simulation driver.
//!
//! ## Design
//!
//! Every frame adds elapsed wall time to an accumulator and runs whole
//! ticks out of it:
//! - Elapsed time is clamped, so a suspended process does not come back
//!   to a huge burst of ticks
//! - At most `max_catchup_ticks` run per frame; surplus time beyond that
//!   is discarded and reported as lag
//! - Each tick runs pre-tick, tick, then post-tick handlers, each list in
//!   registration order
//! - A failing handler is reported and the remaining handlers still run
//!
//! Handlers are synchronous. Anything slow must run elsewhere and report
//! back through a channel that a pre-tick handler drains.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::TickError;

/// Capacity of the signal channel. Signals beyond it are dropped.
const SIGNAL_CAPACITY: usize = 1024;

/// Fraction of the tick budget after which a tick counts as slow.
const SLOW_TICK_FRACTION: f64 = 0.8;

/// Read-only facts about the tick being run.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    /// Tick number, starting at 0.
    pub tick: u64,
    /// Simulated time per tick.
    pub delta: Duration,
    /// Wall time of the frame that runs this tick.
    pub timestamp: Instant,
    /// Time still in the accumulator when this tick started.
    pub lag: Duration,
}

/// Which handler list a handler belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickPhase {
    /// Input and command processing.
    PreTick,
    /// Simulation.
    Tick,
    /// Broadcast and rendering.
    PostTick,
}

/// Diagnostics emitted by the loop.
#[derive(Clone, Debug, PartialEq)]
pub enum TickSignal {
    /// The loop went from idle to running.
    Started,
    /// The loop went from running to idle.
    Stopped,
    /// The catch-up limit was hit and surplus time was thrown away.
    LagWarning {
        /// Last tick run this frame.
        tick: u64,
        /// Simulation time discarded.
        dropped: Duration,
    },
    /// A handler returned an error.
    TickError {
        /// Tick during which it failed.
        tick: u64,
        /// Phase of the handler.
        phase: TickPhase,
        /// Handler name.
        handler: String,
        /// The error.
        error: TickError,
    },
    /// A tick used more than 80% of its budget.
    SlowTick {
        /// The slow tick.
        tick: u64,
        /// How long it took.
        duration: Duration,
        /// The budget.
        budget: Duration,
    },
}

/// A unit of per-tick work over state `S`.
///
/// Closures of the right shape implement this automatically.
pub trait TickHandler<S>: Send {
    /// Runs the handler for one tick.
    ///
    /// # Errors
    ///
    /// Any error is reported by the loop, which then moves on.
    fn run(&mut self, ctx: &TickContext, state: &mut S) -> Result<(), TickError>;
}

impl<S, F> TickHandler<S> for F
where
    F: FnMut(&TickContext, &mut S) -> Result<(), TickError> + Send,
{
    fn run(&mut self, ctx: &TickContext, state: &mut S) -> Result<(), TickError> {
        self(ctx, state)
    }
}

struct Registered<S> {
    name: String,
    handler: Box<dyn TickHandler<S>>,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Number of slow ticks (over 80% of budget).
    pub slow_ticks: u64,
    /// Number of late ticks (took longer than budget).
    pub late_ticks: u64,
    /// Number of handler errors.
    pub handler_errors: u64,
    /// Frames where surplus time was discarded.
    pub lag_events: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    const fn fresh(budget: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: budget.as_micros() as u64,
            slow_ticks: 0,
            late_ticks: 0,
            handler_errors: 0,
            lag_events: 0,
            total_ticks: 0,
        }
    }
}

/// What one call to [`TickLoop::frame`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Ticks run.
    pub ticks_run: u32,
    /// Simulation time thrown away, if the catch-up limit was hit.
    pub dropped: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Idle,
    Running,
}

/// Fixed-timestep tick loop controller over state `S`.
pub struct TickLoop<S> {
    /// Target tick duration.
    tick_duration: Duration,
    /// Longest elapsed time a single frame may account for.
    max_frame: Duration,
    /// Ticks allowed per frame.
    max_catchup: u32,
    state: LoopState,
    /// Time of the previous frame.
    last_frame: Option<Instant>,
    /// Unsimulated time.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    stats: TickStats,
    pre_tick: Vec<Registered<S>>,
    tick: Vec<Registered<S>>,
    post_tick: Vec<Registered<S>>,
    signals: Option<Sender<TickSignal>>,
}

impl<S> TickLoop<S> {
    /// Creates an idle loop.
    ///
    /// A zero tick rate is treated as 1Hz; a zero catch-up limit as 1.
    #[must_use]
    pub fn new(tick_rate: u32, max_frame: Duration, max_catchup: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            max_frame: max_frame.max(tick_duration),
            max_catchup: max_catchup.max(1),
            state: LoopState::Idle,
            last_frame: None,
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
            pre_tick: Vec::new(),
            tick: Vec::new(),
            post_tick: Vec::new(),
            signals: None,
        }
    }

    /// Registers a handler in `phase`. Runs after those already there.
    pub fn add_handler<H>(&mut self, phase: TickPhase, name: impl Into<String>, handler: H)
    where
        H: TickHandler<S> + 'static,
    {
        let entry = Registered {
            name: name.into(),
            handler: Box::new(handler),
        };
        match phase {
            TickPhase::PreTick => self.pre_tick.push(entry),
            TickPhase::Tick => self.tick.push(entry),
            TickPhase::PostTick => self.post_tick.push(entry),
        }
    }

    /// Registers a pre-tick handler.
    pub fn on_pre_tick<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: TickHandler<S> + 'static,
    {
        self.add_handler(TickPhase::PreTick, name, handler);
    }

    /// Registers a tick handler.
    pub fn on_tick<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: TickHandler<S> + 'static,
    {
        self.add_handler(TickPhase::Tick, name, handler);
    }

    /// Registers a post-tick handler.
    pub fn on_post_tick<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: TickHandler<S> + 'static,
    {
        self.add_handler(TickPhase::PostTick, name, handler);
    }

    /// Returns a receiver for loop signals, replacing any earlier one.
    pub fn subscribe(&mut self) -> Receiver<TickSignal> {
        let (tx, rx) = bounded(SIGNAL_CAPACITY);
        self.signals = Some(tx);
        rx
    }

    /// Idle to running. Returns false if already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state == LoopState::Running {
            return false;
        }
        self.state = LoopState::Running;
        self.last_frame = Some(now);
        self.accumulator = Duration::ZERO;
        self.emit(TickSignal::Started);
        true
    }

    /// Running to idle. Returns false if already idle.
    pub fn stop(&mut self) -> bool {
        if self.state == LoopState::Idle {
            return false;
        }
        self.state = LoopState::Idle;
        self.last_frame = None;
        self.emit(TickSignal::Stopped);
        true
    }

    /// Whether the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Advances the simulation to `now`.
    ///
    /// Does nothing while idle.
    pub fn frame(&mut self, now: Instant, state: &mut S) -> FrameReport {
        let mut report = FrameReport::default();
        let Some(last) = self.last_frame else {
            return report;
        };
        if self.state != LoopState::Running {
            return report;
        }

        let elapsed = now.saturating_duration_since(last).min(self.max_frame);
        self.last_frame = Some(now);
        self.accumulator += elapsed;

        while self.accumulator >= self.tick_duration && report.ticks_run < self.max_catchup {
            let ctx = TickContext {
                tick: self.tick_count,
                delta: self.tick_duration,
                timestamp: now,
                lag: self.accumulator,
            };
            self.run_tick(&ctx, state);
            self.accumulator -= self.tick_duration;
            self.tick_count += 1;
            report.ticks_run += 1;
        }

        if self.accumulator >= self.tick_duration {
            let interval = self.tick_duration.as_nanos();
            let kept = Duration::from_nanos((self.accumulator.as_nanos() % interval) as u64);
            let dropped = self.accumulator - kept;
            self.accumulator = kept;
            self.stats.lag_events += 1;
            report.dropped = Some(dropped);
            self.emit(TickSignal::LagWarning {
                tick: self.tick_count.saturating_sub(1),
                dropped,
            });
        }

        report
    }

    fn run_tick(&mut self, ctx: &TickContext, state: &mut S) {
        let start = Instant::now();

        for phase in [TickPhase::PreTick, TickPhase::Tick, TickPhase::PostTick] {
            let list = match phase {
                TickPhase::PreTick => &mut self.pre_tick,
                TickPhase::Tick => &mut self.tick,
                TickPhase::PostTick => &mut self.post_tick,
            };
            let mut failures = Vec::new();
            for entry in list.iter_mut() {
                if let Err(err) = entry.handler.run(ctx, state) {
                    failures.push(TickSignal::TickError {
                        tick: ctx.tick,
                        phase,
                        handler: entry.name.clone(),
                        error: err,
                    });
                }
            }
            for failure in failures {
                self.stats.handler_errors += 1;
                self.emit(failure);
            }
        }

        let duration = start.elapsed();
        self.record(ctx.tick, duration);
    }

    fn record(&mut self, tick: u64, duration: Duration) {
        let duration_us = duration.as_micros() as u64;

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        // Rolling average
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + duration_us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
        }
        if duration.as_secs_f64() > self.tick_duration.as_secs_f64() * SLOW_TICK_FRACTION {
            self.stats.slow_ticks += 1;
            self.emit(TickSignal::SlowTick {
                tick,
                duration,
                budget: self.tick_duration,
            });
        }
    }

    fn emit(&self, signal: TickSignal) {
        match &signal {
            TickSignal::Started => info!(tick = self.tick_count, "tick loop started"),
            TickSignal::Stopped => info!(tick = self.tick_count, "tick loop stopped"),
            TickSignal::LagWarning { tick, dropped } => {
                warn!(tick, dropped_ms = dropped.as_millis() as u64, "tick loop behind, discarding time");
            }
            TickSignal::TickError {
                tick,
                phase,
                handler,
                error,
            } => error!(tick, ?phase, handler = %handler, %error, "tick handler failed"),
            TickSignal::SlowTick { tick, duration, .. } => {
                warn!(tick, duration_us = duration.as_micros() as u64, "slow tick");
            }
        }
        if let Some(tx) = &self.signals {
            if let Err(TrySendError::Full(_)) = tx.try_send(signal) {
                debug!("tick signal channel full, signal dropped");
            }
        }
    }

    /// Returns the current tick count.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Returns the target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Time waiting in the accumulator.
    #[must_use]
    pub const fn accumulator(&self) -> Duration {
        self.accumulator
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

/// Drives `tick_loop` from a tokio interval until `shutdown` turns true.
///
/// The interval only schedules frames; simulated time always comes from
/// the accumulator, so missed timer ticks are made up by catch-up.
pub async fn run_tick_loop<S>(
    tick_loop: &mut TickLoop<S>,
    state: &mut S,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(tick_loop.tick_duration());
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tick_loop.start(Instant::now());

    loop {
        tokio::select! {
            _ = timer.tick() => {
                tick_loop.frame(Instant::now(), state);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tick_loop.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_tick_loop_creation() {
        let tick_loop: TickLoop<()> = TickLoop::new(20, ms(250), 5);
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.tick_duration(), ms(50));
        assert!(!tick_loop.is_running());
    }

    #[test]
    fn test_idle_loop_does_nothing() {
        let mut tick_loop: TickLoop<u32> = TickLoop::new(20, ms(250), 5);
        tick_loop.on_tick("count", |_: &TickContext, n: &mut u32| -> Result<(), TickError> {
            *n += 1;
            Ok(())
        });
        let mut count = 0;
        let report = tick_loop.frame(Instant::now() + ms(500), &mut count);

        assert_eq!(report.ticks_run, 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_accumulates_partial_frames() {
        let mut tick_loop: TickLoop<u32> = TickLoop::new(20, ms(250), 5);
        tick_loop.on_tick("count", |_: &TickContext, n: &mut u32| -> Result<(), TickError> {
            *n += 1;
            Ok(())
        });
        let t0 = Instant::now();
        tick_loop.start(t0);
        let mut count = 0;

        assert_eq!(tick_loop.frame(t0 + ms(30), &mut count).ticks_run, 0);
        assert_eq!(tick_loop.frame(t0 + ms(60), &mut count).ticks_run, 1);
        assert_eq!(tick_loop.frame(t0 + ms(160), &mut count).ticks_run, 2);
        assert_eq!(count, 3);
        assert_eq!(tick_loop.accumulator(), ms(10));
    }

    #[test]
    fn test_catchup_bounded_and_lag_signalled() {
        // 10ms ticks, frames may account for up to 1s, 3 ticks per frame.
        let mut tick_loop: TickLoop<u32> = TickLoop::new(100, ms(1000), 3);
        let signals = tick_loop.subscribe();
        tick_loop.on_tick("count", |_: &TickContext, n: &mut u32| -> Result<(), TickError> {
            *n += 1;
            Ok(())
        });
        let t0 = Instant::now();
        tick_loop.start(t0);
        let mut count = 0;

        let report = tick_loop.frame(t0 + ms(500) + Duration::from_micros(2500), &mut count);

        assert_eq!(report.ticks_run, 3);
        assert_eq!(count, 3);
        assert_eq!(report.dropped, Some(ms(470)));
        assert_eq!(tick_loop.accumulator(), Duration::from_micros(2500));

        let lag = signals
            .try_iter()
            .find(|s| matches!(s, TickSignal::LagWarning { .. }));
        assert_eq!(
            lag,
            Some(TickSignal::LagWarning {
                tick: 2,
                dropped: ms(470)
            })
        );
    }

    #[test]
    fn test_elapsed_is_clamped() {
        let mut tick_loop: TickLoop<u32> = TickLoop::new(20, ms(250), 100);
        tick_loop.on_tick("count", |_: &TickContext, n: &mut u32| -> Result<(), TickError> {
            *n += 1;
            Ok(())
        });
        let t0 = Instant::now();
        tick_loop.start(t0);
        let mut count = 0;

        // An hour-long suspension is worth at most 250ms of simulation.
        let report = tick_loop.frame(t0 + Duration::from_secs(3600), &mut count);
        assert_eq!(report.ticks_run, 5);
        assert_eq!(report.dropped, None);
    }

    #[test]
    fn test_phase_and_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tick_loop: TickLoop<()> = TickLoop::new(20, ms(250), 5);

        for (phase, name) in [
            (TickPhase::PostTick, "post-a"),
            (TickPhase::Tick, "tick-a"),
            (TickPhase::PreTick, "pre-a"),
            (TickPhase::Tick, "tick-b"),
            (TickPhase::PreTick, "pre-b"),
        ] {
            let log = Arc::clone(&log);
            tick_loop.add_handler(phase, name, move |_: &TickContext, _: &mut ()| -> Result<(), TickError> {
                log.lock().push(name);
                Ok(())
            });
        }

        let t0 = Instant::now();
        tick_loop.start(t0);
        tick_loop.frame(t0 + ms(50), &mut ());

        assert_eq!(
            *log.lock(),
            vec!["pre-a", "pre-b", "tick-a", "tick-b", "post-a"]
        );
    }

    #[test]
    fn test_handler_error_is_isolated() {
        let mut tick_loop: TickLoop<Vec<u64>> = TickLoop::new(20, ms(250), 5);
        let signals = tick_loop.subscribe();
        tick_loop.on_tick("flaky", |ctx: &TickContext, _: &mut Vec<u64>| -> Result<(), TickError> {
            if ctx.tick == 1 {
                Err(TickError::handler("flaky", "boom"))
            } else {
                Ok(())
            }
        });
        tick_loop.on_tick("record", |ctx: &TickContext, seen: &mut Vec<u64>| -> Result<(), TickError> {
            seen.push(ctx.tick);
            Ok(())
        });

        let t0 = Instant::now();
        tick_loop.start(t0);
        let mut seen = Vec::new();
        tick_loop.frame(t0 + ms(150), &mut seen);

        // The handler after the failing one still ran on tick 1.
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(tick_loop.stats().handler_errors, 1);

        let errors: Vec<TickSignal> = signals
            .try_iter()
            .filter(|s| matches!(s, TickSignal::TickError { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            TickSignal::TickError {
                tick,
                phase,
                handler,
                ..
            } => {
                assert_eq!(*tick, 1);
                assert_eq!(*phase, TickPhase::Tick);
                assert_eq!(handler, "flaky");
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn test_slow_tick_signalled() {
        let mut tick_loop: TickLoop<()> = TickLoop::new(1000, ms(250), 1);
        let signals = tick_loop.subscribe();
        tick_loop.on_tick("sleepy", |_: &TickContext, _: &mut ()| -> Result<(), TickError> {
            std::thread::sleep(ms(2));
            Ok(())
        });

        let t0 = Instant::now();
        tick_loop.start(t0);
        tick_loop.frame(t0 + ms(1), &mut ());

        assert!(signals
            .try_iter()
            .any(|s| matches!(s, TickSignal::SlowTick { tick: 0, .. })));
        assert_eq!(tick_loop.stats().late_ticks, 1);
    }

    #[test]
    fn test_stop_and_restart() {
        let mut tick_loop: TickLoop<u32> = TickLoop::new(20, ms(250), 5);
        let t0 = Instant::now();
        assert!(tick_loop.start(t0));
        assert!(!tick_loop.start(t0));
        assert!(tick_loop.stop());
        assert!(!tick_loop.stop());

        let mut count = 0;
        assert_eq!(tick_loop.frame(t0 + ms(100), &mut count).ticks_run, 0);

        tick_loop.start(t0 + ms(100));
        assert_eq!(tick_loop.frame(t0 + ms(150), &mut count).ticks_run, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_driver_stops_on_shutdown() {
        let mut tick_loop: TickLoop<u32> = TickLoop::new(100, ms(250), 5);
        tick_loop.on_tick("count", |_: &TickContext, n: &mut u32| -> Result<(), TickError> {
            *n += 1;
            Ok(())
        });
        let (tx, rx) = watch::channel(false);

        let driver = tokio::spawn(async move {
            let mut count = 0u32;
            run_tick_loop(&mut tick_loop, &mut count, rx).await;
            (tick_loop.is_running(), tick_loop.tick_count())
        });

        tokio::time::sleep(ms(200)).await;
        tx.send(true).expect("driver alive");
        let (running, _ticks) = driver.await.expect("driver task");

        assert!(!running);
    }
}
