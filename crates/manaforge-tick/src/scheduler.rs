//! The wall-clock tick driver.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};

use crate::{TickConfig, TickPolicy};

/// One fired tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// 1 for the first tick, then +1 per tick.
    pub tick: u64,
    /// Nominal tick length. Constant for a given scheduler.
    pub dt: Duration,
    /// The tick fired noticeably late (more than a tenth of `dt`).
    pub overrun: bool,
    /// Grid slots dropped by the overrun policy before this tick.
    pub ticks_skipped: u64,
}

/// Running totals, updated as ticks fire and finish.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of the work time reported through
    /// [`TickScheduler::record_tick_end`] (weight 0.1 on the newest sample).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Work time of the last tick over the tick length. Above 1.0 the
    /// server cannot keep up.
    pub budget_utilization: f64,
}

/// Fixed-timestep scheduler on the tokio clock.
///
/// Meant to be awaited inside a `tokio::select!` loop; the future returned
/// by [`wait_for_tick`](Self::wait_for_tick) is cancel-safe because all
/// bookkeeping happens after the sleep completes.
pub struct TickScheduler {
    config: TickConfig,
    dt: Duration,
    count: u64,
    deadline: Instant,
    work_started: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let dt = config.tick_duration();
        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };

        tracing::debug!(
            rate_hz = config.tick_rate_hz,
            policy = ?config.policy,
            jitter_us = jitter.as_micros() as u64,
            "tick scheduler started"
        );

        Self {
            config,
            dt,
            count: 0,
            deadline: Instant::now() + dt + jitter,
            work_started: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due and returns it.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        time::sleep_until(self.deadline).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.deadline);
        let overrun = late_by > self.dt / 10;
        let behind = (late_by.as_nanos() / self.dt.as_nanos()) as u64;

        let (next, skipped) = self.schedule_after(now, behind);
        if skipped > 0 {
            tracing::warn!(
                tick = self.count + 1,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                policy = ?self.config.policy,
                "world tick overran, dropping missed ticks"
            );
        }

        self.deadline = next;
        self.count += 1;
        self.work_started = Some(now);
        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += skipped;
        if overrun {
            self.metrics.total_overruns += 1;
        }

        tracing::trace!(tick = self.count, overrun, "tick");
        TickInfo {
            tick: self.count,
            dt: self.dt,
            overrun,
            ticks_skipped: skipped,
        }
    }

    /// Picks the next deadline given that we are `behind` whole ticks late.
    /// Returns it with the number of grid slots given up.
    fn schedule_after(&self, now: Instant, behind: u64) -> (Instant, u64) {
        let on_grid = self.deadline + self.dt;
        if behind == 0 {
            return (on_grid, 0);
        }
        match self.config.policy {
            TickPolicy::Skip => (now + self.dt, behind),
            TickPolicy::CatchUp { max_catchup } if behind <= u64::from(max_catchup) => {
                (on_grid, 0)
            }
            TickPolicy::CatchUp { max_catchup } => {
                (now + self.dt, behind - u64::from(max_catchup))
            }
            TickPolicy::Drop => {
                let slots = u32::try_from(behind + 1).unwrap_or(u32::MAX);
                (self.deadline + self.dt * slots, behind)
            }
        }
    }

    /// Marks the end of the work done for the current tick. Feeds the
    /// budget warning and the timing metrics; a no-op if no tick is open.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / self.dt.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            tracing::warn!(
                tick = self.count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.dt.as_secs_f64() * 1000.0,
                "tick work close to or over budget"
            );
        }

        let m = &mut self.metrics;
        m.budget_utilization = utilization;
        m.max_tick_time = m.max_tick_time.max(elapsed);
        m.avg_tick_time = if m.total_ticks <= 1 {
            elapsed
        } else {
            m.avg_tick_time.mul_f64(0.9) + elapsed.mul_f64(0.1)
        };
    }

    pub fn tick_count(&self) -> u64 {
        self.count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.dt
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
