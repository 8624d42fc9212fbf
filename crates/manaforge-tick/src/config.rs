//! Tick rate and overrun settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the scheduler recovers when it wakes up more than one tick late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickPolicy {
    /// Forget the missed ticks and restart the grid from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, up to `max_catchup` of them. If more
    /// were missed than that, behave like `Skip`.
    CatchUp { max_catchup: u32 },
    /// Stay on the original grid: the missed slots are dropped and the next
    /// tick fires at the next grid point after now.
    Drop,
}

/// Settings for [`TickScheduler`](crate::TickScheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// World ticks per second.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick budget (0.0 to 1.0) above which a tick's work
    /// is reported at warn level.
    pub budget_warn_threshold: f64,
    /// Upper bound of a random delay added to the first tick only, in
    /// microseconds. Keeps servers started together from ticking in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.8,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// 10 Hz: a 300-tick hand-off window is 30 seconds.
    pub const DEFAULT_TICK_RATE_HZ: u32 = 10;
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Returns a copy with out-of-range values fixed up.
    ///
    /// The world clock always runs: a rate of 0 is raised to 1 Hz, and
    /// rates above [`Self::MAX_TICK_RATE_HZ`] are lowered to it.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            tracing::warn!("tick_rate_hz is 0, clamping to 1");
            self.tick_rate_hz = 1;
        } else if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            tracing::warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz too high, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        if !(0.0..=1.0).contains(&self.budget_warn_threshold) {
            let clamped = if self.budget_warn_threshold.is_nan() {
                1.0
            } else {
                self.budget_warn_threshold.clamp(0.0, 1.0)
            };
            tracing::warn!(
                threshold = self.budget_warn_threshold,
                clamped,
                "budget_warn_threshold out of range"
            );
            self.budget_warn_threshold = clamped;
        }
        self
    }

    /// Length of one tick. Call on a validated config; a zero rate would
    /// divide by zero.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}
