//! Where ticks come from: the real clock, or a test driving them by hand.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{TickInfo, TickScheduler};

/// Anything that can produce world ticks for the server loop.
///
/// `next_tick` must be cancel-safe: the server polls it inside
/// `tokio::select!` and drops the future whenever another branch wins.
pub trait TickSource: Send + 'static {
    fn next_tick(&mut self) -> impl Future<Output = TickInfo> + Send;

    /// Called after the server finished its work for a tick.
    fn tick_finished(&mut self) {}
}

impl TickSource for TickScheduler {
    fn next_tick(&mut self) -> impl Future<Output = TickInfo> + Send {
        self.wait_for_tick()
    }

    fn tick_finished(&mut self) {
        self.record_tick_end();
    }
}

/// A [`TickSource`] that only ticks when told to.
///
/// Once every [`ManualTickHandle`] is dropped, `next_tick` never resolves.
pub struct ManualTicks {
    rx: mpsc::UnboundedReceiver<()>,
    count: u64,
    dt: Duration,
}

/// Steps a [`ManualTicks`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ManualTickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicks {
    /// `dt` is reported in every [`TickInfo`]; it does not affect timing.
    pub fn new(dt: Duration) -> (Self, ManualTickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { rx, count: 0, dt },
            ManualTickHandle { tx },
        )
    }

    pub fn tick_count(&self) -> u64 {
        self.count
    }
}

impl TickSource for ManualTicks {
    async fn next_tick(&mut self) -> TickInfo {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
        self.count += 1;
        TickInfo {
            tick: self.count,
            dt: self.dt,
            overrun: false,
            ticks_skipped: 0,
        }
    }
}

impl ManualTickHandle {
    /// Queues one tick. Returns `false` if the source is gone.
    pub fn step(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Queues `n` ticks.
    pub fn step_n(&self, n: u32) -> bool {
        (0..n).all(|_| self.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_ticks_count_up() {
        let (mut ticks, handle) = ManualTicks::new(Duration::from_millis(100));
        assert!(handle.step_n(3));

        for expected in 1..=3 {
            let info = ticks.next_tick().await;
            assert_eq!(info.tick, expected);
            assert_eq!(info.dt, Duration::from_millis(100));
        }
        assert_eq!(ticks.tick_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_ticks_pend_without_steps() {
        let (mut ticks, handle) = ManualTicks::new(Duration::from_millis(100));
        let waited =
            tokio::time::timeout(Duration::from_secs(60), ticks.next_tick()).await;
        assert!(waited.is_err());

        drop(handle);
        let waited =
            tokio::time::timeout(Duration::from_secs(60), ticks.next_tick()).await;
        assert!(waited.is_err(), "a closed source never ticks");
    }

    #[tokio::test]
    async fn test_step_after_source_dropped_fails() {
        let (ticks, handle) = ManualTicks::new(Duration::ZERO);
        drop(ticks);
        assert!(!handle.step());
    }
}
