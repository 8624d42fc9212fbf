//! World tick driver for Manaforge.
//!
//! A game server advances its world on a fixed cadence. Per-tick work that
//! lives in this workspace is small (aging hand-offs, sweeping dead
//! connections), but it must happen exactly once per tick, so the driver
//! keeps a steady grid and reports overruns instead of silently drifting.
//!
//! - [`TickScheduler`]: sleeps on the tokio clock, default 10 Hz, with
//!   [`TickPolicy`] deciding how to recover from lateness
//! - [`TickSource`]: what the server loop awaits; implemented by the
//!   scheduler and by [`ManualTicks`] for tests
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         event = transport.next_event() => { /* ... */ }
//!         info = ticks.next_tick() => {
//!             rendezvous.tick();
//!             ticks.tick_finished();
//!         }
//!     }
//! }
//! ```

mod config;
mod scheduler;
mod source;

pub use config::{TickConfig, TickPolicy};
pub use scheduler::{TickInfo, TickMetrics, TickScheduler};
pub use source::{ManualTickHandle, ManualTicks, TickSource};
