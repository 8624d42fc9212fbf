//! Rendezvous settings.

use serde::{Deserialize, Serialize};

/// Default grace period for an unmatched hand-off: 300 ticks, 30 seconds at
/// the default 10 Hz world tick.
pub const DEFAULT_HANDOFF_TTL_TICKS: u32 = 300;

/// Configuration for [`SessionRendezvous`](crate::SessionRendezvous).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousConfig {
    /// How many world ticks a hand-off waits for its connection before it is
    /// discarded.
    pub handoff_ttl_ticks: u32,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            handoff_ttl_ticks: DEFAULT_HANDOFF_TTL_TICKS,
        }
    }
}

impl RendezvousConfig {
    /// Returns a copy with out-of-range values fixed up.
    ///
    /// A zero ttl would expire hand-offs before any connection could match
    /// them; it is raised to 1 with a warning.
    pub fn validated(mut self) -> Self {
        if self.handoff_ttl_ticks == 0 {
            tracing::warn!("handoff_ttl_ticks is 0, clamping to 1");
            self.handoff_ttl_ticks = 1;
        }
        self
    }
}
