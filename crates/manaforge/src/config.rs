//! Game server configuration.

use std::path::Path;

use manaforge_session::RendezvousConfig;
use manaforge_tick::TickConfig;
use serde::{Deserialize, Serialize};

use crate::ManaforgeError;

/// Everything needed to start a [`GameServer`](crate::GameServer).
///
/// Every field has a default, so a JSON file only has to mention what it
/// changes:
///
/// ```json
/// { "bind_addr": "0.0.0.0:9601", "tick": { "tick_rate_hz": 20 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameServerConfig {
    /// Address the game-client listener binds to.
    pub bind_addr: String,
    pub tick: TickConfig,
    pub rendezvous: RendezvousConfig,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9601".to_string(),
            tick: TickConfig::default(),
            rendezvous: RendezvousConfig::default(),
        }
    }
}

impl GameServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ManaforgeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ManaforgeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ManaforgeError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Applies each section's clamping rules.
    pub fn validated(self) -> Self {
        Self {
            bind_addr: self.bind_addr,
            tick: self.tick.validated(),
            rendezvous: self.rendezvous.validated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use manaforge_tick::TickPolicy;

    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = GameServerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GameServerConfig::default());
        assert_eq!(config.tick.tick_rate_hz, 10);
        assert_eq!(config.rendezvous.handoff_ttl_ticks, 300);
    }

    #[test]
    fn test_nested_sections_override_partially() {
        let config = GameServerConfig::from_json_str(
            r#"{
                "bind_addr": "0.0.0.0:7000",
                "tick": { "tick_rate_hz": 25, "policy": { "kind": "drop" } },
                "rendezvous": { "handoff_ttl_ticks": 50 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert_eq!(config.tick.tick_rate_hz, 25);
        assert_eq!(config.tick.policy, TickPolicy::Drop);
        assert_eq!(config.tick.budget_warn_threshold, 0.8);
        assert_eq!(config.rendezvous.handoff_ttl_ticks, 50);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = GameServerConfig::from_json_str(r#"{"bind_addr": 5}"#).unwrap_err();
        assert!(matches!(err, ManaforgeError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_reported_with_path() {
        let err = GameServerConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ManaforgeError::ConfigFile { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_validated_clamps_sections() {
        let mut config = GameServerConfig::default();
        config.tick.tick_rate_hz = 0;
        config.rendezvous.handoff_ttl_ticks = 0;

        let config = config.validated();
        assert_eq!(config.tick.tick_rate_hz, 1);
        assert_eq!(config.rendezvous.handoff_ttl_ticks, 1);
    }
}
