// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Access-control engine configuration.
//
// All knobs ship with production defaults so an empty config section works;
// the embedding node deserializes this from its YAML manifest.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlConfig {
    /// Maximum wallets on an allow-list access setting.
    #[serde(default = "default_max_wallets")]
    pub max_allow_list_wallets: usize,

    /// Maximum communities on an allow-list access setting.
    #[serde(default = "default_max_communities")]
    pub max_allow_list_communities: usize,

    /// Argon2id memory cost (KiB) for shared-secret hashing.
    #[serde(default = "default_hash_memory_kib")]
    pub secret_hash_memory_kib: u32,

    /// Argon2id iteration count for shared-secret hashing.
    #[serde(default = "default_hash_iterations")]
    pub secret_hash_iterations: u32,

    /// Failed shared-secret attempts allowed per window before limiting.
    #[serde(default = "default_rate_limit_attempts")]
    pub rate_limit_max_attempts: u32,

    /// Rate-limit window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Live-participant ceiling for world room connection strings.
    #[serde(default = "default_room_capacity")]
    pub world_room_capacity: usize,

    /// Eviction chunk size when kicking many participants.
    #[serde(default = "default_kick_batch_size")]
    pub kick_batch_size: usize,

    /// CAS retries for read-modify-write mutations before surfacing a
    /// conflict to the caller.
    #[serde(default = "default_cas_retries")]
    pub max_cas_retries: u32,
}

fn default_max_wallets() -> usize {
    1000
}
fn default_max_communities() -> usize {
    50
}
fn default_hash_memory_kib() -> u32 {
    19_456
}
fn default_hash_iterations() -> u32 {
    2
}
fn default_rate_limit_attempts() -> u32 {
    5
}
fn default_rate_limit_window_secs() -> u64 {
    60
}
fn default_room_capacity() -> usize {
    100
}
fn default_kick_batch_size() -> usize {
    100
}
fn default_cas_retries() -> u32 {
    5
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            max_allow_list_wallets: default_max_wallets(),
            max_allow_list_communities: default_max_communities(),
            secret_hash_memory_kib: default_hash_memory_kib(),
            secret_hash_iterations: default_hash_iterations(),
            rate_limit_max_attempts: default_rate_limit_attempts(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            world_room_capacity: default_room_capacity(),
            kick_batch_size: default_kick_batch_size(),
            max_cas_retries: default_cas_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AccessControlConfig::default();
        assert_eq!(config.max_allow_list_wallets, 1000);
        assert_eq!(config.max_allow_list_communities, 50);
        assert_eq!(config.rate_limit_max_attempts, 5);
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: AccessControlConfig =
            serde_json::from_value(serde_json::json!({ "rate_limit_max_attempts": 3 })).unwrap();
        assert_eq!(config.rate_limit_max_attempts, 3);
        assert_eq!(config.world_room_capacity, 100);
    }
}
