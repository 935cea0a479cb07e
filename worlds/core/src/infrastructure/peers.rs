// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-memory presence index. The realtime layer feeds connect/disconnect
// callbacks into it; the change handler and comms gate only read. DashMap
// keeps concurrent updates and lookups safe without a global lock.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::change_handler::PeersRegistry;
use crate::domain::world::{normalize_address, WorldName};

#[derive(Default)]
pub struct InMemoryPeersRegistry {
    peers: DashMap<String, WorldName>,
}

impl InMemoryPeersRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peer is in at most one world; reconnecting elsewhere moves it.
    pub fn peer_connected(&self, identity: &str, world: &WorldName) {
        self.peers.insert(normalize_address(identity), world.clone());
    }

    pub fn peer_disconnected(&self, identity: &str) {
        self.peers.remove(&normalize_address(identity));
    }
}

#[async_trait]
impl PeersRegistry for InMemoryPeersRegistry {
    async fn get_peers_in_world(&self, world: &WorldName) -> Vec<String> {
        self.peers
            .iter()
            .filter(|entry| entry.value() == world)
            .map(|entry| entry.key().clone())
            .collect()
    }

    async fn get_peer_world(&self, identity: &str) -> Option<WorldName> {
        self.peers
            .get(&normalize_address(identity))
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_presence_per_world() {
        let registry = InMemoryPeersRegistry::new();
        let a = WorldName::new("a.eth");
        let b = WorldName::new("b.eth");

        registry.peer_connected("0xAlice", &a);
        registry.peer_connected("0xbob", &a);
        registry.peer_connected("0xcarol", &b);

        let mut peers = registry.get_peers_in_world(&a).await;
        peers.sort();
        assert_eq!(peers, vec!["0xalice".to_string(), "0xbob".to_string()]);
        assert_eq!(registry.get_peer_world("0xALICE").await, Some(a.clone()));

        registry.peer_connected("0xalice", &b);
        assert_eq!(registry.get_peer_world("0xalice").await, Some(b));
        assert_eq!(registry.get_peers_in_world(&a).await.len(), 1);

        registry.peer_disconnected("0xbob");
        assert!(registry.get_peers_in_world(&a).await.is_empty());
    }
}
