// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Realtime Backend Client
//!
//! HTTP adapter for the realtime transport's control API: connection-string
//! issuance, live participant counts, and forced disconnection. Eviction is
//! chunked so a mass kick cannot flood the transport, and a failed batch is
//! logged and left behind rather than retried forever.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::change_handler::ParticipantKicker;
use crate::application::comms_gate::RealtimeBackend;
use crate::domain::config::AccessControlConfig;
use crate::domain::world::WorldName;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    connection_string: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
struct KickRequest<'a> {
    identity: &'a str,
}

pub struct HttpRealtimeBackend {
    base_url: String,
    client: Client,
}

impl HttpRealtimeBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    async fn token(&self, url: String, identity: &str) -> Result<String> {
        let response = self
            .client
            .post(&url)
            .json(&TokenRequest { identity })
            .send()
            .await
            .with_context(|| format!("requesting connection string from {url}"))?;
        if !response.status().is_success() {
            return Err(anyhow!("realtime backend returned {} for {url}", response.status()));
        }
        Ok(response.json::<TokenResponse>().await?.connection_string)
    }
}

#[async_trait]
impl RealtimeBackend for HttpRealtimeBackend {
    async fn world_connection_string(&self, world: &WorldName, identity: &str) -> Result<String> {
        let url = format!("{}/rooms/{}/token", self.base_url, world);
        self.token(url, identity).await
    }

    async fn scene_connection_string(
        &self,
        world: &WorldName,
        scene_id: &str,
        identity: &str,
    ) -> Result<String> {
        let url = format!("{}/rooms/{}/scenes/{}/token", self.base_url, world, scene_id);
        self.token(url, identity).await
    }

    async fn participant_count(&self, world: &WorldName) -> Result<usize> {
        let url = format!("{}/rooms/{}/count", self.base_url, world);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("fetching participant count from {url}"))?
            .error_for_status()?;
        Ok(response.json::<CountResponse>().await?.count)
    }
}

/// Evicts participants through the realtime backend's kick endpoint.
pub struct CommsParticipantKicker {
    base_url: String,
    client: Client,
    batch_size: usize,
}

impl CommsParticipantKicker {
    pub fn new(base_url: impl Into<String>, config: &AccessControlConfig) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            batch_size: config.kick_batch_size.max(1),
        }
    }

    pub fn shared(base_url: impl Into<String>, config: &AccessControlConfig) -> Arc<Self> {
        Arc::new(Self::new(base_url, config))
    }

    async fn kick(&self, world: &WorldName, identity: &str) -> Result<()> {
        let url = format!("{}/rooms/{}/kick", self.base_url, world);
        self.client
            .post(&url)
            .json(&KickRequest { identity })
            .send()
            .await
            .with_context(|| format!("kicking {identity} from {world}"))?
            .error_for_status()
            .with_context(|| format!("kicking {identity} from {world}"))?;
        Ok(())
    }
}

#[async_trait]
impl ParticipantKicker for CommsParticipantKicker {
    async fn kick_participant(&self, world: &WorldName, identity: &str) -> Result<()> {
        self.kick(world, identity).await
    }

    async fn kick_in_batches(&self, world: &WorldName, identities: &[String]) {
        for batch in identities.chunks(self.batch_size) {
            debug!(world = %world, batch = batch.len(), "Kicking participant batch");
            let kicks = batch.iter().map(|identity| async move {
                (identity, self.kick(world, identity).await)
            });
            for (identity, result) in futures::future::join_all(kicks).await {
                if let Err(e) = result {
                    warn!(world = %world, identity = %identity, error = %e, "Participant kick failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_world_connection_string() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rooms/w.eth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"connection_string":"rt:wss://rt.example/w.eth?token=abc"}"#)
            .create_async()
            .await;

        let backend = HttpRealtimeBackend::new(server.url());
        let s = backend
            .world_connection_string(&WorldName::new("w.eth"), "0xa")
            .await
            .unwrap();
        assert!(s.starts_with("rt:wss://"));
    }

    #[tokio::test]
    async fn kick_batches_survive_individual_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rooms/w.eth/kick")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let kicker = CommsParticipantKicker::new(server.url(), &AccessControlConfig::default());
        let world = WorldName::new("w.eth");
        // Must not panic or abort on per-kick failures.
        kicker
            .kick_in_batches(&world, &["0xa".to_string(), "0xb".to_string()])
            .await;
        mock.assert_async().await;
    }
}
