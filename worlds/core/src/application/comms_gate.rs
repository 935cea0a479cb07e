// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Comms Gate
//!
//! Issues room connection strings after the full admission check: world
//! validity, deployment permission plus access evaluation (run
//! concurrently, both required), scene existence for scene rooms, and the
//! capacity ceiling for world rooms. String construction itself belongs to
//! the realtime backend.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::access::AccessSetting;
use crate::domain::config::AccessControlConfig;
use crate::domain::permission::PermissionKind;
use crate::domain::repository::RepositoryError;
use crate::domain::world::WorldName;

use super::access_checker::AccessChecker;
use super::directory::WorldsDirectory;
use super::permissions::{PermissionError, PermissionsManager};
use super::rate_limiter::{resolve_subject, RateLimiter};

/// Port to the realtime transport. Connection strings are opaque here.
#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    async fn world_connection_string(
        &self,
        world: &WorldName,
        identity: &str,
    ) -> anyhow::Result<String>;

    async fn scene_connection_string(
        &self,
        world: &WorldName,
        scene_id: &str,
        identity: &str,
    ) -> anyhow::Result<String>;

    async fn participant_count(&self, world: &WorldName) -> anyhow::Result<usize>;
}

#[derive(Debug, Error)]
pub enum CommsGateError {
    #[error("World {0} does not exist or is blocked")]
    InvalidWorld(WorldName),

    #[error("Identity {identity} does not have access to world {world}")]
    InvalidAccess { world: WorldName, identity: String },

    #[error("Scene {scene_id} not found in world {world}")]
    SceneNotFound { world: WorldName, scene_id: String },

    #[error("World {world} is at its {capacity}-participant capacity")]
    WorldAtCapacity { world: WorldName, capacity: usize },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepositoryError> for CommsGateError {
    fn from(e: RepositoryError) -> Self {
        Self::Internal(e.into())
    }
}

impl From<PermissionError> for CommsGateError {
    fn from(e: PermissionError) -> Self {
        Self::Internal(e.into())
    }
}

/// A connection attempt as seen by the gate. `trusted_client_ip` must come
/// from the reverse proxy's own header, never from forwardable ones.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub identity: String,
    pub secret: Option<String>,
    pub trusted_client_ip: Option<String>,
}

pub struct CommsGate {
    checker: Arc<AccessChecker>,
    permissions: Arc<PermissionsManager>,
    rate_limiter: Arc<RateLimiter>,
    directory: Arc<dyn WorldsDirectory>,
    realtime: Arc<dyn RealtimeBackend>,
    capacity: usize,
}

impl CommsGate {
    pub fn new(
        checker: Arc<AccessChecker>,
        permissions: Arc<PermissionsManager>,
        rate_limiter: Arc<RateLimiter>,
        directory: Arc<dyn WorldsDirectory>,
        realtime: Arc<dyn RealtimeBackend>,
        config: &AccessControlConfig,
    ) -> Self {
        Self {
            checker,
            permissions,
            rate_limiter,
            directory,
            realtime,
            capacity: config.world_room_capacity,
        }
    }

    pub async fn get_world_room_connection_string(
        &self,
        world: &WorldName,
        request: &ConnectionRequest,
    ) -> Result<String, CommsGateError> {
        self.admit(world, request).await?;

        let count = self.realtime.participant_count(world).await?;
        if count >= self.capacity {
            return Err(CommsGateError::WorldAtCapacity {
                world: world.clone(),
                capacity: self.capacity,
            });
        }

        Ok(self
            .realtime
            .world_connection_string(world, &request.identity)
            .await?)
    }

    pub async fn get_scene_room_connection_string(
        &self,
        world: &WorldName,
        scene_id: &str,
        request: &ConnectionRequest,
    ) -> Result<String, CommsGateError> {
        self.admit(world, request).await?;

        if !self.directory.scene_exists(world, scene_id).await? {
            return Err(CommsGateError::SceneNotFound {
                world: world.clone(),
                scene_id: scene_id.to_string(),
            });
        }

        Ok(self
            .realtime
            .scene_connection_string(world, scene_id, &request.identity)
            .await?)
    }

    /// The shared admission path: world validity, rate limiting for
    /// shared-secret worlds, then deployment permission and access
    /// evaluation in parallel.
    async fn admit(
        &self,
        world: &WorldName,
        request: &ConnectionRequest,
    ) -> Result<(), CommsGateError> {
        match self.directory.get_world(world).await? {
            Some(record) if !record.blocked => {}
            _ => return Err(CommsGateError::InvalidWorld(world.clone())),
        }

        let setting = self.checker.get_world_access(world).await?;
        let guarded_by_secret = matches!(setting, AccessSetting::SharedSecret { .. });
        let subject = resolve_subject(request.trusted_client_ip.as_deref(), &request.identity);
        if guarded_by_secret && self.rate_limiter.is_rate_limited(world, &subject) {
            debug!(world = %world, subject = %subject, "Connection attempt rejected by rate limiter");
            return Err(self.denied(world, request));
        }

        let (has_permission, has_access) = tokio::try_join!(
            async {
                Result::<bool, CommsGateError>::Ok(
                    self.permissions
                        .has_world_wide_permission(world, PermissionKind::Deployment, &request.identity)
                        .await?,
                )
            },
            async {
                Result::<bool, CommsGateError>::Ok(
                    self.checker
                        .check_against(world, &setting, &request.identity, request.secret.as_deref())
                        .await?,
                )
            },
        )?;

        // The limiter tracks failed secret attempts only; a missing
        // deployment permission is not a credential failure.
        if guarded_by_secret {
            if has_access {
                self.rate_limiter.clear_attempts(world, &subject);
            } else {
                self.rate_limiter.record_failed_attempt(world, &subject);
            }
        }

        if !has_permission || !has_access {
            return Err(self.denied(world, request));
        }
        Ok(())
    }

    fn denied(&self, world: &WorldName, request: &ConnectionRequest) -> CommsGateError {
        CommsGateError::InvalidAccess {
            world: world.clone(),
            identity: request.identity.clone(),
        }
    }
}
