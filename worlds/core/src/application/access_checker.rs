// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Evaluation
//!
//! Decides whether an identity currently satisfies a world's access setting.
//! Evaluation is read-only and safe to run in parallel for many identities,
//! which the change handler relies on when re-checking a whole room.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::access::AccessSetting;
use crate::domain::repository::{AccessRepository, RepositoryError};
use crate::domain::world::{normalize_address, WorldName};

use super::secrets::SecretHasher;

/// Port to the external community-membership service.
///
/// Implementations must fail closed: any transport or protocol failure is
/// reported as "member of nothing", never as an error. One batched call per
/// membership check.
#[async_trait]
pub trait CommunityMembershipService: Send + Sync {
    /// Returns the subset of `community_ids` the identity belongs to.
    async fn get_member_communities(&self, identity: &str, community_ids: &[String]) -> Vec<String>;
}

pub struct AccessChecker {
    access_repo: Arc<dyn AccessRepository>,
    communities: Arc<dyn CommunityMembershipService>,
}

impl AccessChecker {
    pub fn new(
        access_repo: Arc<dyn AccessRepository>,
        communities: Arc<dyn CommunityMembershipService>,
    ) -> Self {
        Self { access_repo, communities }
    }

    /// The world's current access setting; worlds without a stored record
    /// are unrestricted.
    pub async fn get_world_access(&self, world: &WorldName) -> Result<AccessSetting, RepositoryError> {
        Ok(self
            .access_repo
            .get_access(world)
            .await?
            .map(|versioned| versioned.value)
            .unwrap_or_default())
    }

    /// Whether `identity` may currently enter `world`.
    pub async fn check_access(
        &self,
        world: &WorldName,
        identity: &str,
        secret: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let setting = self.get_world_access(world).await?;
        self.check_against(world, &setting, identity, secret).await
    }

    /// Evaluates against an already-loaded setting. The change handler uses
    /// this to avoid one repository read per connected participant.
    pub async fn check_against(
        &self,
        world: &WorldName,
        setting: &AccessSetting,
        identity: &str,
        secret: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        match setting {
            AccessSetting::Unrestricted => Ok(true),
            AccessSetting::SharedSecret { secret_hash } => Ok(match secret {
                Some(candidate) => SecretHasher::verify(secret_hash, candidate),
                None => false,
            }),
            // On-chain verification is not implemented; deny everyone.
            AccessSetting::NftOwnership { .. } => Ok(false),
            AccessSetting::AllowList { wallets, communities } => {
                let identity = normalize_address(identity);
                // Wallet lookup is local and cheap; only fall through to the
                // network call when it misses.
                if wallets.contains(&identity) {
                    return Ok(true);
                }
                if communities.is_empty() {
                    return Ok(false);
                }
                let ids: Vec<String> = communities.iter().cloned().collect();
                let memberships = self.communities.get_member_communities(&identity, &ids).await;
                let allowed = memberships.iter().any(|id| communities.contains(id));
                debug!(
                    world = %world,
                    identity = %identity,
                    allowed,
                    "Community membership check completed"
                );
                Ok(allowed)
            }
        }
    }
}
