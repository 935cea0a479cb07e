// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Administration
//!
//! Validates and mutates world access settings. Full replacements go through
//! [`AccessAdministration::set_access`]; allow-list edits are optimistic
//! read-modify-write cycles so two concurrent edits never lose an update.
//!
//! Post-commit side effects (eviction, change notification) run after the
//! write lands and can never roll it back.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::access::{AccessSetting, AccessSettingInput};
use crate::domain::config::AccessControlConfig;
use crate::domain::events::{AccessChangeEvent, WorldSettingsChangedEvent};
use crate::domain::repository::{AccessRepository, RepositoryError};
use crate::domain::world::{normalize_address, WorldName};
use crate::infrastructure::event_bus::SettingsEventBus;

use super::access_checker::CommunityMembershipService;
use super::change_handler::AccessChangeHandler;
use super::secrets::{SecretHashError, SecretHasher};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Invalid access setting for world {world}: {reason}")]
    Validation { world: WorldName, reason: String },

    #[error("World {world} access is {actual}, not an allow list")]
    NotAllowList { world: WorldName, actual: &'static str },

    #[error("Allow list for world {world} is capped at {cap} {list}")]
    ListCapExceeded { world: WorldName, list: &'static str, cap: usize },

    #[error("Signer {signer} is not a member of communities: {}", missing.join(", "))]
    NotCommunityMember { signer: String, missing: Vec<String> },

    #[error(transparent)]
    Hashing(#[from] SecretHashError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

pub struct AccessAdministration {
    access_repo: Arc<dyn AccessRepository>,
    communities: Arc<dyn CommunityMembershipService>,
    change_handler: Arc<AccessChangeHandler>,
    bus: SettingsEventBus,
    hasher: SecretHasher,
    config: AccessControlConfig,
}

impl AccessAdministration {
    pub fn new(
        access_repo: Arc<dyn AccessRepository>,
        communities: Arc<dyn CommunityMembershipService>,
        change_handler: Arc<AccessChangeHandler>,
        bus: SettingsEventBus,
        config: AccessControlConfig,
    ) -> Self {
        Self {
            access_repo,
            communities,
            change_handler,
            bus,
            hasher: SecretHasher::new(&config),
            config,
        }
    }

    /// Replaces the world's access setting.
    ///
    /// For allow lists the **signer** must belong to every listed community;
    /// the target identities need not. The plaintext secret never survives
    /// this call.
    pub async fn set_access(
        &self,
        world: &WorldName,
        signer: &str,
        input: AccessSettingInput,
    ) -> Result<(), AccessError> {
        let new = self.validate(world, signer, input).await?;

        let previous = self
            .access_repo
            .get_access(world)
            .await?
            .map(|versioned| versioned.value)
            .unwrap_or_default();
        self.access_repo.put_access(world, &new).await?;
        info!(
            world = %world,
            previous = previous.type_name(),
            new = new.type_name(),
            "Access setting replaced"
        );

        self.after_commit(world, previous, new).await;
        Ok(())
    }

    /// Adds a wallet to an allow-list setting. Idempotent; additions widen
    /// access so they never trigger eviction.
    pub async fn add_wallet_to_allow_list(
        &self,
        world: &WorldName,
        wallet: &str,
    ) -> Result<(), AccessError> {
        let wallet = normalize_address(wallet);
        let cap = self.config.max_allow_list_wallets;
        self.mutate_allow_list(world, false, move |wallets, _communities| {
            if wallets.contains(&wallet) {
                return Ok(false);
            }
            if wallets.len() >= cap {
                return Err(MutationVeto::WalletCap(cap));
            }
            wallets.insert(wallet.clone());
            Ok(true)
        })
        .await
    }

    /// Removes a wallet; a no-op when absent. An actual removal re-runs the
    /// transition policy against connected participants.
    pub async fn remove_wallet_from_allow_list(
        &self,
        world: &WorldName,
        wallet: &str,
    ) -> Result<(), AccessError> {
        let wallet = normalize_address(wallet);
        self.mutate_allow_list(world, true, move |wallets, _communities| {
            Ok(wallets.remove(&wallet))
        })
        .await
    }

    pub async fn add_community_to_allow_list(
        &self,
        world: &WorldName,
        community: &str,
    ) -> Result<(), AccessError> {
        let community = community.trim().to_string();
        let cap = self.config.max_allow_list_communities;
        self.mutate_allow_list(world, false, move |_wallets, communities| {
            if communities.contains(&community) {
                return Ok(false);
            }
            if communities.len() >= cap {
                return Err(MutationVeto::CommunityCap(cap));
            }
            communities.insert(community.clone());
            Ok(true)
        })
        .await
    }

    pub async fn remove_community_from_allow_list(
        &self,
        world: &WorldName,
        community: &str,
    ) -> Result<(), AccessError> {
        let community = community.trim().to_string();
        self.mutate_allow_list(world, true, move |_wallets, communities| {
            Ok(communities.remove(&community))
        })
        .await
    }

    async fn validate(
        &self,
        world: &WorldName,
        signer: &str,
        input: AccessSettingInput,
    ) -> Result<AccessSetting, AccessError> {
        match input {
            AccessSettingInput::Unrestricted => Ok(AccessSetting::Unrestricted),
            AccessSettingInput::SharedSecret { secret } => {
                if secret.trim().is_empty() {
                    return Err(AccessError::Validation {
                        world: world.clone(),
                        reason: "shared-secret access requires a non-empty secret".to_string(),
                    });
                }
                Ok(AccessSetting::SharedSecret { secret_hash: self.hasher.hash(&secret)? })
            }
            AccessSettingInput::NftOwnership { nft_ref } => {
                if nft_ref.trim().is_empty() {
                    return Err(AccessError::Validation {
                        world: world.clone(),
                        reason: "nft-ownership access requires a non-empty reference".to_string(),
                    });
                }
                Ok(AccessSetting::NftOwnership { nft_ref: nft_ref.trim().to_string() })
            }
            AccessSettingInput::AllowList { wallets, communities } => {
                let wallets: std::collections::BTreeSet<String> =
                    wallets.iter().map(|w| normalize_address(w)).collect();
                let communities: std::collections::BTreeSet<String> =
                    communities.iter().map(|c| c.trim().to_string()).collect();
                if wallets.len() > self.config.max_allow_list_wallets {
                    return Err(AccessError::ListCapExceeded {
                        world: world.clone(),
                        list: "wallets",
                        cap: self.config.max_allow_list_wallets,
                    });
                }
                if communities.len() > self.config.max_allow_list_communities {
                    return Err(AccessError::ListCapExceeded {
                        world: world.clone(),
                        list: "communities",
                        cap: self.config.max_allow_list_communities,
                    });
                }
                if !communities.is_empty() {
                    let ids: Vec<String> = communities.iter().cloned().collect();
                    let signer = normalize_address(signer);
                    let member_of = self.communities.get_member_communities(&signer, &ids).await;
                    let missing: Vec<String> = ids
                        .into_iter()
                        .filter(|id| !member_of.contains(id))
                        .collect();
                    if !missing.is_empty() {
                        return Err(AccessError::NotCommunityMember { signer, missing });
                    }
                }
                Ok(AccessSetting::AllowList { wallets, communities })
            }
        }
    }

    /// One optimistic read-modify-write cycle with bounded retries.
    ///
    /// `mutate` returns whether it changed anything; unchanged settings are
    /// not rewritten. `evict_on_change` runs the change handler with the
    /// before/after snapshots after a committed shrink.
    async fn mutate_allow_list<F>(
        &self,
        world: &WorldName,
        evict_on_change: bool,
        mutate: F,
    ) -> Result<(), AccessError>
    where
        F: Fn(
            &mut std::collections::BTreeSet<String>,
            &mut std::collections::BTreeSet<String>,
        ) -> Result<bool, MutationVeto>,
    {
        for _attempt in 0..self.config.max_cas_retries {
            let current = self.access_repo.get_access(world).await?;
            let (setting, version) = match current {
                Some(versioned) => (versioned.value, versioned.version),
                None => (AccessSetting::default(), 0),
            };
            let AccessSetting::AllowList { mut wallets, mut communities } = setting else {
                return Err(AccessError::NotAllowList {
                    world: world.clone(),
                    actual: setting.type_name(),
                });
            };

            let previous = AccessSetting::AllowList {
                wallets: wallets.clone(),
                communities: communities.clone(),
            };
            let changed = mutate(&mut wallets, &mut communities).map_err(|veto| match veto {
                MutationVeto::WalletCap(cap) => AccessError::ListCapExceeded {
                    world: world.clone(),
                    list: "wallets",
                    cap,
                },
                MutationVeto::CommunityCap(cap) => AccessError::ListCapExceeded {
                    world: world.clone(),
                    list: "communities",
                    cap,
                },
            })?;
            if !changed {
                return Ok(());
            }

            let new = AccessSetting::AllowList { wallets, communities };
            if self.access_repo.cas_access(world, version, &new).await? {
                if evict_on_change {
                    self.change_handler
                        .handle(&AccessChangeEvent {
                            world: world.clone(),
                            previous,
                            new,
                        })
                        .await;
                }
                return Ok(());
            }
            // Lost the race; reload and try again.
        }
        warn!(world = %world, "Allow-list mutation exhausted CAS retries");
        Err(AccessError::Storage(RepositoryError::Conflict(format!(
            "access setting for {world}"
        ))))
    }

    async fn after_commit(&self, world: &WorldName, previous: AccessSetting, new: AccessSetting) {
        let event = AccessChangeEvent {
            world: world.clone(),
            previous,
            new: new.clone(),
        };
        self.change_handler.handle(&event).await;
        self.bus.publish(WorldSettingsChangedEvent::new(world.clone(), &new));
    }
}

enum MutationVeto {
    WalletCap(usize),
    CommunityCap(usize),
}
