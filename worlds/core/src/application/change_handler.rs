// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access-Change Reactions
//!
//! When a world's access setting changes, connected participants whose
//! access just disappeared must be evicted. The decision is a pure function
//! over the (previous, new) setting pair; execution is best-effort and never
//! rolls back the committed write.
//!
//! ## Relationships
//! - Consumes `PeersRegistry` for the live participant set
//! - Consumes `ParticipantKicker` for batched eviction
//! - Consumes `AccessChecker` for selective re-evaluation
//! - Consumes `PermissionsRepository` + `WorldsDirectory` for the privileged
//!   set (owner and deployment-grant holders are never evicted)

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::access::AccessSetting;
use crate::domain::events::AccessChangeEvent;
use crate::domain::permission::PermissionKind;
use crate::domain::repository::PermissionsRepository;
use crate::domain::world::{normalize_address, WorldName};

use super::access_checker::AccessChecker;
use super::directory::WorldsDirectory;

/// Port to the realtime layer's presence index.
#[async_trait]
pub trait PeersRegistry: Send + Sync {
    async fn get_peers_in_world(&self, world: &WorldName) -> Vec<String>;

    async fn get_peer_world(&self, identity: &str) -> Option<WorldName>;
}

/// Port for forced disconnection.
#[async_trait]
pub trait ParticipantKicker: Send + Sync {
    async fn kick_participant(&self, world: &WorldName, identity: &str) -> anyhow::Result<()>;

    /// Evicts many identities, chunked to bound backpressure on the
    /// transport. Failures are the implementation's to log; callers treat
    /// the whole call as best-effort.
    async fn kick_in_batches(&self, world: &WorldName, identities: &[String]);
}

/// What an access-setting transition requires of connected participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    NoKick,
    KickAll,
    KickWithoutAccess,
}

/// The transition policy, as a pure lookup over the setting pair.
///
/// Allow-list set comparison is case-insensitive; shared-secret comparison
/// is on the stored hash, so re-setting the same plaintext (which re-salts)
/// still counts as a change.
pub fn decide_reaction(previous: &AccessSetting, new: &AccessSetting) -> Reaction {
    use AccessSetting::*;
    match (previous, new) {
        // Opening a world up can never strand anyone inside it.
        (_, Unrestricted) => Reaction::NoKick,
        (SharedSecret { secret_hash: old }, SharedSecret { secret_hash: new }) => {
            if old == new {
                Reaction::NoKick
            } else {
                Reaction::KickAll
            }
        }
        (
            AllowList { wallets: old_w, communities: old_c },
            AllowList { wallets: new_w, communities: new_c },
        ) => {
            if sets_equal_ci(old_w.iter(), new_w.iter()) && sets_equal_ci(old_c.iter(), new_c.iter()) {
                Reaction::NoKick
            } else {
                Reaction::KickWithoutAccess
            }
        }
        (NftOwnership { .. }, NftOwnership { .. }) => Reaction::NoKick,
        // Every remaining pair is a variant change; nobody's standing is
        // known to carry over.
        _ => Reaction::KickAll,
    }
}

fn sets_equal_ci<'a>(
    a: impl Iterator<Item = &'a String>,
    b: impl Iterator<Item = &'a String>,
) -> bool {
    let a: HashSet<String> = a.map(|s| s.to_lowercase()).collect();
    let b: HashSet<String> = b.map(|s| s.to_lowercase()).collect();
    a == b
}

pub struct AccessChangeHandler {
    peers: Arc<dyn PeersRegistry>,
    kicker: Arc<dyn ParticipantKicker>,
    checker: Arc<AccessChecker>,
    permissions_repo: Arc<dyn PermissionsRepository>,
    directory: Arc<dyn WorldsDirectory>,
}

impl AccessChangeHandler {
    pub fn new(
        peers: Arc<dyn PeersRegistry>,
        kicker: Arc<dyn ParticipantKicker>,
        checker: Arc<AccessChecker>,
        permissions_repo: Arc<dyn PermissionsRepository>,
        directory: Arc<dyn WorldsDirectory>,
    ) -> Self {
        Self { peers, kicker, checker, permissions_repo, directory }
    }

    /// Applies the transition policy to the world's connected participants.
    ///
    /// Runs after the setting write has committed. All failures here are
    /// logged and swallowed; eviction is decoupled from persistence.
    pub async fn handle(&self, event: &AccessChangeEvent) {
        let world = &event.world;
        let connected = self.peers.get_peers_in_world(world).await;
        if connected.is_empty() {
            debug!(world = %world, "Access changed with no connected participants");
            return;
        }

        let reaction = decide_reaction(&event.previous, &event.new);
        debug!(
            world = %world,
            previous = event.previous.type_name(),
            new = event.new.type_name(),
            ?reaction,
            connected = connected.len(),
            "Decided access-change reaction"
        );
        if reaction == Reaction::NoKick {
            return;
        }

        // If the privileged set cannot be computed, skip eviction entirely
        // rather than risk kicking the owner.
        let privileged = match self.privileged_identities(world).await {
            Ok(privileged) => privileged,
            Err(e) => {
                error!(world = %world, error = %e, "Could not resolve privileged identities, skipping eviction");
                return;
            }
        };

        let candidates: Vec<String> = connected
            .into_iter()
            .filter(|identity| !privileged.contains(&normalize_address(identity)))
            .collect();
        if candidates.is_empty() {
            return;
        }

        let targets = match reaction {
            Reaction::NoKick => return,
            Reaction::KickAll => candidates,
            Reaction::KickWithoutAccess => {
                self.filter_without_access(world, &event.new, candidates).await
            }
        };
        if targets.is_empty() {
            return;
        }

        info!(world = %world, evicted = targets.len(), "Evicting participants after access change");
        metrics::counter!("worlds_access_evictions_total").increment(targets.len() as u64);
        self.kicker.kick_in_batches(world, &targets).await;
    }

    /// Owner plus every deployment-grant holder, world-wide or parcel-scoped.
    async fn privileged_identities(&self, world: &WorldName) -> anyhow::Result<HashSet<String>> {
        let mut privileged = HashSet::new();
        if let Some(record) = self.directory.get_world(world).await? {
            privileged.insert(normalize_address(&record.owner));
        }
        let grants = self
            .permissions_repo
            .list_grants(world, PermissionKind::Deployment)
            .await?;
        privileged.extend(grants.into_iter().map(|g| g.address));
        Ok(privileged)
    }

    /// Re-evaluates each candidate against the new setting in parallel.
    /// An evaluation failure exempts that identity, never the batch.
    async fn filter_without_access(
        &self,
        world: &WorldName,
        setting: &AccessSetting,
        candidates: Vec<String>,
    ) -> Vec<String> {
        let checks = candidates.iter().map(|identity| async move {
            self.checker.check_against(world, setting, identity, None).await
        });
        let results = join_all(checks).await;

        candidates
            .into_iter()
            .zip(results)
            .filter_map(|(identity, result)| match result {
                Ok(true) => None,
                Ok(false) => Some(identity),
                Err(e) => {
                    warn!(
                        world = %world,
                        identity = %identity,
                        error = %e,
                        "Access re-evaluation failed, exempting identity from eviction"
                    );
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::SecretHash;

    fn hash(s: &str) -> SecretHash {
        SecretHash::new(s.to_string())
    }

    #[test]
    fn anything_to_unrestricted_never_kicks() {
        let from = [
            AccessSetting::Unrestricted,
            AccessSetting::SharedSecret { secret_hash: hash("$h") },
            AccessSetting::NftOwnership { nft_ref: "urn:x".into() },
            AccessSetting::allow_list(["0xa"], ["c"]),
        ];
        for previous in from {
            assert_eq!(
                decide_reaction(&previous, &AccessSetting::Unrestricted),
                Reaction::NoKick
            );
        }
    }

    #[test]
    fn secret_rotation_kicks_everyone() {
        let old = AccessSetting::SharedSecret { secret_hash: hash("$a") };
        let same = AccessSetting::SharedSecret { secret_hash: hash("$a") };
        let rotated = AccessSetting::SharedSecret { secret_hash: hash("$b") };
        assert_eq!(decide_reaction(&old, &same), Reaction::NoKick);
        assert_eq!(decide_reaction(&old, &rotated), Reaction::KickAll);
    }

    #[test]
    fn allow_list_edits_kick_selectively() {
        let old = AccessSetting::allow_list(["0xA", "0xB"], ["dao"]);
        let reordered = AccessSetting::allow_list(["0xb", "0xa"], ["DAO"]);
        let shrunk = AccessSetting::allow_list(["0xa"], ["dao"]);
        assert_eq!(decide_reaction(&old, &reordered), Reaction::NoKick);
        assert_eq!(decide_reaction(&old, &shrunk), Reaction::KickWithoutAccess);
    }

    #[test]
    fn variant_changes_kick_everyone() {
        let allow = AccessSetting::allow_list(["0xa"], Vec::<String>::new());
        let secret = AccessSetting::SharedSecret { secret_hash: hash("$a") };
        let nft = AccessSetting::NftOwnership { nft_ref: "urn:x".into() };
        assert_eq!(decide_reaction(&allow, &secret), Reaction::KickAll);
        assert_eq!(decide_reaction(&secret, &allow), Reaction::KickAll);
        assert_eq!(decide_reaction(&allow, &nft), Reaction::KickAll);
        assert_eq!(decide_reaction(&nft, &nft), Reaction::NoKick);
        assert_eq!(decide_reaction(&AccessSetting::Unrestricted, &allow), Reaction::KickAll);
    }
}
