// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permissions Manager
//!
//! Deployment and streaming grants, world-wide or parcel-scoped, with the
//! spatial and paginated queries the admin surface exposes. Parcel-set
//! mutations are optimistic read-modify-write cycles like allow-list edits.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::config::AccessControlConfig;
use crate::domain::permission::{AccessGrantRecord, GrantScope, PermissionKind, PermissionSetting};
use crate::domain::repository::{PermissionsRepository, RepositoryError};
use crate::domain::world::{normalize_address, BoundingBox, Parcel, ParcelError, WorldName};

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    MalformedParcel(#[from] ParcelError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Zero-based pagination window.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { offset: 0, limit: 100 }
    }
}

/// A page of results plus the total computed before paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Paginated<T> {
    let total = items.len();
    let items = items
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    Paginated { items, total }
}

/// Parses canonical `"x,y"` strings as received from the admin surface.
pub fn parse_parcels(raw: &[String]) -> Result<Vec<Parcel>, PermissionError> {
    raw.iter()
        .map(|s| s.parse::<Parcel>().map_err(PermissionError::from))
        .collect()
}

pub struct PermissionsManager {
    repo: Arc<dyn PermissionsRepository>,
    max_cas_retries: u32,
}

impl PermissionsManager {
    pub fn new(repo: Arc<dyn PermissionsRepository>, config: &AccessControlConfig) -> Self {
        Self { repo, max_cas_retries: config.max_cas_retries }
    }

    pub async fn get_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<PermissionSetting, PermissionError> {
        Ok(self.repo.get_permission_setting(world, kind).await?)
    }

    /// Switches a permission between open and allow-listed. Grant records
    /// are kept either way; they are simply not consulted while the setting
    /// is unrestricted.
    pub async fn set_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        setting: PermissionSetting,
    ) -> Result<(), PermissionError> {
        self.repo.set_permission_setting(world, kind, setting).await?;
        info!(world = %world, kind = %kind, ?setting, "Permission setting changed");
        Ok(())
    }

    /// Idempotent world-wide grant. An existing parcel-scoped record for the
    /// same identity is replaced and its parcel set discarded; that
    /// conversion is deliberate, never an implicit merge.
    pub async fn grant_world_wide_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
    ) -> Result<(), PermissionError> {
        let address = normalize_address(address);
        let parcel_record = self.repo.get_grant(world, kind, &address, false).await?;
        if parcel_record.is_some() {
            self.repo.delete_grant(world, kind, &address, false).await?;
            info!(
                world = %world,
                kind = %kind,
                address = %address,
                "Parcel-scoped grant converted to world-wide, parcel set discarded"
            );
        }
        self.repo
            .put_grant(world, &AccessGrantRecord::world_wide(kind, &address))
            .await?;
        Ok(())
    }

    pub async fn revoke_world_wide_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
    ) -> Result<(), PermissionError> {
        let address = normalize_address(address);
        self.repo.delete_grant(world, kind, &address, true).await?;
        Ok(())
    }

    /// Whether the address holds the permission everywhere in the world.
    /// An unrestricted setting grants it to everyone.
    pub async fn has_world_wide_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
    ) -> Result<bool, PermissionError> {
        if self.repo.get_permission_setting(world, kind).await? == PermissionSetting::Unrestricted {
            return Ok(true);
        }
        let address = normalize_address(address);
        Ok(self.repo.get_grant(world, kind, &address, true).await?.is_some())
    }

    /// Idempotent union into the parcel-scoped grant, created on first use.
    /// Never touches an existing world-wide record for the same identity.
    pub async fn add_parcels_to_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        parcels: &[Parcel],
    ) -> Result<(), PermissionError> {
        let address = normalize_address(address);
        self.mutate_parcels(world, kind, &address, |owned| {
            let before = owned.len();
            owned.extend(parcels.iter().copied());
            owned.len() != before
        })
        .await
    }

    /// Idempotent difference. The record survives with zero parcels so the
    /// world-wide vs parcel-scoped distinction stays auditable.
    pub async fn delete_parcels_from_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        parcels: &[Parcel],
    ) -> Result<(), PermissionError> {
        let address = normalize_address(address);
        if self.repo.get_grant(world, kind, &address, false).await?.is_none() {
            return Ok(());
        }
        self.mutate_parcels(world, kind, &address, |owned| {
            let before = owned.len();
            for parcel in parcels {
                owned.remove(parcel);
            }
            owned.len() != before
        })
        .await
    }

    /// Every grant the address holds in the world, across kinds and scopes.
    pub async fn get_address_permissions(
        &self,
        world: &WorldName,
        address: &str,
    ) -> Result<Vec<AccessGrantRecord>, PermissionError> {
        let address = normalize_address(address);
        Ok(self.repo.list_grants_for_address(world, &address).await?)
    }

    /// The parcel set of an address's parcel-scoped grant, paginated in
    /// canonical order with the pre-paging total.
    pub async fn get_parcels_for_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        page: PageRequest,
    ) -> Result<Paginated<Parcel>, PermissionError> {
        let address = normalize_address(address);
        let parcels: Vec<Parcel> = match self.repo.get_grant(world, kind, &address, false).await? {
            Some(versioned) => versioned
                .value
                .scope
                .parcels()
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(paginate(parcels, page))
    }

    /// Union of world-wide grantees and grantees whose parcel set intersects
    /// the queried parcels, deduplicated; total computed before paging.
    pub async fn get_addresses_for_parcel_permission(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        parcels: &[Parcel],
        page: PageRequest,
    ) -> Result<Paginated<String>, PermissionError> {
        let grants = self.repo.list_grants(world, kind).await?;
        let addresses: BTreeSet<String> = grants
            .into_iter()
            .filter(|grant| grant.intersects(parcels))
            .map(|grant| grant.address)
            .collect();
        Ok(paginate(addresses.into_iter().collect(), page))
    }

    /// The address's granted parcels, optionally filtered by a bounding box
    /// (built upstream with its all-or-none parameter rule).
    pub async fn get_parcels_for_address(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<Parcel>, PermissionError> {
        let address = normalize_address(address);
        let parcels: Vec<Parcel> = match self.repo.get_grant(world, kind, &address, false).await? {
            Some(versioned) => versioned
                .value
                .scope
                .parcels()
                .map(|set| {
                    set.iter()
                        .copied()
                        .filter(|p| bounds.map_or(true, |bb| bb.contains(p)))
                        .collect()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(parcels)
    }

    async fn mutate_parcels<F>(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        mutate: F,
    ) -> Result<(), PermissionError>
    where
        F: Fn(&mut BTreeSet<Parcel>) -> bool,
    {
        for _attempt in 0..self.max_cas_retries {
            let current = self.repo.get_grant(world, kind, address, false).await?;
            let (mut owned, version) = match &current {
                Some(versioned) => (
                    versioned.value.scope.parcels().cloned().unwrap_or_default(),
                    versioned.version,
                ),
                None => (BTreeSet::new(), 0),
            };
            if !mutate(&mut owned) {
                return Ok(());
            }
            let record = AccessGrantRecord {
                address: address.to_string(),
                kind,
                scope: GrantScope::Parcels { parcels: owned },
            };
            if self.repo.cas_grant(world, version, &record).await? {
                return Ok(());
            }
        }
        warn!(world = %world, kind = %kind, address = %address, "Parcel mutation exhausted CAS retries");
        Err(PermissionError::Storage(RepositoryError::Conflict(format!(
            "{kind} grant for {address} in {world}"
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryPermissionsRepository;

    fn manager() -> (PermissionsManager, WorldName) {
        let repo = Arc::new(InMemoryPermissionsRepository::new());
        let manager = PermissionsManager::new(repo, &AccessControlConfig::default());
        (manager, WorldName::new("w.eth"))
    }

    fn parcels(raw: &[&str]) -> Vec<Parcel> {
        raw.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn parcel_lifecycle_record_survives_empty() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        let set = parcels(&["0,0", "1,0"]);

        manager.add_parcels_to_permission(&world, kind, "0xA", &set).await.unwrap();
        let page = manager
            .get_parcels_for_permission(&world, kind, "0xa", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items, parcels(&["0,0", "1,0"]));

        manager.delete_parcels_from_permission(&world, kind, "0xa", &set).await.unwrap();
        let page = manager
            .get_parcels_for_permission(&world, kind, "0xa", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        // The emptied record is retained, not deleted.
        let grants = manager.get_address_permissions(&world, "0xa").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].scope, GrantScope::Parcels { parcels: BTreeSet::new() });
    }

    #[tokio::test]
    async fn add_parcels_is_idempotent() {
        let (manager, world) = manager();
        let kind = PermissionKind::Streaming;
        let set = parcels(&["2,2"]);
        manager.add_parcels_to_permission(&world, kind, "0xa", &set).await.unwrap();
        manager.add_parcels_to_permission(&world, kind, "0xa", &set).await.unwrap();
        let page = manager
            .get_parcels_for_permission(&world, kind, "0xa", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn world_wide_grant_converts_and_discards_parcels() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        manager
            .add_parcels_to_permission(&world, kind, "0xa", &parcels(&["0,0"]))
            .await
            .unwrap();
        manager.grant_world_wide_permission(&world, kind, "0xA").await.unwrap();

        let grants = manager.get_address_permissions(&world, "0xa").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].scope.is_world_wide());
    }

    #[tokio::test]
    async fn unrestricted_setting_grants_everyone() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        assert!(manager.has_world_wide_permission(&world, kind, "0xnobody").await.unwrap());

        manager
            .set_permission_setting(&world, kind, PermissionSetting::AllowList)
            .await
            .unwrap();
        assert!(!manager.has_world_wide_permission(&world, kind, "0xnobody").await.unwrap());

        manager.grant_world_wide_permission(&world, kind, "0xa").await.unwrap();
        assert!(manager.has_world_wide_permission(&world, kind, "0xA").await.unwrap());
    }

    #[tokio::test]
    async fn addresses_for_parcels_unions_and_dedupes() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        manager.grant_world_wide_permission(&world, kind, "0xwide").await.unwrap();
        manager
            .add_parcels_to_permission(&world, kind, "0xnear", &parcels(&["0,0", "1,0"]))
            .await
            .unwrap();
        manager
            .add_parcels_to_permission(&world, kind, "0xfar", &parcels(&["9,9"]))
            .await
            .unwrap();

        let page = manager
            .get_addresses_for_parcel_permission(
                &world,
                kind,
                &parcels(&["1,0"]),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items, vec!["0xnear".to_string(), "0xwide".to_string()]);
    }

    #[tokio::test]
    async fn bounding_box_filters_parcels() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        manager
            .add_parcels_to_permission(&world, kind, "0xa", &parcels(&["0,0", "1,0", "1,1", "2,2"]))
            .await
            .unwrap();

        let bounds = BoundingBox::from_params(Some(0), Some(0), Some(1), Some(1))
            .unwrap();
        let filtered = manager
            .get_parcels_for_address(&world, kind, "0xa", bounds)
            .await
            .unwrap();
        assert_eq!(filtered, parcels(&["0,0", "1,0", "1,1"]));
    }

    #[test]
    fn parse_parcels_rejects_malformed_coordinates() {
        assert_eq!(parse_parcels(&["0,0".into(), "1,0".into()]).unwrap().len(), 2);
        assert!(parse_parcels(&["0,0".into(), "garbage".into()]).is_err());
    }

    #[tokio::test]
    async fn pagination_totals_are_pre_paging() {
        let (manager, world) = manager();
        let kind = PermissionKind::Deployment;
        let many: Vec<Parcel> = (0..10).map(|x| Parcel::new(x, 0)).collect();
        manager.add_parcels_to_permission(&world, kind, "0xa", &many).await.unwrap();

        let page = manager
            .get_parcels_for_permission(&world, kind, "0xa", PageRequest { offset: 8, limit: 5 })
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        assert_eq!(page.items.len(), 2);
    }
}
