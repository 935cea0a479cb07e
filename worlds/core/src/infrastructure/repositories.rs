// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # In-Memory Repositories
//!
//! Development and test implementations of the persistence contracts. They
//! honor the same versioned compare-and-swap semantics as the PostgreSQL
//! implementations so concurrency behavior can be exercised without a
//! database.

pub mod postgres;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::access::AccessSetting;
use crate::domain::permission::{AccessGrantRecord, PermissionKind, PermissionSetting};
use crate::domain::repository::{
    AccessRepository, PermissionsRepository, RepositoryError, Versioned,
};
use crate::domain::world::WorldName;

#[derive(Clone, Default)]
pub struct InMemoryAccessRepository {
    settings: Arc<Mutex<HashMap<WorldName, Versioned<AccessSetting>>>>,
}

impl InMemoryAccessRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessRepository for InMemoryAccessRepository {
    async fn get_access(
        &self,
        world: &WorldName,
    ) -> Result<Option<Versioned<AccessSetting>>, RepositoryError> {
        Ok(self.settings.lock().get(world).cloned())
    }

    async fn put_access(
        &self,
        world: &WorldName,
        setting: &AccessSetting,
    ) -> Result<(), RepositoryError> {
        let mut settings = self.settings.lock();
        let version = settings.get(world).map(|v| v.version).unwrap_or(0) + 1;
        settings.insert(world.clone(), Versioned::new(setting.clone(), version));
        Ok(())
    }

    async fn cas_access(
        &self,
        world: &WorldName,
        expected_version: u64,
        setting: &AccessSetting,
    ) -> Result<bool, RepositoryError> {
        let mut settings = self.settings.lock();
        let current = settings.get(world).map(|v| v.version).unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        settings.insert(world.clone(), Versioned::new(setting.clone(), current + 1));
        Ok(true)
    }
}

type GrantKey = (WorldName, PermissionKind, String, bool);

#[derive(Clone, Default)]
pub struct InMemoryPermissionsRepository {
    settings: Arc<Mutex<HashMap<(WorldName, PermissionKind), PermissionSetting>>>,
    grants: Arc<Mutex<HashMap<GrantKey, Versioned<AccessGrantRecord>>>>,
}

impl InMemoryPermissionsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionsRepository for InMemoryPermissionsRepository {
    async fn get_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<PermissionSetting, RepositoryError> {
        Ok(self
            .settings
            .lock()
            .get(&(world.clone(), kind))
            .copied()
            .unwrap_or_default())
    }

    async fn set_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        setting: PermissionSetting,
    ) -> Result<(), RepositoryError> {
        self.settings.lock().insert((world.clone(), kind), setting);
        Ok(())
    }

    async fn get_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<Option<Versioned<AccessGrantRecord>>, RepositoryError> {
        let key = (world.clone(), kind, address.to_string(), world_wide);
        Ok(self.grants.lock().get(&key).cloned())
    }

    async fn put_grant(
        &self,
        world: &WorldName,
        record: &AccessGrantRecord,
    ) -> Result<(), RepositoryError> {
        let key = (
            world.clone(),
            record.kind,
            record.address.clone(),
            record.scope.is_world_wide(),
        );
        let mut grants = self.grants.lock();
        let version = grants.get(&key).map(|v| v.version).unwrap_or(0) + 1;
        grants.insert(key, Versioned::new(record.clone(), version));
        Ok(())
    }

    async fn cas_grant(
        &self,
        world: &WorldName,
        expected_version: u64,
        record: &AccessGrantRecord,
    ) -> Result<bool, RepositoryError> {
        let key = (
            world.clone(),
            record.kind,
            record.address.clone(),
            record.scope.is_world_wide(),
        );
        let mut grants = self.grants.lock();
        let current = grants.get(&key).map(|v| v.version).unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        grants.insert(key, Versioned::new(record.clone(), current + 1));
        Ok(true)
    }

    async fn delete_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<(), RepositoryError> {
        let key = (world.clone(), kind, address.to_string(), world_wide);
        self.grants.lock().remove(&key);
        Ok(())
    }

    async fn list_grants(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError> {
        let grants = self.grants.lock();
        let mut records: Vec<AccessGrantRecord> = grants
            .iter()
            .filter(|((w, k, _, _), _)| w == world && *k == kind)
            .map(|(_, v)| v.value.clone())
            .collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(records)
    }

    async fn list_grants_for_address(
        &self,
        world: &WorldName,
        address: &str,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError> {
        let grants = self.grants.lock();
        let mut records: Vec<AccessGrantRecord> = grants
            .iter()
            .filter(|((w, _, a, _), _)| w == world && a == address)
            .map(|(_, v)| v.value.clone())
            .collect();
        records.sort_by_key(|r| (r.kind.as_str(), r.scope.is_world_wide()));
        Ok(records)
    }
}
