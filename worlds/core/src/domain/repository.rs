// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Contracts
//!
//! One repository trait per aggregate, defined here and implemented in
//! `crate::infrastructure::repositories` (in-memory for dev/test, PostgreSQL
//! for production).
//!
//! Read-modify-write mutations go through versioned loads and
//! compare-and-swap stores: two concurrent "add wallet" calls must never
//! lose an update, and in-process locking cannot guarantee that across
//! process boundaries.

use async_trait::async_trait;
use thiserror::Error;

use super::access::AccessSetting;
use super::permission::{AccessGrantRecord, PermissionKind, PermissionSetting};
use super::world::WorldName;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Concurrent modification of {0} exhausted retries")]
    Conflict(String),
}

/// A stored value plus its optimistic-concurrency version.
///
/// Version `0` is reserved for "no record yet": a compare-and-swap expecting
/// `0` is an insert that fails if someone else created the record first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

/// Durable storage for per-world access settings.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Current setting with its version, `None` when the world has no record.
    async fn get_access(&self, world: &WorldName)
        -> Result<Option<Versioned<AccessSetting>>, RepositoryError>;

    /// Unconditional write (full replacement via `set_access`).
    async fn put_access(
        &self,
        world: &WorldName,
        setting: &AccessSetting,
    ) -> Result<(), RepositoryError>;

    /// Compare-and-swap write; `expected_version == 0` means insert-if-absent.
    /// Returns `false` when the stored version no longer matches.
    async fn cas_access(
        &self,
        world: &WorldName,
        expected_version: u64,
        setting: &AccessSetting,
    ) -> Result<bool, RepositoryError>;
}

/// Durable storage for permission settings and grant records.
#[async_trait]
pub trait PermissionsRepository: Send + Sync {
    /// Governing mode for (world, kind); absent records default to
    /// `Unrestricted`.
    async fn get_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<PermissionSetting, RepositoryError>;

    async fn set_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        setting: PermissionSetting,
    ) -> Result<(), RepositoryError>;

    /// Loads the grant record for (world, kind, address) in the given scope
    /// class. `world_wide` selects between the two independent records an
    /// address may hold.
    async fn get_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<Option<Versioned<AccessGrantRecord>>, RepositoryError>;

    /// Idempotent upsert keyed by (world, kind, address, scope class).
    async fn put_grant(
        &self,
        world: &WorldName,
        record: &AccessGrantRecord,
    ) -> Result<(), RepositoryError>;

    /// Compare-and-swap replacement of a grant record (parcel set mutation).
    /// `expected_version == 0` inserts. Returns `false` on version mismatch.
    async fn cas_grant(
        &self,
        world: &WorldName,
        expected_version: u64,
        record: &AccessGrantRecord,
    ) -> Result<bool, RepositoryError>;

    async fn delete_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<(), RepositoryError>;

    /// All grant records for (world, kind), both scopes.
    async fn list_grants(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError>;

    /// All grant records an address holds in a world, across kinds.
    async fn list_grants_for_address(
        &self,
        world: &WorldName,
        address: &str,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError>;
}
