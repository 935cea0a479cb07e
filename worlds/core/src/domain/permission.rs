// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permission Grants
//!
//! Per-world grants controlling who may deploy or stream content. A grant is
//! either world-wide or scoped to an explicit parcel set; the same identity
//! may hold one of each, and they are created and removed independently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::world::{normalize_address, Parcel};

/// The two delegated rights a world owner can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Deployment,
    Streaming,
}

impl PermissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Streaming => "streaming",
        }
    }

    pub const ALL: [PermissionKind; 2] = [Self::Deployment, Self::Streaming];
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown permission kind '{0}': expected 'deployment' or 'streaming'")]
pub struct UnknownPermissionKind(String);

impl FromStr for PermissionKind {
    type Err = UnknownPermissionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment" => Ok(Self::Deployment),
            "streaming" => Ok(Self::Streaming),
            other => Err(UnknownPermissionKind(other.to_string())),
        }
    }
}

/// How a (world, kind) pair is governed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PermissionSetting {
    /// Everyone holds the permission; grant records are not consulted.
    #[default]
    Unrestricted,
    /// Only explicitly granted identities hold the permission.
    AllowList,
}

/// The spatial reach of a single grant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "kebab-case")]
pub enum GrantScope {
    WorldWide,
    /// An empty set is legal: the record survives parcel removal so the
    /// world-wide vs parcel-scoped distinction stays auditable.
    Parcels { parcels: BTreeSet<Parcel> },
}

impl GrantScope {
    pub fn is_world_wide(&self) -> bool {
        matches!(self, Self::WorldWide)
    }

    pub fn parcels(&self) -> Option<&BTreeSet<Parcel>> {
        match self {
            Self::WorldWide => None,
            Self::Parcels { parcels } => Some(parcels),
        }
    }
}

/// One allow-list entry for a (world, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrantRecord {
    /// Grantee address, normalized lowercase.
    pub address: String,
    pub kind: PermissionKind,
    pub scope: GrantScope,
}

impl AccessGrantRecord {
    pub fn world_wide(kind: PermissionKind, address: &str) -> Self {
        Self {
            address: normalize_address(address),
            kind,
            scope: GrantScope::WorldWide,
        }
    }

    pub fn parcel_scoped(kind: PermissionKind, address: &str, parcels: BTreeSet<Parcel>) -> Self {
        Self {
            address: normalize_address(address),
            kind,
            scope: GrantScope::Parcels { parcels },
        }
    }

    /// True when this grant covers any of the queried parcels.
    pub fn intersects(&self, parcels: &[Parcel]) -> bool {
        match &self.scope {
            GrantScope::WorldWide => true,
            GrantScope::Parcels { parcels: owned } => parcels.iter().any(|p| owned.contains(p)),
        }
    }
}
