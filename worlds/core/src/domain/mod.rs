// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access;
pub mod config;
pub mod events;
pub mod permission;
pub mod repository;
pub mod world;

pub use access::{AccessSetting, AccessSettingInput, SecretHash};
pub use config::AccessControlConfig;
pub use events::{AccessChangeEvent, WorldSettingsChangedEvent};
pub use permission::{AccessGrantRecord, GrantScope, PermissionKind, PermissionSetting};
pub use repository::{AccessRepository, PermissionsRepository, RepositoryError, Versioned};
pub use world::{normalize_address, BoundingBox, Parcel, WorldName};
