// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Repositories
//!
//! Production implementations of the persistence contracts. Settings and
//! grant scopes are stored as JSONB next to a `version` column; the
//! compare-and-swap contract maps to a single conditional `UPDATE` (or an
//! `ON CONFLICT DO NOTHING` insert for the reserved version 0), so lost
//! updates are impossible regardless of how many processes mutate the same
//! world.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::access::AccessSetting;
use crate::domain::permission::{AccessGrantRecord, GrantScope, PermissionKind, PermissionSetting};
use crate::domain::repository::{
    AccessRepository, PermissionsRepository, RepositoryError, Versioned,
};
use crate::domain::world::WorldName;

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessRepository for PostgresAccessRepository {
    async fn get_access(
        &self,
        world: &WorldName,
    ) -> Result<Option<Versioned<AccessSetting>>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT setting, version
            FROM world_access_settings
            WHERE world_name = $1
            "#,
        )
        .bind(world.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let setting: serde_json::Value = row.get("setting");
                let version: i64 = row.get("version");
                Ok(Some(Versioned::new(from_json(setting)?, version as u64)))
            }
            None => Ok(None),
        }
    }

    async fn put_access(
        &self,
        world: &WorldName,
        setting: &AccessSetting,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO world_access_settings (world_name, setting, version, updated_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (world_name) DO UPDATE SET
                setting = EXCLUDED.setting,
                version = world_access_settings.version + 1,
                updated_at = NOW()
            "#,
        )
        .bind(world.as_str())
        .bind(to_json(setting)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn cas_access(
        &self,
        world: &WorldName,
        expected_version: u64,
        setting: &AccessSetting,
    ) -> Result<bool, RepositoryError> {
        let setting = to_json(setting)?;
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO world_access_settings (world_name, setting, version, updated_at)
                VALUES ($1, $2, 1, NOW())
                ON CONFLICT (world_name) DO NOTHING
                "#,
            )
            .bind(world.as_str())
            .bind(setting)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE world_access_settings
                SET setting = $2, version = version + 1, updated_at = NOW()
                WHERE world_name = $1 AND version = $3
                "#,
            )
            .bind(world.as_str())
            .bind(setting)
            .bind(expected_version as i64)
            .execute(&self.pool)
            .await
        };
        Ok(result.map_err(db_err)?.rows_affected() == 1)
    }
}

pub struct PostgresPermissionsRepository {
    pool: PgPool,
}

impl PostgresPermissionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<AccessGrantRecord, RepositoryError> {
        let address: String = row.get("address");
        let kind: String = row.get("kind");
        let kind: PermissionKind = kind
            .parse()
            .map_err(|e: crate::domain::permission::UnknownPermissionKind| {
                RepositoryError::Serialization(e.to_string())
            })?;
        let world_wide: bool = row.get("world_wide");
        let scope = if world_wide {
            GrantScope::WorldWide
        } else {
            let parcels: serde_json::Value = row.get("parcels");
            GrantScope::Parcels { parcels: from_json(parcels)? }
        };
        Ok(AccessGrantRecord { address, kind, scope })
    }
}

#[async_trait]
impl PermissionsRepository for PostgresPermissionsRepository {
    async fn get_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<PermissionSetting, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT setting
            FROM world_permission_settings
            WHERE world_name = $1 AND kind = $2
            "#,
        )
        .bind(world.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let setting: serde_json::Value = row.get("setting");
                from_json(setting)
            }
            None => Ok(PermissionSetting::default()),
        }
    }

    async fn set_permission_setting(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        setting: PermissionSetting,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO world_permission_settings (world_name, kind, setting, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (world_name, kind) DO UPDATE SET
                setting = EXCLUDED.setting,
                updated_at = NOW()
            "#,
        )
        .bind(world.as_str())
        .bind(kind.as_str())
        .bind(to_json(&setting)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<Option<Versioned<AccessGrantRecord>>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT address, kind, world_wide, parcels, version
            FROM world_permission_grants
            WHERE world_name = $1 AND kind = $2 AND address = $3 AND world_wide = $4
            "#,
        )
        .bind(world.as_str())
        .bind(kind.as_str())
        .bind(address)
        .bind(world_wide)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => {
                let version: i64 = row.get("version");
                Ok(Some(Versioned::new(Self::row_to_record(&row)?, version as u64)))
            }
            None => Ok(None),
        }
    }

    async fn put_grant(
        &self,
        world: &WorldName,
        record: &AccessGrantRecord,
    ) -> Result<(), RepositoryError> {
        let parcels = match &record.scope {
            GrantScope::WorldWide => serde_json::Value::Null,
            GrantScope::Parcels { parcels } => to_json(parcels)?,
        };
        sqlx::query(
            r#"
            INSERT INTO world_permission_grants
                (world_name, kind, address, world_wide, parcels, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, 1, NOW())
            ON CONFLICT (world_name, kind, address, world_wide) DO UPDATE SET
                parcels = EXCLUDED.parcels,
                version = world_permission_grants.version + 1,
                updated_at = NOW()
            "#,
        )
        .bind(world.as_str())
        .bind(record.kind.as_str())
        .bind(&record.address)
        .bind(record.scope.is_world_wide())
        .bind(parcels)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn cas_grant(
        &self,
        world: &WorldName,
        expected_version: u64,
        record: &AccessGrantRecord,
    ) -> Result<bool, RepositoryError> {
        let parcels = match &record.scope {
            GrantScope::WorldWide => serde_json::Value::Null,
            GrantScope::Parcels { parcels } => to_json(parcels)?,
        };
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO world_permission_grants
                    (world_name, kind, address, world_wide, parcels, version, updated_at)
                VALUES ($1, $2, $3, $4, $5, 1, NOW())
                ON CONFLICT (world_name, kind, address, world_wide) DO NOTHING
                "#,
            )
            .bind(world.as_str())
            .bind(record.kind.as_str())
            .bind(&record.address)
            .bind(record.scope.is_world_wide())
            .bind(parcels)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE world_permission_grants
                SET parcels = $5, version = version + 1, updated_at = NOW()
                WHERE world_name = $1 AND kind = $2 AND address = $3 AND world_wide = $4
                  AND version = $6
                "#,
            )
            .bind(world.as_str())
            .bind(record.kind.as_str())
            .bind(&record.address)
            .bind(record.scope.is_world_wide())
            .bind(parcels)
            .bind(expected_version as i64)
            .execute(&self.pool)
            .await
        };
        Ok(result.map_err(db_err)?.rows_affected() == 1)
    }

    async fn delete_grant(
        &self,
        world: &WorldName,
        kind: PermissionKind,
        address: &str,
        world_wide: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM world_permission_grants
            WHERE world_name = $1 AND kind = $2 AND address = $3 AND world_wide = $4
            "#,
        )
        .bind(world.as_str())
        .bind(kind.as_str())
        .bind(address)
        .bind(world_wide)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_grants(
        &self,
        world: &WorldName,
        kind: PermissionKind,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT address, kind, world_wide, parcels
            FROM world_permission_grants
            WHERE world_name = $1 AND kind = $2
            ORDER BY address
            "#,
        )
        .bind(world.as_str())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn list_grants_for_address(
        &self,
        world: &WorldName,
        address: &str,
    ) -> Result<Vec<AccessGrantRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT address, kind, world_wide, parcels
            FROM world_permission_grants
            WHERE world_name = $1 AND address = $2
            ORDER BY kind, world_wide
            "#,
        )
        .bind(world.as_str())
        .bind(address)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
