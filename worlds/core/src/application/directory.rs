// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Port to the content layer's world catalog. Ownership, block status and
// scene existence live there; this engine only reads them.

use async_trait::async_trait;

use crate::domain::world::WorldName;

#[derive(Debug, Clone)]
pub struct WorldRecord {
    pub name: WorldName,
    /// Owner address, normalized lowercase.
    pub owner: String,
    pub blocked: bool,
}

#[async_trait]
pub trait WorldsDirectory: Send + Sync {
    async fn get_world(&self, world: &WorldName) -> anyhow::Result<Option<WorldRecord>>;

    async fn scene_exists(&self, world: &WorldName, scene_id: &str) -> anyhow::Result<bool>;
}
