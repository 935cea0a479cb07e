// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access::AccessSetting;
use super::world::WorldName;

/// Transient before/after pair handed to the change handler after a
/// committed access-setting write. Never persisted.
#[derive(Debug, Clone)]
pub struct AccessChangeEvent {
    pub world: WorldName,
    pub previous: AccessSetting,
    pub new: AccessSetting,
}

/// Published on the notification bus after every successful `set_access`.
///
/// Carries only the setting type, never the setting payload, so subscribers
/// cannot observe hashes or allow-list contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettingsChangedEvent {
    pub event_id: Uuid,
    pub world: WorldName,
    pub access_type: String,
    pub changed_at: DateTime<Utc>,
}

impl WorldSettingsChangedEvent {
    pub fn new(world: WorldName, setting: &AccessSetting) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            world,
            access_type: setting.type_name().to_string(),
            changed_at: Utc::now(),
        }
    }
}
