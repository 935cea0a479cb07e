// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod community_client;
pub mod db;
pub mod event_bus;
pub mod peers;
pub mod realtime;
pub mod repositories;

pub use community_client::HttpCommunityService;
pub use db::Database;
pub use event_bus::{EventBusError, SettingsEventBus, SettingsEventReceiver};
pub use peers::InMemoryPeersRegistry;
pub use realtime::{CommsParticipantKicker, HttpRealtimeBackend};
pub use repositories::{InMemoryAccessRepository, InMemoryPermissionsRepository};
