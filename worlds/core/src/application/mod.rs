// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access_admin;
pub mod access_checker;
pub mod change_handler;
pub mod comms_gate;
pub mod directory;
pub mod permissions;
pub mod rate_limiter;
pub mod secrets;

pub use access_admin::{AccessAdministration, AccessError};
pub use access_checker::{AccessChecker, CommunityMembershipService};
pub use change_handler::{decide_reaction, AccessChangeHandler, ParticipantKicker, PeersRegistry, Reaction};
pub use comms_gate::{CommsGate, CommsGateError, ConnectionRequest, RealtimeBackend};
pub use directory::{WorldRecord, WorldsDirectory};
pub use permissions::{PageRequest, Paginated, PermissionError, PermissionsManager};
pub use rate_limiter::{resolve_subject, RateLimitOutcome, RateLimiter};
pub use secrets::SecretHasher;
