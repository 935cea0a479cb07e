// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Worlds — Access & Permission Control Engine
//!
//! Grants or denies identities access to named worlds, manages delegated
//! deployment/streaming rights, and reactively evicts connected
//! participants whose access disappears when a setting changes.
//!
//! # Architecture
//!
//! - **domain** — value types, the access-setting union, grant records,
//!   repository contracts
//! - **application** — access evaluation, administration, the transition
//!   policy, permissions queries, rate limiting, connection-string gating
//! - **infrastructure** — in-memory and PostgreSQL repositories, HTTP
//!   adapters for the membership service and realtime backend, the
//!   notification bus

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
