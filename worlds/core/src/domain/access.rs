// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Settings
//!
//! Each world carries exactly one [`AccessSetting`] deciding who may join.
//! The variants form a tagged union; evaluation and transitions are pattern
//! matches over the enum pair, never dispatch hierarchies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::world::normalize_address;

/// Salted Argon2id hash of a world's shared secret.
///
/// Redacts itself from `Debug` so settings can be logged without leaking
/// hash material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHash(String);

impl SecretHash {
    pub fn new(encoded: String) -> Self {
        Self(encoded)
    }

    /// PHC-encoded hash string, for verification only.
    pub fn encoded(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash(<redacted>)")
    }
}

/// The access model active for a world. Exactly one variant at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AccessSetting {
    /// Anyone may join. Default for worlds with no stored setting.
    Unrestricted,
    /// Joining requires presenting the shared secret.
    SharedSecret { secret_hash: SecretHash },
    /// Reserved: on-chain ownership verification is not implemented, this
    /// variant currently denies everyone.
    NftOwnership { nft_ref: String },
    /// Joining requires an allow-listed wallet or community membership.
    AllowList {
        #[serde(default)]
        wallets: BTreeSet<String>,
        #[serde(default)]
        communities: BTreeSet<String>,
    },
}

impl Default for AccessSetting {
    fn default() -> Self {
        Self::Unrestricted
    }
}

impl AccessSetting {
    /// Stable variant name for events and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::SharedSecret { .. } => "shared-secret",
            Self::NftOwnership { .. } => "nft-ownership",
            Self::AllowList { .. } => "allow-list",
        }
    }

    /// Builds an allow-list setting, normalizing wallets to lowercase and
    /// deduplicating both sets.
    pub fn allow_list<W, C>(wallets: W, communities: C) -> Self
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self::AllowList {
            wallets: wallets
                .into_iter()
                .map(|w| normalize_address(w.as_ref()))
                .collect(),
            communities: communities
                .into_iter()
                .map(|c| c.as_ref().trim().to_string())
                .collect(),
        }
    }
}

/// Raw `set_access` input, before validation and secret hashing.
///
/// The plaintext secret only exists here; it is hashed at the admin boundary
/// and never persisted or logged.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AccessSettingInput {
    Unrestricted,
    SharedSecret {
        #[serde(default)]
        secret: String,
    },
    NftOwnership {
        #[serde(default)]
        nft_ref: String,
    },
    AllowList {
        #[serde(default)]
        wallets: Vec<String>,
        #[serde(default)]
        communities: Vec<String>,
    },
}
