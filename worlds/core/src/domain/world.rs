// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # World & Parcel Value Types
//!
//! Core identifiers for the worlds platform. World names are unique and
//! case-insensitive; parcels are signed integer coordinates with the
//! canonical string form `"x,y"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Case-insensitive world name.
///
/// The lowercase form is the canonical key everywhere (storage, rate-limit
/// keys, peer lookups). The original casing is not preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldName(String);

impl WorldName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParcelError {
    #[error("Malformed parcel '{0}': expected 'x,y' with integer coordinates")]
    Malformed(String),
}

/// A single parcel coordinate, canonical string form `"x,y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parcel {
    pub x: i32,
    pub y: i32,
}

impl Parcel {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Parcel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Parcel {
    type Err = ParcelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let (x, y) = match (parts.next(), parts.next(), parts.next()) {
            (Some(x), Some(y), None) => (x.trim(), y.trim()),
            _ => return Err(ParcelError::Malformed(s.to_string())),
        };
        let x = x.parse::<i32>().map_err(|_| ParcelError::Malformed(s.to_string()))?;
        let y = y.parse::<i32>().map_err(|_| ParcelError::Malformed(s.to_string()))?;
        Ok(Self { x, y })
    }
}

impl Serialize for Parcel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Parcel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundingBoxError {
    #[error("Partial bounding box: x1, y1, x2 and y2 must all be present or all absent")]
    Partial,
}

/// Inclusive rectangular parcel filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Builds a bounding box from four optional query parameters.
    ///
    /// All four must be present together; a partial set is a validation
    /// error, not a silently ignored filter.
    pub fn from_params(
        x1: Option<i32>,
        y1: Option<i32>,
        x2: Option<i32>,
        y2: Option<i32>,
    ) -> Result<Option<Self>, BoundingBoxError> {
        match (x1, y1, x2, y2) {
            (Some(x1), Some(y1), Some(x2), Some(y2)) => Ok(Some(Self { x1, y1, x2, y2 })),
            (None, None, None, None) => Ok(None),
            _ => Err(BoundingBoxError::Partial),
        }
    }

    pub fn contains(&self, parcel: &Parcel) -> bool {
        self.x1 <= parcel.x && parcel.x <= self.x2 && self.y1 <= parcel.y && parcel.y <= self.y2
    }
}

/// Normalizes a wallet address or identity for comparisons and storage.
///
/// Addresses are compared case-insensitively across the whole engine.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_name_is_case_insensitive() {
        assert_eq!(WorldName::new("MyWorld.eth"), WorldName::new("myworld.ETH"));
        assert_eq!(WorldName::new(" myworld.eth ").as_str(), "myworld.eth");
    }

    #[test]
    fn parcel_round_trips_canonical_form() {
        let p: Parcel = "-3,14".parse().unwrap();
        assert_eq!(p, Parcel::new(-3, 14));
        assert_eq!(p.to_string(), "-3,14");
    }

    #[test]
    fn parcel_rejects_malformed_input() {
        assert!("".parse::<Parcel>().is_err());
        assert!("1".parse::<Parcel>().is_err());
        assert!("1,2,3".parse::<Parcel>().is_err());
        assert!("a,b".parse::<Parcel>().is_err());
    }

    #[test]
    fn bounding_box_requires_all_four_params() {
        assert_eq!(
            BoundingBox::from_params(Some(0), Some(0), Some(1), None),
            Err(BoundingBoxError::Partial)
        );
        assert_eq!(BoundingBox::from_params(None, None, None, None), Ok(None));
        let bb = BoundingBox::from_params(Some(0), Some(0), Some(1), Some(1))
            .unwrap()
            .unwrap();
        assert!(bb.contains(&Parcel::new(1, 0)));
        assert!(!bb.contains(&Parcel::new(2, 2)));
    }
}
