//! Continuation cursors
//!
//! A cursor names the last row a client received. It is opaque to clients and
//! round-trips bit-exactly:
//!
//! - `dist.<origin hash>.<distance bits>.<id>` for distance orderings, hash
//!   and bits as 16 hex digits each. The distance is carried as its IEEE-754 bit
//!   pattern so no decimal truncation can break the tie-break comparison.
//! - `desc.<id>` / `asc.<id>` for id orderings.
//!
//! Distance cursors are bound to the origin point they were computed from.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::query::SortOrder;
use crate::types::{ItemId, Point};
use crate::{Error, Result};

/// Ordering key of the last returned row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorRank {
    Distance {
        origin_hash: u64,
        last_distance_km: f64,
    },
    IdDesc,
    IdAsc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub last_id: ItemId,
    pub rank: CursorRank,
}

impl Cursor {
    pub fn for_distance(origin: &Point, last_distance_km: f64, last_id: ItemId) -> Self {
        Self {
            last_id,
            rank: CursorRank::Distance {
                origin_hash: origin_hash(origin),
                last_distance_km,
            },
        }
    }

    /// Cursor for an id ordering. Distance orderings need [`Cursor::for_distance`].
    pub fn for_id(last_id: ItemId, order: &SortOrder) -> Self {
        let rank = match order {
            SortOrder::IdAsc => CursorRank::IdAsc,
            _ => CursorRank::IdDesc,
        };
        Self { last_id, rank }
    }

    pub fn last_distance_km(&self) -> Option<f64> {
        match self.rank {
            CursorRank::Distance {
                last_distance_km, ..
            } => Some(last_distance_km),
            _ => None,
        }
    }

    /// Reject a cursor issued for another ordering or another origin point
    pub fn ensure_compatible(&self, order: &SortOrder) -> Result<()> {
        match (order, &self.rank) {
            (SortOrder::DistanceAsc { origin }, CursorRank::Distance { origin_hash: h, .. }) => {
                if origin_hash(origin) == *h {
                    Ok(())
                } else {
                    Err(Error::CursorOriginMismatch)
                }
            }
            (SortOrder::IdDesc, CursorRank::IdDesc) | (SortOrder::IdAsc, CursorRank::IdAsc) => {
                Ok(())
            }
            (order, _) => Err(Error::invalid_cursor(format!(
                "cursor was not issued for {} ordering",
                order.name()
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self.rank {
            CursorRank::Distance {
                origin_hash,
                last_distance_km,
            } => format!(
                "dist.{:016x}.{:016x}.{}",
                origin_hash,
                last_distance_km.to_bits(),
                self.last_id
            ),
            CursorRank::IdDesc => format!("desc.{}", self.last_id),
            CursorRank::IdAsc => format!("asc.{}", self.last_id),
        }
    }

    pub fn decode(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();

        match parts.as_slice() {
            ["dist", hash, bits, id] => {
                let origin_hash = parse_hex(hash)?;
                let last_distance_km = f64::from_bits(parse_hex(bits)?);
                if !last_distance_km.is_finite() || last_distance_km < 0.0 {
                    return Err(Error::invalid_cursor(format!(
                        "distance {} is not a valid distance",
                        last_distance_km
                    )));
                }
                Ok(Self {
                    last_id: parse_id(id)?,
                    rank: CursorRank::Distance {
                        origin_hash,
                        last_distance_km,
                    },
                })
            }
            ["desc", id] => Ok(Self {
                last_id: parse_id(id)?,
                rank: CursorRank::IdDesc,
            }),
            ["asc", id] => Ok(Self {
                last_id: parse_id(id)?,
                rank: CursorRank::IdAsc,
            }),
            _ => Err(Error::invalid_cursor(format!(
                "unrecognised cursor token '{}'",
                token
            ))),
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Cursor::decode(s)
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Cursor::decode(&token).map_err(serde::de::Error::custom)
    }
}

/// Hash binding a distance cursor to its origin.
///
/// Hashes the exact bit patterns; `-0.0` is folded into `0.0` since both rank identically.
pub fn origin_hash(origin: &Point) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&canonical_bits(origin.latitude).to_le_bytes());
    bytes[8..].copy_from_slice(&canonical_bits(origin.longitude).to_le_bytes());
    seahash::hash(&bytes)
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn parse_hex(value: &str) -> Result<u64> {
    if value.len() != 16 {
        return Err(Error::invalid_cursor(format!(
            "expected 16 hex digits, got '{}'",
            value
        )));
    }
    u64::from_str_radix(value, 16)
        .map_err(|e| Error::invalid_cursor(format!("bad hex '{}': {}", value, e)))
}

fn parse_id(value: &str) -> Result<ItemId> {
    value
        .parse::<ItemId>()
        .map_err(|e| Error::invalid_cursor(format!("bad id '{}': {}", value, e)))
}
