//! Core identifier types for the settlement economy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantities below this are treated as zero and purged from storage.
pub const EPSILON: f32 = 1e-6;

/// Unique identifier for a good in the world registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoodId(pub u32);

impl fmt::Display for GoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Good#{}", self.0)
    }
}

/// Unique identifier for a settlement
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettlementId(pub u32);

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Settlement#{}", self.0)
    }
}

/// Unique identifier for a region
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region#{}", self.0)
    }
}

/// Unique identifier for a civilization
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CivilizationId(pub u32);

impl fmt::Display for CivilizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Civ#{}", self.0)
    }
}

/// Unique identifier for an item batch.
///
/// The serial is allocated by the arena of the settlement that created the
/// batch, so the pair is unique world-wide even after the batch moves
/// between settlements. A fragment split off a batch keeps the id of its
/// source so provenance stays traceable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemInstanceId {
    pub minted_by: SettlementId,
    pub serial: u64,
}

impl fmt::Display for ItemInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item#{}-{}", self.minted_by.0, self.serial)
    }
}
