//! # Facility Registry Entity
//!
//! A [`Facility`] is one trackable restroom unit. Its occupancy is modeled as
//! an enum: the occupant only exists inside the `Occupied` variant, so a free
//! facility with leftover occupant fields (or an occupied one without them)
//! is unrepresentable in memory. The flat nullable-column form only appears
//! at the store boundary, which must refuse rows violating the invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::FacilityId;

/// The two occupancy states a facility can be in. There are no others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyState {
    Free,
    Occupied,
}

impl OccupancyState {
    /// Stable lowercase name, matching the store's `state` column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OccupancyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "occupied" => Ok(Self::Occupied),
            other => Err(format!("unknown occupancy state '{other}'")),
        }
    }
}

/// Who is inside an occupied facility, captured at entry time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub occupant_name: String,
    pub occupant_group: String,
    /// Free-text note supplied on entry, if any.
    #[serde(default)]
    pub entry_note: Option<String>,
}

/// Occupancy of a facility. Internally tagged on `state` so the serialized
/// form matches the flat registry row (`state` plus occupant columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Occupancy {
    Free,
    Occupied(Occupant),
}

impl Occupancy {
    /// The discriminant without the occupant payload.
    pub fn state(&self) -> OccupancyState {
        match self {
            Self::Free => OccupancyState::Free,
            Self::Occupied(_) => OccupancyState::Occupied,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// The occupant, present iff the facility is occupied.
    pub fn occupant(&self) -> Option<&Occupant> {
        match self {
            Self::Free => None,
            Self::Occupied(occupant) => Some(occupant),
        }
    }
}

/// One registry row. Facilities are provisioned out-of-band and never
/// created or deleted by this system; only `occupancy` and `last_change`
/// are ever written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    /// Display label. Group bucketing is by substring containment on this
    /// name, see [`crate::query::group_summary`].
    pub name: String,
    #[serde(flatten)]
    pub occupancy: Occupancy,
    /// Bumped on every state write; monotonically non-decreasing.
    pub last_change: DateTime<Utc>,
}

impl Facility {
    pub fn state(&self) -> OccupancyState {
        self.occupancy.state()
    }
}
