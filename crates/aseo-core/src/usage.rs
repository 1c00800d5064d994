//! # Usage Log Entity
//!
//! One [`UsageRecord`] per entry/exit cycle. Records are created at entry,
//! closed exactly once at exit, and never deleted. A record with
//! `exit_time = None` is an *open* record; the transition protocol keeps at
//! most one open record per facility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{FacilityId, RecordId};

/// Condition the facility was left in, reported by the student at exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCondition {
    Good,
    Fair,
    Poor,
}

impl ExitCondition {
    /// Stable lowercase name, matching the store's `exit_condition` values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl std::fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExitCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            other => Err(format!(
                "unknown exit condition '{other}' (expected good, fair or poor)"
            )),
        }
    }
}

/// One entry/exit cycle. `exit_time`, `exit_condition` and `exit_note` are
/// written together when the cycle closes, never individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: RecordId,
    pub student_name: String,
    pub student_group: String,
    /// References a registry row by id; resolved by lookup, not embedded.
    pub facility_id: FacilityId,
    pub entry_time: DateTime<Utc>,
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_condition: Option<ExitCondition>,
    #[serde(default)]
    pub exit_note: Option<String>,
}

impl UsageRecord {
    /// Whether this cycle is still in progress.
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// A closed record joined with the facility's display name, as shown in the
/// history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedUsage {
    #[serde(flatten)]
    pub record: UsageRecord,
    pub facility_name: String,
}
