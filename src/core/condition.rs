//! Status condition model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason: some TaskRuns have not finished yet
pub const REASON_RUNNING: &str = "Running";

/// Reason: every TaskRun finished successfully
pub const REASON_SUCCEEDED: &str = "Succeeded";

/// Reason: at least one TaskRun failed
pub const REASON_FAILED: &str = "Failed";

/// Reason: the PipelineRun references something that doesn't exist or doesn't fit
pub const REASON_FAILED_VALIDATION: &str = "FailedValidation";

/// Condition types; only `Succeeded` is produced today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Succeeded,
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A machine-readable status condition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    #[serde(default = "Utc::now")]
    pub last_transition_time: DateTime<Utc>,
}

// Transition time is bookkeeping, not state: two conditions that only differ in
// when they were computed are the same condition.
impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

impl Eq for Condition {}

impl Condition {
    /// Create a `Succeeded` condition stamped with the current time
    pub fn succeeded(
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: ConditionType::Succeeded,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// True or False; Unknown means work is still in progress
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ConditionStatus::True | ConditionStatus::False)
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }
}

/// Look up a condition by type
pub fn get_condition(conditions: &[Condition], condition_type: ConditionType) -> Option<&Condition> {
    conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}

/// Insert or replace the condition of the same type.
///
/// Returns `true` when the stored condition changed. The transition time only
/// moves when the status does.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    {
        Some(existing) if *existing == condition => false,
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}
