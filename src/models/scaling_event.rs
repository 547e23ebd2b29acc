use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Metric that drove a scaling evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Cpu,
    Memory,
    Connections,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::Cpu => write!(f, "cpu"),
            TriggerType::Memory => write!(f, "memory"),
            TriggerType::Connections => write!(f, "connections"),
        }
    }
}

/// Scaling action recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    /// No scaling action needed (or suppressed by cooldown)
    #[serde(rename = "none")]
    NoChange,
}

impl fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingAction::ScaleUp => write!(f, "scale_up"),
            ScalingAction::ScaleDown => write!(f, "scale_down"),
            ScalingAction::NoChange => write!(f, "none"),
        }
    }
}

/// A recorded scaling evaluation.
///
/// `proposed_action` is what the load called for; `action` is what was emitted after
/// cooldown enforcement. An external orchestrator acts on `action` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub id: Uuid,
    pub target: String,
    pub trigger_type: TriggerType,
    pub trigger_value: f64,
    pub threshold_value: f64,
    pub proposed_action: ScalingAction,
    pub action: ScalingAction,
    pub decided_at: DateTime<Utc>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl ScalingEvent {
    /// Proposal was coerced to `none` by an active cooldown
    pub fn suppressed_by_cooldown(&self) -> bool {
        self.proposed_action != ScalingAction::NoChange && self.action == ScalingAction::NoChange
    }

    pub fn is_actionable(&self) -> bool {
        self.action != ScalingAction::NoChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_change_serializes_as_none() {
        let json = serde_json::to_string(&ScalingAction::NoChange).unwrap();
        assert_eq!(json, "\"none\"");
        let json = serde_json::to_string(&ScalingAction::ScaleUp).unwrap();
        assert_eq!(json, "\"scale_up\"");
    }
}
