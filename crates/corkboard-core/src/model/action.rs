use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::task::{ParseEnumError, Priority, Status};

/// The seven kinds of logged domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Move,
    Assign,
    SmartAssign,
    ResolveConflict,
}

impl ActionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Assign => "assign",
            Self::SmartAssign => "smart_assign",
            Self::ResolveConflict => "resolve_conflict",
        }
    }

    /// All action types, for enumeration in tests and schema checks.
    pub const ALL: [Self; 7] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Move,
        Self::Assign,
        Self::SmartAssign,
        Self::ResolveConflict,
    ];
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "move" => Ok(Self::Move),
            "assign" => Ok(Self::Assign),
            "smart_assign" => Ok(Self::SmartAssign),
            "resolve_conflict" => Ok(Self::ResolveConflict),
            _ => Err(ParseEnumError {
                expected: "action type",
                got: s.to_string(),
            }),
        }
    }
}

/// Event-specific snapshot attached to an action. Which fields are set
/// depends on the action type: creates/updates capture the written fields,
/// moves capture the column transition, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_assigned_to: Option<String>,
}

/// One row in the append-only action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub details: ActionDetails,
    pub board_id: String,
    #[serde(rename = "timestamp")]
    pub timestamp_us: i64,
}

impl Action {
    /// Human-readable one-line summary for activity feeds.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.action_type {
            ActionType::Create => "created a new task".to_string(),
            ActionType::Update => "updated a task".to_string(),
            ActionType::Delete => "deleted a task".to_string(),
            ActionType::Move => match (self.details.from_status, self.details.to_status) {
                (Some(from), Some(to)) => format!("moved a task from {from} to {to}"),
                _ => "moved a task".to_string(),
            },
            ActionType::Assign => self.details.assigned_to.as_ref().map_or_else(
                || "assigned a task".to_string(),
                |assignee| format!("assigned task to {assignee}"),
            ),
            ActionType::SmartAssign => self.details.smart_assigned_to.as_ref().map_or_else(
                || "smart assigned a task".to_string(),
                |assignee| format!("smart assigned task to {assignee}"),
            ),
            ActionType::ResolveConflict => "resolved a task conflict".to_string(),
        }
    }
}
