use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::BoardError;

/// Minimum title length in characters.
pub const TITLE_MIN_CHARS: usize = 3;

/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// Maximum description length in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// The three board columns a task can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Todo,
    InProgress,
    Done,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "inProgress",
            Self::Done => "done",
        }
    }

    /// Whether a task in this status counts toward an assignee's load.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

/// Task priority. Defaults to `Medium` on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Wire casing is exact: `inProgress`, not `in_progress`.
        match s.trim() {
            "todo" => Ok(Self::Todo),
            "inProgress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

/// A rejected write preserved on the task until explicitly resolved.
///
/// Only the four mergeable fields are captured; `version` is the version
/// the rejected write would have produced had it been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub version: i64,
    pub modified_by: String,
    #[serde(rename = "modifiedAt")]
    pub modified_at_us: i64,
}

/// The authoritative task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub position: i64,
    pub version: i64,
    pub has_conflict: bool,
    pub conflicting_versions: Vec<ConflictSnapshot>,
    #[serde(rename = "createdAt")]
    pub created_at_us: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at_us: i64,
}

/// Fields supplied when creating a task. Everything not listed gets a
/// default: status `todo`, priority `medium`, position 0, version 1.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub board_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub created_by: String,
}

/// A partial update. Only present fields are applied; absent fields keep
/// their authoritative value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    pub status: Option<Status>,
    pub position: Option<i64>,
}

impl TaskPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.assigned_to.is_none()
            && self.status.is_none()
            && self.position.is_none()
    }
}

/// Check title length constraints (3–100 characters after trimming).
///
/// Uniqueness within the board is enforced separately, by the storage
/// layer's unique index.
pub fn validate_title(title: &str) -> Result<(), BoardError> {
    let len = title.trim().chars().count();
    if len < TITLE_MIN_CHARS || len > TITLE_MAX_CHARS {
        return Err(BoardError::Validation {
            field: "title",
            message: format!(
                "title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"
            ),
        });
    }
    Ok(())
}

/// Check the description length constraint (at most 500 characters).
pub fn validate_description(description: &str) -> Result<(), BoardError> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(BoardError::Validation {
            field: "description",
            message: format!("description cannot exceed {DESCRIPTION_MAX_CHARS} characters"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        ConflictSnapshot, Priority, Status, Task, TaskPatch, validate_description, validate_title,
    };
    use crate::error::BoardError;
    use std::str::FromStr;

    #[test]
    fn status_wire_casing_is_exact() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).expect("serialize"),
            "\"inProgress\""
        );
        assert_eq!(
            serde_json::from_str::<Status>("\"inProgress\"").expect("deserialize"),
            Status::InProgress
        );
        assert!(Status::from_str("in_progress").is_err());
    }

    #[test]
    fn priority_roundtrips_and_defaults_to_medium() {
        for value in [Priority::Low, Priority::Medium, Priority::High] {
            let rendered = value.to_string();
            assert_eq!(Priority::from_str(&rendered).expect("reparse"), value);
        }
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn active_statuses_count_toward_load() {
        assert!(Status::Todo.is_active());
        assert!(Status::InProgress.is_active());
        assert!(!Status::Done.is_active());
    }

    #[test]
    fn title_length_bounds() {
        assert!(validate_title("ok?").is_ok());
        assert!(matches!(
            validate_title("no"),
            Err(BoardError::Validation { field: "title", .. })
        ));
        assert!(validate_title(&"x".repeat(100)).is_ok());
        assert!(validate_title(&"x".repeat(101)).is_err());
        // Trimmed length is what counts.
        assert!(validate_title("  ab  ").is_err());
    }

    #[test]
    fn description_length_bound() {
        assert!(validate_description(&"d".repeat(500)).is_ok());
        assert!(matches!(
            validate_description(&"d".repeat(501)),
            Err(BoardError::Validation {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            priority: Some(Priority::High),
            ..TaskPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn task_json_uses_original_field_names() {
        let task = Task {
            id: "tk-01".into(),
            board_id: "b1".into(),
            title: "Design Spec".into(),
            description: None,
            status: Status::Todo,
            priority: Priority::Medium,
            assigned_to: None,
            created_by: "u1".into(),
            position: 0,
            version: 1,
            has_conflict: false,
            conflicting_versions: vec![],
            created_at_us: 1,
            updated_at_us: 1,
        };
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["boardId"], "b1");
        assert_eq!(json["hasConflict"], false);
        assert_eq!(json["createdAt"], 1);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn snapshot_serializes_only_captured_fields() {
        let snapshot = ConflictSnapshot {
            title: None,
            description: Some("x".into()),
            priority: None,
            assigned_to: None,
            version: 3,
            modified_by: "u2".into(),
            modified_at_us: 42,
        };
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["description"], "x");
        assert_eq!(json["modifiedAt"], 42);
        assert!(json.get("title").is_none());
    }
}
