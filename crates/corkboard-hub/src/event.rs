use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four authoritative state-change events a board emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskMoved,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
            Self::TaskDeleted => "task-deleted",
            Self::TaskMoved => "task-moved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an event kind from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventKindError {
    pub got: String,
}

impl fmt::Display for ParseEventKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: '{}'", self.got)
    }
}

impl std::error::Error for ParseEventKindError {}

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "task-created" => Ok(Self::TaskCreated),
            "task-updated" => Ok(Self::TaskUpdated),
            "task-deleted" => Ok(Self::TaskDeleted),
            "task-moved" => Ok(Self::TaskMoved),
            _ => Err(ParseEventKindError { got: s.to_string() }),
        }
    }
}

/// One broadcast unit: an event kind plus the full authoritative record
/// it describes, scoped to a board channel.
///
/// The payload is the serialized record itself (a deletion carries the
/// removed record, so subscribers always get at least the task id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardEvent {
    pub kind: EventKind,
    pub board_id: String,
    pub payload: serde_json::Value,
}

impl BoardEvent {
    pub fn new(kind: EventKind, board_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            board_id: board_id.into(),
            payload,
        }
    }
}
