//! Conflict resolution.
//!
//! A task accumulates pending snapshots while stale writes are rejected;
//! resolution collapses them into one new authoritative version. Either
//! branch clears every pending snapshot and bumps the version, so the
//! resolved record supersedes all rejected writes at once.

use rusqlite::params;
use serde::Deserialize;
use std::{fmt, str::FromStr};

use corkboard_hub::EventKind;

use super::{TaskStore, map_title_constraint, now_us};
use crate::error::BoardError;
use crate::model::action::{ActionDetails, ActionType};
use crate::model::task::{ParseEnumError, Priority, Task, validate_description, validate_title};

/// How to collapse a task's pending conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Field-by-field merge: a non-empty value from the supplied conflict
    /// data wins, anything else keeps the current authoritative value.
    Merge,
    /// Keep the current authoritative fields and discard every pending
    /// snapshot. The wire name is `overwrite`; callers label it "keep mine".
    KeepMine,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::KeepMine => "overwrite",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "merge" => Ok(Self::Merge),
            "overwrite" => Ok(Self::KeepMine),
            _ => Err(ParseEnumError {
                expected: "resolution",
                got: s.to_string(),
            }),
        }
    }
}

/// The winning field values a merge resolution carries. Typically one of
/// the rejected snapshots, edited by the resolving user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConflictData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
}

impl TaskStore {
    /// Collapse a task's pending conflicts into a new authoritative
    /// version. Resolving a task with no pending conflicts is a plain
    /// version bump, not an error.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound`, a validation error when merged fields fail
    /// their constraints, or a storage error.
    pub fn resolve_conflict(
        &self,
        board_id: &str,
        task_id: &str,
        resolution: Resolution,
        conflict_data: Option<&ConflictData>,
        actor: &str,
    ) -> Result<Task, BoardError> {
        let now = now_us();
        let task = {
            let mut conn = self.lock();
            let current = Self::get_with(&conn, board_id, task_id)?;

            let (title, description, priority, assigned_to) = match (resolution, conflict_data) {
                (Resolution::Merge, Some(data)) => merged_fields(&current, data)?,
                // KeepMine, or a merge with nothing to merge from.
                _ => (
                    current.title.clone(),
                    current.description.clone(),
                    current.priority,
                    current.assigned_to.clone(),
                ),
            };

            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, priority = ?3,
                     assigned_to = ?4, has_conflict = 0,
                     version = version + 1, updated_at_us = ?5
                 WHERE task_id = ?6 AND board_id = ?7",
                params![
                    title,
                    description,
                    priority.as_str(),
                    assigned_to,
                    now,
                    task_id,
                    board_id,
                ],
            )
            .map_err(map_title_constraint)?;
            tx.execute(
                "DELETE FROM task_conflicts WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.commit()?;

            Self::get_with(&conn, board_id, task_id)?
        };
        tracing::debug!(
            task_id,
            board_id,
            %resolution,
            version = task.version,
            "conflict resolved"
        );

        self.log_action(
            ActionType::ResolveConflict,
            actor,
            Some(task_id),
            board_id,
            ActionDetails {
                title: Some(task.title.clone()),
                conflict_resolved: Some(true),
                ..ActionDetails::default()
            },
            now,
        );
        self.publish(EventKind::TaskUpdated, &task);
        Ok(task)
    }
}

type ResolvedFields = (String, Option<String>, Priority, Option<String>);

fn merged_fields(current: &Task, data: &ConflictData) -> Result<ResolvedFields, BoardError> {
    let title = match data.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => {
            validate_title(title)?;
            title.to_string()
        }
        _ => current.title.clone(),
    };
    let description = match data.description.as_deref() {
        Some(description) if !description.is_empty() => {
            validate_description(description)?;
            Some(description.to_string())
        }
        _ => current.description.clone(),
    };
    let priority = data.priority.unwrap_or(current.priority);
    let assigned_to = match data.assigned_to.as_deref() {
        Some(assignee) if !assignee.is_empty() => Some(assignee.to_string()),
        _ => current.assigned_to.clone(),
    };
    Ok((title, description, priority, assigned_to))
}

#[cfg(test)]
mod tests {
    use super::{ConflictData, Resolution};
    use crate::error::BoardError;
    use crate::model::task::{Priority, TaskDraft, TaskPatch};
    use crate::store::TaskStore;
    use corkboard_hub::{BroadcastHub, EventKind};
    use std::str::FromStr;

    fn store() -> TaskStore {
        TaskStore::in_memory(BroadcastHub::new()).expect("in-memory store")
    }

    fn conflicted_task(store: &TaskStore) -> String {
        let task = store
            .create(&TaskDraft {
                board_id: "b1".to_string(),
                title: "Design Spec".to_string(),
                description: None,
                priority: None,
                assigned_to: None,
                created_by: "u1".to_string(),
            })
            .expect("create");
        store
            .update(
                "b1",
                &task.id,
                &TaskPatch {
                    priority: Some(Priority::High),
                    ..TaskPatch::default()
                },
                Some(1),
                "u1",
            )
            .expect("accepted update");
        let outcome = store
            .update(
                "b1",
                &task.id,
                &TaskPatch {
                    description: Some("x".to_string()),
                    ..TaskPatch::default()
                },
                Some(1),
                "u2",
            )
            .expect("stale update");
        assert!(outcome.is_conflict());
        task.id
    }

    #[test]
    fn resolution_parses_its_wire_names() {
        assert_eq!(Resolution::from_str("merge"), Ok(Resolution::Merge));
        assert_eq!(Resolution::from_str("overwrite"), Ok(Resolution::KeepMine));
        assert!(Resolution::from_str("keep-mine").is_err());
    }

    #[test]
    fn merge_takes_supplied_fields_and_keeps_the_rest() {
        let store = store();
        let id = conflicted_task(&store);

        let data = ConflictData {
            description: Some("x".to_string()),
            ..ConflictData::default()
        };
        let resolved = store
            .resolve_conflict("b1", &id, Resolution::Merge, Some(&data), "u2")
            .expect("resolve");

        assert_eq!(resolved.version, 3);
        assert_eq!(resolved.description.as_deref(), Some("x"));
        assert_eq!(resolved.priority, Priority::High, "unsupplied field kept");
        assert!(!resolved.has_conflict);
        assert!(resolved.conflicting_versions.is_empty());
    }

    #[test]
    fn empty_strings_do_not_win_a_merge() {
        let store = store();
        let id = conflicted_task(&store);

        let data = ConflictData {
            title: Some(String::new()),
            description: Some(String::new()),
            ..ConflictData::default()
        };
        let resolved = store
            .resolve_conflict("b1", &id, Resolution::Merge, Some(&data), "u2")
            .expect("resolve");
        assert_eq!(resolved.title, "Design Spec");
        assert_eq!(resolved.description, None);
    }

    #[test]
    fn keep_mine_discards_snapshots_without_changing_fields() {
        let store = store();
        let id = conflicted_task(&store);

        let resolved = store
            .resolve_conflict("b1", &id, Resolution::KeepMine, None, "u1")
            .expect("resolve");
        assert_eq!(resolved.version, 3);
        assert_eq!(resolved.priority, Priority::High);
        assert_eq!(resolved.description, None);
        assert!(!resolved.has_conflict);
        assert!(resolved.conflicting_versions.is_empty());
    }

    #[test]
    fn resolving_without_pending_conflicts_is_a_version_bump() {
        let store = store();
        let task = store
            .create(&TaskDraft {
                board_id: "b1".to_string(),
                title: "Quiet task".to_string(),
                description: None,
                priority: None,
                assigned_to: None,
                created_by: "u1".to_string(),
            })
            .expect("create");

        let resolved = store
            .resolve_conflict("b1", &task.id, Resolution::Merge, None, "u1")
            .expect("resolve");
        assert_eq!(resolved.version, 2);
        assert!(!resolved.has_conflict);
    }

    #[test]
    fn merged_title_is_validated() {
        let store = store();
        let id = conflicted_task(&store);

        let data = ConflictData {
            title: Some("no".to_string()),
            ..ConflictData::default()
        };
        assert!(matches!(
            store.resolve_conflict("b1", &id, Resolution::Merge, Some(&data), "u2"),
            Err(BoardError::Validation { field: "title", .. })
        ));
        // Failed resolution leaves the conflict pending.
        let task = store.get("b1", &id).expect("get");
        assert!(task.has_conflict);
    }

    #[test]
    fn resolution_logs_and_broadcasts() {
        let hub = BroadcastHub::new();
        let store = TaskStore::in_memory(hub.clone()).expect("store");
        let task = store
            .create(&TaskDraft {
                board_id: "b1".to_string(),
                title: "Watched task".to_string(),
                description: None,
                priority: None,
                assigned_to: None,
                created_by: "u1".to_string(),
            })
            .expect("create");

        let mut sub = hub.subscribe("b1", "replica-1");
        store
            .resolve_conflict("b1", &task.id, Resolution::KeepMine, None, "u1")
            .expect("resolve");

        let event = sub.try_recv().expect("updated event");
        assert_eq!(event.kind, EventKind::TaskUpdated);
        assert_eq!(event.payload["hasConflict"], false);

        let logged = store
            .actions()
            .by_task("b1", &task.id, 10)
            .expect("actions");
        assert!(
            logged
                .iter()
                .any(|a| a.details.conflict_resolved == Some(true))
        );
    }
}
