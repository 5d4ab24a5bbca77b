//! Authoritative versioned task store.
//!
//! All task mutation flows through [`TaskStore`]; nothing else writes a
//! task's `version`, `status`, or pending conflict snapshots. Concurrency
//! control is optimistic: a writer supplies the version it last observed
//! and the store applies the write only if that version still matches.
//! The compare-and-apply is a single conditional `UPDATE ... WHERE
//! version = ?` issued under the connection mutex, so two stale writers
//! can never both pass.
//!
//! Every successful mutation issues two independent side effects: a
//! best-effort action-log append and a non-blocking broadcast of the
//! authoritative record. Neither is transactional with the primary write:
//! a failed append is a warning, never a rollback.

pub mod assign;
pub mod resolve;

use chrono::Utc;
use rusqlite::{Connection, params, types::Type};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use corkboard_hub::{BoardEvent, BroadcastHub, EventKind};

use crate::actions::ActionLog;
use crate::config::BoardConfig;
use crate::db;
use crate::error::{BoardError, UpdateOutcome};
use crate::model::action::{Action, ActionDetails, ActionType};
use crate::model::ids::{new_action_id, new_task_id};
use crate::model::task::{
    ConflictSnapshot, Priority, Status, Task, TaskDraft, TaskPatch, validate_description,
    validate_title,
};

const SELECT_TASK: &str = "SELECT task_id, board_id, title, description, status, priority, \
     assigned_to, created_by, position, version, has_conflict, created_at_us, updated_at_us \
     FROM tasks";

/// The single authoritative owner of task records for one database.
///
/// Cheap to clone; clones share the connection, action log, and hub.
#[derive(Debug, Clone)]
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
    log: ActionLog,
    hub: BroadcastHub,
}

impl TaskStore {
    /// Open (or create) the board database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, config: &BoardConfig, hub: BroadcastHub) -> Result<Self, BoardError> {
        let conn = db::open_board_db(path).map_err(BoardError::Internal)?;
        conn.busy_timeout(Duration::from_millis(config.storage.busy_timeout_ms))?;
        Ok(Self::from_connection(conn, config, hub))
    }

    /// Ephemeral in-memory store with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be set up.
    pub fn in_memory(hub: BroadcastHub) -> Result<Self, BoardError> {
        let conn = db::open_in_memory().map_err(BoardError::Internal)?;
        Ok(Self::from_connection(conn, &BoardConfig::default(), hub))
    }

    fn from_connection(conn: Connection, config: &BoardConfig, hub: BroadcastHub) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        let log = ActionLog::new(Arc::clone(&conn), config.actions.retained_per_board);
        Self { conn, log, hub }
    }

    /// The audit trail sharing this store's database.
    #[must_use]
    pub const fn actions(&self) -> &ActionLog {
        &self.log
    }

    /// The broadcast hub this store publishes to.
    #[must_use]
    pub const fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Create a task with defaults: status `todo`, priority `medium`,
    /// position 0, version 1, no conflicts.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title fails its length bounds or
    /// is already taken on the board, or a storage error.
    pub fn create(&self, draft: &TaskDraft) -> Result<Task, BoardError> {
        let title = draft.title.trim();
        validate_title(title)?;
        if let Some(description) = &draft.description {
            validate_description(description)?;
        }

        let now = now_us();
        let task = Task {
            id: new_task_id(),
            board_id: draft.board_id.clone(),
            title: title.to_string(),
            description: draft.description.clone(),
            status: Status::Todo,
            priority: draft.priority.unwrap_or_default(),
            assigned_to: draft.assigned_to.clone(),
            created_by: draft.created_by.clone(),
            position: 0,
            version: 1,
            has_conflict: false,
            conflicting_versions: Vec::new(),
            created_at_us: now,
            updated_at_us: now,
        };

        {
            let conn = self.lock();
            conn.execute(
                "INSERT INTO tasks (task_id, board_id, title, description, status, priority,
                     assigned_to, created_by, position, version, has_conflict,
                     created_at_us, updated_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    task.id,
                    task.board_id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.assigned_to,
                    task.created_by,
                    task.position,
                    task.version,
                    false,
                    task.created_at_us,
                    task.updated_at_us,
                ],
            )
            .map_err(map_title_constraint)?;
        }
        tracing::debug!(task_id = %task.id, board_id = %task.board_id, "task created");

        self.log_action(
            ActionType::Create,
            &draft.created_by,
            Some(&task.id),
            &task.board_id,
            ActionDetails {
                title: Some(task.title.clone()),
                description: task.description.clone(),
                priority: Some(task.priority),
                assigned_to: task.assigned_to.clone(),
                ..ActionDetails::default()
            },
            now,
        );
        self.publish(EventKind::TaskCreated, &task);
        Ok(task)
    }

    /// Fetch one task, pending conflict snapshots included.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no such task exists on the board.
    pub fn get(&self, board_id: &str, task_id: &str) -> Result<Task, BoardError> {
        let conn = self.lock();
        Self::get_with(&conn, board_id, task_id)
    }

    /// All tasks on a board, ordered by position, then newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn list(&self, board_id: &str) -> Result<Vec<Task>, BoardError> {
        let conn = self.lock();
        let mut tasks = {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_TASK} WHERE board_id = ?1 ORDER BY position ASC, created_at_us DESC"
            ))?;
            let rows = stmt.query_map(params![board_id], task_from_row)?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            tasks
        };
        for task in &mut tasks {
            task.conflicting_versions = load_conflicts(&conn, &task.id)?;
        }
        Ok(tasks)
    }

    /// Apply a partial update under optimistic concurrency.
    ///
    /// With a stale `expected_version` the authoritative record is left
    /// untouched: the patch is preserved as one pending conflict snapshot
    /// and the current record comes back as [`UpdateOutcome::Conflict`].
    /// With a matching version (or none supplied) only the fields present
    /// in `patch` are applied and the version increments by exactly one.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad field values (checked before the
    /// version comparison), `TaskNotFound`, or a storage error.
    pub fn update(
        &self,
        board_id: &str,
        task_id: &str,
        patch: &TaskPatch,
        expected_version: Option<i64>,
        actor: &str,
    ) -> Result<UpdateOutcome, BoardError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        if let Some(description) = &patch.description {
            validate_description(description)?;
        }

        let now = now_us();
        let (task, accepted) = {
            let mut conn = self.lock();
            let current = Self::get_with(&conn, board_id, task_id)?;

            match expected_version {
                Some(expected) if expected != current.version => {
                    record_conflict(&mut conn, &current, patch, actor, now)?;
                    let refreshed = Self::get_with(&conn, board_id, task_id)?;
                    (refreshed, false)
                }
                _ => {
                    // Compare-and-apply: values are computed from `current`
                    // (read under the same lock) and the guard on `version`
                    // keeps the write conditional even without the mutex.
                    let guard_version = expected_version.unwrap_or(current.version);
                    let title = patch
                        .title
                        .as_ref()
                        .map_or(current.title, |t| t.trim().to_string());
                    let description = patch.description.clone().or(current.description);
                    let status = patch.status.unwrap_or(current.status);
                    let priority = patch.priority.unwrap_or(current.priority);
                    let assigned_to = patch.assigned_to.clone().or(current.assigned_to);
                    let position = patch.position.unwrap_or(current.position);

                    let changed = conn
                        .execute(
                            "UPDATE tasks SET title = ?1, description = ?2, status = ?3,
                                 priority = ?4, assigned_to = ?5, position = ?6,
                                 version = version + 1, updated_at_us = ?7
                             WHERE task_id = ?8 AND board_id = ?9 AND version = ?10",
                            params![
                                title,
                                description,
                                status.as_str(),
                                priority.as_str(),
                                assigned_to,
                                position,
                                now,
                                task_id,
                                board_id,
                                guard_version,
                            ],
                        )
                        .map_err(map_title_constraint)?;
                    if changed == 0 {
                        return Err(BoardError::TaskNotFound {
                            id: task_id.to_string(),
                        });
                    }
                    let refreshed = Self::get_with(&conn, board_id, task_id)?;
                    (refreshed, true)
                }
            }
        };

        if accepted {
            tracing::debug!(
                task_id,
                board_id,
                version = task.version,
                "task updated"
            );
            self.log_action(
                ActionType::Update,
                actor,
                Some(task_id),
                board_id,
                ActionDetails {
                    title: Some(task.title.clone()),
                    description: task.description.clone(),
                    priority: Some(task.priority),
                    assigned_to: task.assigned_to.clone(),
                    ..ActionDetails::default()
                },
                now,
            );
            self.publish(EventKind::TaskUpdated, &task);
            Ok(UpdateOutcome::Applied(task))
        } else {
            tracing::debug!(
                task_id,
                board_id,
                version = task.version,
                "stale update recorded as conflict"
            );
            Ok(UpdateOutcome::Conflict(task))
        }
    }

    /// Move a task to a column position. Increments the version but does
    /// not take an expected version: positional moves are last-writer-wins
    /// and never surface as conflicts (see DESIGN.md).
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` or a storage error.
    pub fn move_task(
        &self,
        board_id: &str,
        task_id: &str,
        status: Status,
        position: i64,
        actor: &str,
    ) -> Result<Task, BoardError> {
        let now = now_us();
        let (from_status, task) = {
            let conn = self.lock();
            let current = Self::get_with(&conn, board_id, task_id)?;
            conn.execute(
                "UPDATE tasks SET status = ?1, position = ?2,
                     version = version + 1, updated_at_us = ?3
                 WHERE task_id = ?4 AND board_id = ?5",
                params![status.as_str(), position, now, task_id, board_id],
            )?;
            let task = Self::get_with(&conn, board_id, task_id)?;
            (current.status, task)
        };
        tracing::debug!(
            task_id,
            board_id,
            from = %from_status,
            to = %status,
            "task moved"
        );

        self.log_action(
            ActionType::Move,
            actor,
            Some(task_id),
            board_id,
            ActionDetails {
                title: Some(task.title.clone()),
                from_status: Some(from_status),
                to_status: Some(status),
                ..ActionDetails::default()
            },
            now,
        );
        self.publish(EventKind::TaskMoved, &task);
        Ok(task)
    }

    /// Remove a task unconditionally; pending conflict snapshots are
    /// discarded with it. Returns the removed record, which is also what
    /// the deletion broadcast carries.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` or a storage error.
    pub fn delete(&self, board_id: &str, task_id: &str, actor: &str) -> Result<Task, BoardError> {
        let now = now_us();
        let task = {
            let conn = self.lock();
            let task = Self::get_with(&conn, board_id, task_id)?;
            conn.execute(
                "DELETE FROM tasks WHERE task_id = ?1 AND board_id = ?2",
                params![task_id, board_id],
            )?;
            task
        };
        tracing::debug!(task_id, board_id, "task deleted");

        self.log_action(
            ActionType::Delete,
            actor,
            Some(task_id),
            board_id,
            ActionDetails {
                title: Some(task.title.clone()),
                ..ActionDetails::default()
            },
            now,
        );
        self.publish(EventKind::TaskDeleted, &task);
        Ok(task)
    }

    fn get_with(conn: &Connection, board_id: &str, task_id: &str) -> Result<Task, BoardError> {
        let mut task = conn
            .query_row(
                &format!("{SELECT_TASK} WHERE board_id = ?1 AND task_id = ?2"),
                params![board_id, task_id],
                task_from_row,
            )
            .map_err(|error| match error {
                rusqlite::Error::QueryReturnedNoRows => BoardError::TaskNotFound {
                    id: task_id.to_string(),
                },
                other => BoardError::Storage(other),
            })?;
        task.conflicting_versions = load_conflicts(conn, task_id)?;
        Ok(task)
    }

    fn log_action(
        &self,
        action_type: ActionType,
        user: &str,
        task_id: Option<&str>,
        board_id: &str,
        details: ActionDetails,
        timestamp_us: i64,
    ) {
        let action = Action {
            id: new_action_id(),
            action_type,
            user: user.to_string(),
            task: task_id.map(str::to_string),
            details,
            board_id: board_id.to_string(),
            timestamp_us,
        };
        // Best-effort: the task mutation has already committed and must
        // not be rolled back when the audit write fails.
        if let Err(error) = self.log.append(&action) {
            tracing::warn!(
                %error,
                action_type = %action.action_type,
                board_id,
                "action log append failed; continuing without audit entry"
            );
        }
    }

    fn publish(&self, kind: EventKind, task: &Task) {
        match serde_json::to_value(task) {
            Ok(payload) => {
                let delivered =
                    self.hub
                        .publish(&BoardEvent::new(kind, task.board_id.clone(), payload));
                tracing::trace!(%kind, board_id = %task.board_id, delivered, "broadcast published");
            }
            Err(error) => {
                tracing::warn!(%error, %kind, "skipping broadcast; payload failed to serialize");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record_conflict(
    conn: &mut Connection,
    current: &Task,
    patch: &TaskPatch,
    actor: &str,
    now: i64,
) -> Result<(), BoardError> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO task_conflicts (task_id, title, description, priority, assigned_to,
             version, modified_by, modified_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            current.id,
            patch.title.as_ref().map(|t| t.trim().to_string()),
            patch.description,
            patch.priority.map(Priority::as_str),
            patch.assigned_to,
            // The version this write would have produced had it been accepted.
            current.version + 1,
            actor,
            now,
        ],
    )?;
    tx.execute(
        "UPDATE tasks SET has_conflict = 1 WHERE task_id = ?1",
        params![current.id],
    )?;
    tx.commit()?;
    Ok(())
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status_text: String = row.get(4)?;
    let status = Status::from_str(&status_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
    })?;
    let priority_text: String = row.get(5)?;
    let priority = Priority::from_str(&priority_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error))
    })?;

    Ok(Task {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status,
        priority,
        assigned_to: row.get(6)?,
        created_by: row.get(7)?,
        position: row.get(8)?,
        version: row.get(9)?,
        has_conflict: row.get(10)?,
        conflicting_versions: Vec::new(),
        created_at_us: row.get(11)?,
        updated_at_us: row.get(12)?,
    })
}

fn load_conflicts(conn: &Connection, task_id: &str) -> Result<Vec<ConflictSnapshot>, BoardError> {
    let mut stmt = conn.prepare(
        "SELECT title, description, priority, assigned_to, version, modified_by, modified_at_us
         FROM task_conflicts WHERE task_id = ?1 ORDER BY conflict_id ASC",
    )?;
    let rows = stmt.query_map(params![task_id], |row| {
        let priority_text: Option<String> = row.get(2)?;
        let priority = priority_text
            .map(|text| {
                Priority::from_str(&text).map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
                })
            })
            .transpose()?;
        Ok(ConflictSnapshot {
            title: row.get(0)?,
            description: row.get(1)?,
            priority,
            assigned_to: row.get(3)?,
            version: row.get(4)?,
            modified_by: row.get(5)?,
            modified_at_us: row.get(6)?,
        })
    })?;

    let mut snapshots = Vec::new();
    for row in rows {
        snapshots.push(row?);
    }
    Ok(snapshots)
}

fn map_title_constraint(error: rusqlite::Error) -> BoardError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &error {
        let unique_violation = failure.code == rusqlite::ErrorCode::ConstraintViolation
            && (message.contains("idx_tasks_board_title")
                || (message.contains("tasks.board_id") && message.contains("tasks.title")));
        if unique_violation {
            return BoardError::Validation {
                field: "title",
                message: "task title must be unique within the board".to_string(),
            };
        }
    }
    BoardError::Storage(error)
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}
