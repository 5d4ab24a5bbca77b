//! Append-only, retention-bounded action log.
//!
//! Every successful domain event lands here as one row. Retention is a
//! batch eviction triggered by the insert: when a board's live entries
//! exceed the configured cap, the oldest rows (by timestamp, then id) are
//! deleted until exactly the cap remains. Reads are pure projections over
//! whatever retention has left in the log; they never mutate state.
//!
//! Logging is best-effort relative to the task mutation that triggered it:
//! the store commits the mutation first and treats an append failure as a
//! warning, never a rollback. Audit entries can therefore be lost when the
//! log write fails; that tradeoff is accepted.

use rusqlite::{Connection, params, types::Type};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::BoardError;
use crate::model::action::{Action, ActionType};

/// Default limit for [`ActionLog::recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// Default limit for [`ActionLog::by_task`].
pub const DEFAULT_TASK_LIMIT: usize = 10;

/// Default limit for [`ActionLog::by_user`].
pub const DEFAULT_USER_LIMIT: usize = 20;

/// Default limit for [`ActionLog::by_type`].
pub const DEFAULT_TYPE_LIMIT: usize = 20;

const SELECT_COLUMNS: &str =
    "SELECT action_id, board_id, action_type, user_id, task_id, details_json, timestamp_us
     FROM actions";

/// Handle to the audit trail. Shares the board database connection with
/// the task store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ActionLog {
    conn: Arc<Mutex<Connection>>,
    retained_per_board: usize,
}

impl ActionLog {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>, retained_per_board: usize) -> Self {
        Self {
            conn,
            retained_per_board,
        }
    }

    /// Live entries retained per board before eviction kicks in.
    #[must_use]
    pub const fn retained_per_board(&self) -> usize {
        self.retained_per_board
    }

    /// Insert one action row, then evict the oldest rows of its board
    /// beyond the retention cap. Insert and eviction commit together.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert or eviction fails.
    pub fn append(&self, action: &Action) -> Result<(), BoardError> {
        let details_json = serde_json::to_string(&action.details)
            .map_err(|error| BoardError::Internal(error.into()))?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO actions (action_id, board_id, action_type, user_id, task_id, details_json, timestamp_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                action.id,
                action.board_id,
                action.action_type.as_str(),
                action.user,
                action.task,
                details_json,
                action.timestamp_us,
            ],
        )?;

        let live: i64 = tx.query_row(
            "SELECT COUNT(*) FROM actions WHERE board_id = ?1",
            params![action.board_id],
            |row| row.get(0),
        )?;
        let live = usize::try_from(live).unwrap_or(0);
        if live > self.retained_per_board {
            let excess = live - self.retained_per_board;
            let evicted = tx.execute(
                "DELETE FROM actions WHERE action_id IN (
                    SELECT action_id FROM actions
                    WHERE board_id = ?1
                    ORDER BY timestamp_us ASC, action_id ASC
                    LIMIT ?2
                )",
                params![action.board_id, to_sql_limit(excess)],
            )?;
            tracing::debug!(
                board_id = %action.board_id,
                evicted,
                "action log retention evicted oldest entries"
            );
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent actions on a board, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn recent(&self, board_id: &str, limit: usize) -> Result<Vec<Action>, BoardError> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE board_id = ?1
                 ORDER BY timestamp_us DESC, action_id DESC LIMIT ?2"
            ),
            params![board_id, to_sql_limit(limit)],
        )
    }

    /// Recent actions touching one task, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn by_task(
        &self,
        board_id: &str,
        task_id: &str,
        limit: usize,
    ) -> Result<Vec<Action>, BoardError> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE board_id = ?1 AND task_id = ?2
                 ORDER BY timestamp_us DESC, action_id DESC LIMIT ?3"
            ),
            params![board_id, task_id, to_sql_limit(limit)],
        )
    }

    /// Recent actions by one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn by_user(
        &self,
        board_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Action>, BoardError> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE board_id = ?1 AND user_id = ?2
                 ORDER BY timestamp_us DESC, action_id DESC LIMIT ?3"
            ),
            params![board_id, user_id, to_sql_limit(limit)],
        )
    }

    /// Recent actions of one type, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn by_type(
        &self,
        board_id: &str,
        action_type: ActionType,
        limit: usize,
    ) -> Result<Vec<Action>, BoardError> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE board_id = ?1 AND action_type = ?2
                 ORDER BY timestamp_us DESC, action_id DESC LIMIT ?3"
            ),
            params![board_id, action_type.as_str(), to_sql_limit(limit)],
        )
    }

    /// Live entry count for one board. Used by tests and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn count(&self, board_id: &str) -> Result<usize, BoardError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM actions WHERE board_id = ?1",
            params![board_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Action>, BoardError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, action_from_row)?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?);
        }
        Ok(actions)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn action_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Action> {
    let type_text: String = row.get(2)?;
    let action_type = ActionType::from_str(&type_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
    })?;
    let details_json: String = row.get(5)?;
    let details = serde_json::from_str(&details_json).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error))
    })?;

    Ok(Action {
        id: row.get(0)?,
        board_id: row.get(1)?,
        action_type,
        user: row.get(3)?,
        task: row.get(4)?,
        details,
        timestamp_us: row.get(6)?,
    })
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
