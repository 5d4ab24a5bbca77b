//! Least-loaded assignee selection.
//!
//! Load is the count of a user's active tasks (`todo` or `inProgress`)
//! across all boards; `done` tasks carry no load. The scan is read-only
//! and unsynchronized with concurrent writes, so two simultaneous calls
//! may pick the same candidate. That is accepted: this is a balancing
//! heuristic, not an exclusivity guarantee.

use rusqlite::params;
use std::collections::HashMap;

use corkboard_hub::EventKind;

use super::{TaskStore, now_us};
use crate::error::BoardError;
use crate::model::action::{ActionDetails, ActionType};
use crate::model::task::Task;

/// One user eligible for assignment. The pool is the full set of known
/// users, not filtered by board membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Stable identifier, used as the deterministic tie-break order.
    pub id: String,
    /// The name tasks are assigned to (`assigned_to` matches on this).
    pub name: String,
}

/// Result of a least-loaded selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPick {
    pub assigned_to: String,
    /// The chosen candidate's active-task count at selection time.
    pub load: usize,
}

impl TaskStore {
    /// Pick the least-loaded candidate without touching any task. The
    /// caller embeds the result in a subsequent create.
    ///
    /// Ties at minimum load break to the candidate with the smallest id,
    /// so repeated calls over unchanged state pick the same user.
    ///
    /// # Errors
    ///
    /// Returns `NoCandidates` when the pool is empty, or a storage error.
    pub fn pick_assignee(&self, candidates: &[Candidate]) -> Result<AssignmentPick, BoardError> {
        if candidates.is_empty() {
            return Err(BoardError::NoCandidates);
        }

        let loads = self.active_loads()?;
        let mut pool: Vec<&Candidate> = candidates.iter().collect();
        pool.sort_by(|a, b| a.id.cmp(&b.id));

        let mut best = pool[0];
        let mut best_load = loads.get(&best.name).copied().unwrap_or(0);
        for candidate in &pool[1..] {
            let load = loads.get(&candidate.name).copied().unwrap_or(0);
            // Strict comparison keeps the earliest candidate on a tie.
            if load < best_load {
                best = candidate;
                best_load = load;
            }
        }

        tracing::debug!(assignee = %best.name, load = best_load, "picked least-loaded assignee");
        Ok(AssignmentPick {
            assigned_to: best.name.clone(),
            load: best_load,
        })
    }

    /// Assign the least-loaded candidate to an existing task. Increments
    /// the version and fans out the updated record.
    ///
    /// # Errors
    ///
    /// Returns `NoCandidates` for an empty pool, `TaskNotFound`, or a
    /// storage error.
    pub fn smart_assign(
        &self,
        board_id: &str,
        task_id: &str,
        candidates: &[Candidate],
        actor: &str,
    ) -> Result<Task, BoardError> {
        let pick = self.pick_assignee(candidates)?;

        let now = now_us();
        let task = {
            let conn = self.lock();
            // Existence check keeps NotFound distinct from a zero-row update.
            Self::get_with(&conn, board_id, task_id)?;
            conn.execute(
                "UPDATE tasks SET assigned_to = ?1, version = version + 1, updated_at_us = ?2
                 WHERE task_id = ?3 AND board_id = ?4",
                params![pick.assigned_to, now, task_id, board_id],
            )?;
            Self::get_with(&conn, board_id, task_id)?
        };
        tracing::debug!(
            task_id,
            board_id,
            assignee = %pick.assigned_to,
            "task smart-assigned"
        );

        self.log_action(
            ActionType::SmartAssign,
            actor,
            Some(task_id),
            board_id,
            ActionDetails {
                title: Some(task.title.clone()),
                smart_assigned_to: Some(pick.assigned_to),
                ..ActionDetails::default()
            },
            now,
        );
        self.publish(EventKind::TaskUpdated, &task);
        Ok(task)
    }

    fn active_loads(&self) -> Result<HashMap<String, usize>, BoardError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT assigned_to, COUNT(*) FROM tasks
             WHERE assigned_to IS NOT NULL AND status IN ('todo', 'inProgress')
             GROUP BY assigned_to",
        )?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((name, usize::try_from(count).unwrap_or(0)))
        })?;

        let mut loads = HashMap::new();
        for row in rows {
            let (name, count) = row?;
            loads.insert(name, count);
        }
        Ok(loads)
    }
}
