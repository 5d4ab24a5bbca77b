//! Canonical SQLite schema for a corkboard database.
//!
//! Three tables:
//! - `tasks` holds the authoritative versioned record per work item
//! - `task_conflicts` holds ordered pending snapshots of rejected writes
//!   (cascade-deleted with their task)
//! - `actions` is the append-only, retention-bounded audit trail; its
//!   `task_id` is intentionally not a foreign key so history outlives
//!   task deletion
//!
//! Title uniqueness per board is a storage-level constraint
//! (`idx_tasks_board_title`) so two concurrent creates cannot both pass a
//! read-then-write check; the violation surfaces on the validation path.

/// Migration v1: core tables and the title-uniqueness constraint.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY CHECK (task_id LIKE 'tk-%'),
    board_id TEXT NOT NULL,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'inProgress', 'done')),
    priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high')),
    assigned_to TEXT,
    created_by TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    has_conflict INTEGER NOT NULL DEFAULT 0 CHECK (has_conflict IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_board_title
    ON tasks(board_id, title);

CREATE TABLE IF NOT EXISTS task_conflicts (
    conflict_id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id TEXT NOT NULL REFERENCES tasks(task_id) ON DELETE CASCADE,
    title TEXT,
    description TEXT,
    priority TEXT CHECK (priority IS NULL OR priority IN ('low', 'medium', 'high')),
    assigned_to TEXT,
    version INTEGER NOT NULL,
    modified_by TEXT NOT NULL,
    modified_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS actions (
    action_id TEXT PRIMARY KEY CHECK (action_id LIKE 'ac-%'),
    board_id TEXT NOT NULL,
    action_type TEXT NOT NULL CHECK (action_type IN (
        'create', 'update', 'delete', 'move',
        'assign', 'smart_assign', 'resolve_conflict'
    )),
    user_id TEXT NOT NULL,
    task_id TEXT,
    details_json TEXT NOT NULL DEFAULT '{}',
    timestamp_us INTEGER NOT NULL
);
"#;

/// Migration v2: read-path indexes for board listings, load scans, and
/// the action log's filtered projections.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tasks_board_status_position
    ON tasks(board_id, status, position);

CREATE INDEX IF NOT EXISTS idx_tasks_assigned_status
    ON tasks(assigned_to, status);

CREATE INDEX IF NOT EXISTS idx_task_conflicts_task
    ON task_conflicts(task_id, conflict_id);

CREATE INDEX IF NOT EXISTS idx_actions_board_ts
    ON actions(board_id, timestamp_us DESC);

CREATE INDEX IF NOT EXISTS idx_actions_task_ts
    ON actions(task_id, timestamp_us DESC);

CREATE INDEX IF NOT EXISTS idx_actions_user_ts
    ON actions(user_id, timestamp_us DESC);

CREATE INDEX IF NOT EXISTS idx_actions_type_ts
    ON actions(action_type, timestamp_us DESC);
"#;

/// Indexes that must exist after migration, checked by tests.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tasks_board_title",
    "idx_tasks_board_status_position",
    "idx_tasks_assigned_status",
    "idx_task_conflicts_task",
    "idx_actions_board_ts",
    "idx_actions_task_ts",
    "idx_actions_user_ts",
    "idx_actions_type_ts",
];
