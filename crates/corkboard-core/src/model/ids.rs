//! Prefixed opaque identifiers.
//!
//! Tasks and actions get ULID-backed ids with a short type prefix so that
//! an id is self-describing in logs and broadcast payloads. The ULID body
//! keeps ids lexically ordered by creation time, which the action log's
//! eviction tiebreak relies on.

use ulid::Ulid;

/// Prefix for task ids (`tk-01h...`).
pub const TASK_ID_PREFIX: &str = "tk-";

/// Prefix for action ids (`ac-01h...`).
pub const ACTION_ID_PREFIX: &str = "ac-";

#[must_use]
pub fn new_task_id() -> String {
    prefixed(TASK_ID_PREFIX)
}

#[must_use]
pub fn new_action_id() -> String {
    prefixed(ACTION_ID_PREFIX)
}

fn prefixed(prefix: &str) -> String {
    let body = Ulid::new().to_string().to_ascii_lowercase();
    format!("{prefix}{body}")
}
