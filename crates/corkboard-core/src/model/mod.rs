//! Domain model: task records, conflict snapshots, and logged actions.

pub mod action;
pub mod ids;
pub mod task;

pub use action::{Action, ActionDetails, ActionType};
pub use task::{ConflictSnapshot, Priority, Status, Task, TaskDraft, TaskPatch};
