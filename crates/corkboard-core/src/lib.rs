#![forbid(unsafe_code)]
//! Shared task board core.
//!
//! Multiple users edit the same set of tasks concurrently; this crate
//! keeps their replicas convergent and conflict-aware without locking.
//! Each task carries a monotonically increasing version used as an
//! optimistic-concurrency token: writers supply the version they last
//! observed, stale writes are preserved as pending conflict snapshots
//! instead of applied, and explicit resolution collapses the snapshots
//! into a new authoritative version. Every accepted mutation lands in a
//! retention-bounded action log and fans out to board subscribers via
//! [`corkboard_hub`].
//!
//! Entry point is [`TaskStore`]; everything else hangs off it.

pub mod actions;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod store;

pub use actions::ActionLog;
pub use config::{ActionsConfig, BoardConfig, StorageConfig, load_config};
pub use error::{BoardError, ErrorCode, UpdateOutcome};
pub use model::action::{Action, ActionDetails, ActionType};
pub use model::task::{ConflictSnapshot, Priority, Status, Task, TaskDraft, TaskPatch};
pub use store::TaskStore;
pub use store::assign::{AssignmentPick, Candidate};
pub use store::resolve::{ConflictData, Resolution};
