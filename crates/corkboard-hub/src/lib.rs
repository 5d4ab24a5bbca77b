//! Real-time broadcast layer for corkboard.
//!
//! Keeps every connected replica of a board convergent by fanning out each
//! authoritative state change to all current subscribers of that board's
//! channel. The hub owns an explicit per-board subscriber set, with
//! membership tied to the subscription value's lifetime rather than to
//! ambient global state, and fan-out never blocks the write path that
//! triggered it.

pub mod event;
pub mod hub;

pub use event::{BoardEvent, EventKind};
pub use hub::{BroadcastHub, Subscription};
