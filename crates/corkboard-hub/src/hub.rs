//! Per-board subscriber registry and broadcast fan-out.
//!
//! Each board is an independent channel. A subscriber registers under a
//! stable id and receives every event published to that board, including
//! events caused by its own writes, which is how the originating replica
//! converges. Delivery is at-most-once and best-effort: a subscriber whose
//! receiver has been dropped is pruned at publish time and gets nothing;
//! there is no backlog or replay, so a reconnecting replica must refetch
//! board state before resubscribing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::event::BoardEvent;

type SubscriberMap = HashMap<String, mpsc::UnboundedSender<BoardEvent>>;

/// The receiving half of a board subscription.
///
/// Dropping the subscription disconnects the member; the hub prunes the
/// dead sender on the next publish to that board.
#[derive(Debug)]
pub struct Subscription {
    board_id: String,
    subscriber_id: String,
    rx: mpsc::UnboundedReceiver<BoardEvent>,
}

impl Subscription {
    #[must_use]
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    #[must_use]
    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    /// Wait for the next event on this subscription.
    ///
    /// Returns `None` once the member has been unsubscribed (or replaced by
    /// a newer subscription under the same id) and the buffer is drained.
    pub async fn recv(&mut self) -> Option<BoardEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for an already-delivered event.
    pub fn try_recv(&mut self) -> Option<BoardEvent> {
        self.rx.try_recv().ok()
    }
}

/// Registry of board channels. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    boards: Arc<Mutex<HashMap<String, SubscriberMap>>>,
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a board channel under `subscriber_id`.
    ///
    /// Subscribing twice under the same id replaces the earlier membership;
    /// the stale `Subscription` stops receiving and drains to `None`.
    pub fn subscribe(&self, board_id: &str, subscriber_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut boards = self.lock_boards();
        let members = boards.entry(board_id.to_string()).or_default();
        if members.insert(subscriber_id.to_string(), tx).is_some() {
            tracing::debug!(board_id, subscriber_id, "replaced existing subscription");
        }
        Subscription {
            board_id: board_id.to_string(),
            subscriber_id: subscriber_id.to_string(),
            rx,
        }
    }

    /// Leave a board channel. Returns whether the member was present.
    pub fn unsubscribe(&self, board_id: &str, subscriber_id: &str) -> bool {
        let mut boards = self.lock_boards();
        let Some(members) = boards.get_mut(board_id) else {
            return false;
        };
        let removed = members.remove(subscriber_id).is_some();
        if members.is_empty() {
            boards.remove(board_id);
        }
        removed
    }

    /// Number of live members on a board channel.
    #[must_use]
    pub fn subscriber_count(&self, board_id: &str) -> usize {
        self.lock_boards().get(board_id).map_or(0, HashMap::len)
    }

    /// Deliver `event` to every current member of its board channel.
    ///
    /// Never blocks: the send half of each member channel is synchronous.
    /// Members whose receiver has been dropped are pruned here. Returns the
    /// number of members the event was handed to.
    pub fn publish(&self, event: &BoardEvent) -> usize {
        let mut boards = self.lock_boards();
        let Some(members) = boards.get_mut(&event.board_id) else {
            return 0;
        };

        let mut delivered = 0;
        members.retain(|subscriber_id, tx| {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::debug!(
                    board_id = %event.board_id,
                    subscriber_id,
                    "pruning disconnected subscriber"
                );
                false
            }
        });
        if members.is_empty() {
            boards.remove(&event.board_id);
        }
        delivered
    }

    fn lock_boards(&self) -> std::sync::MutexGuard<'_, HashMap<String, SubscriberMap>> {
        self.boards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::BroadcastHub;
    use crate::event::{BoardEvent, EventKind};

    fn event(board_id: &str, marker: u64) -> BoardEvent {
        BoardEvent::new(
            EventKind::TaskUpdated,
            board_id,
            serde_json::json!({ "marker": marker }),
        )
    }

    #[test]
    fn publish_reaches_every_member_including_originator() {
        let hub = BroadcastHub::new();
        let mut writer = hub.subscribe("b1", "writer");
        let mut observer = hub.subscribe("b1", "observer");

        assert_eq!(hub.publish(&event("b1", 7)), 2);
        assert_eq!(writer.try_recv().expect("writer delivery").payload["marker"], 7);
        assert_eq!(
            observer.try_recv().expect("observer delivery").payload["marker"],
            7
        );
    }

    #[test]
    fn boards_are_isolated() {
        let hub = BroadcastHub::new();
        let mut a = hub.subscribe("board-a", "s1");
        let mut b = hub.subscribe("board-b", "s1");

        hub.publish(&event("board-a", 1));
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe("b1", "s1");
        assert!(hub.unsubscribe("b1", "s1"));
        assert!(!hub.unsubscribe("b1", "s1"));

        assert_eq!(hub.publish(&event("b1", 1)), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_publish() {
        let hub = BroadcastHub::new();
        let sub = hub.subscribe("b1", "gone");
        let mut live = hub.subscribe("b1", "live");
        drop(sub);

        assert_eq!(hub.subscriber_count("b1"), 2);
        assert_eq!(hub.publish(&event("b1", 1)), 1);
        assert_eq!(hub.subscriber_count("b1"), 1);
        assert!(live.try_recv().is_some());
    }

    #[test]
    fn resubscribe_replaces_previous_membership() {
        let hub = BroadcastHub::new();
        let mut stale = hub.subscribe("b1", "s1");
        let mut fresh = hub.subscribe("b1", "s1");

        assert_eq!(hub.subscriber_count("b1"), 1);
        hub.publish(&event("b1", 2));
        assert!(stale.try_recv().is_none());
        assert_eq!(fresh.try_recv().expect("fresh delivery").payload["marker"], 2);
    }

    #[test]
    fn publish_to_empty_board_delivers_nothing() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.publish(&event("nobody-home", 1)), 0);
    }

    #[tokio::test]
    async fn async_recv_sees_events_in_publish_order() {
        let hub = BroadcastHub::new();
        let mut sub = hub.subscribe("b1", "s1");

        for marker in 0..3_u64 {
            hub.publish(&event("b1", marker));
        }
        for expected in 0..3_u64 {
            let received = sub.recv().await.expect("delivery");
            assert_eq!(received.payload["marker"], expected);
        }
    }
}
