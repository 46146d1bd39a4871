//! Lifecycle notifications for consumers of the chunk tree.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::node::NodeId;

/// A change to the set of live nodes.
///
/// For any id, `Created` precedes every `Ready`, and `Destroyed` ends the
/// sequence. A subtree is destroyed children first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkEvent {
    /// The node exists; its surface is not built yet.
    Created(NodeId),
    /// The node's surface became available. Fires again if the surface is
    /// rebuilt or restored from cache.
    Ready(NodeId),
    /// The node was removed; its id is no longer valid.
    Destroyed(NodeId),
}

impl ChunkEvent {
    pub fn node(&self) -> NodeId {
        match *self {
            ChunkEvent::Created(id) | ChunkEvent::Ready(id) | ChunkEvent::Destroyed(id) => id,
        }
    }
}

/// Collects the events of one tick and fans the batch out to subscribers.
#[derive(Default)]
pub(crate) struct EventBus {
    batch: Vec<ChunkEvent>,
    subscribers: Vec<Sender<Vec<ChunkEvent>>>,
}

impl EventBus {
    pub(crate) fn emit(&mut self, event: ChunkEvent) {
        self.batch.push(event);
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<Vec<ChunkEvent>> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Hand the tick's batch to every live subscriber and return it.
    /// Subscribers whose receiver was dropped are forgotten.
    pub(crate) fn publish(&mut self) -> Vec<ChunkEvent> {
        let batch = std::mem::take(&mut self.batch);
        if !batch.is_empty() {
            self.subscribers
                .retain(|sender| sender.send(batch.clone()).is_ok());
        }
        batch
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_fans_out_and_clears() {
        let mut bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(ChunkEvent::Created(NodeId::root(0, 0)));
        bus.emit(ChunkEvent::Ready(NodeId::root(0, 0)));

        let batch = bus.publish();
        assert_eq!(batch.len(), 2);
        assert_eq!(a.try_recv().unwrap(), batch);
        assert_eq!(b.try_recv().unwrap(), batch);
        assert!(bus.publish().is_empty());
    }

    /// Empty ticks do not wake subscribers.
    #[test]
    fn test_empty_batch_not_sent() {
        let mut bus = EventBus::default();
        let rx = bus.subscribe();
        bus.publish();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut bus = EventBus::default();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.emit(ChunkEvent::Destroyed(NodeId::root(1, 1)));
        bus.publish();
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_node() {
        let id = NodeId::new(2, 1, 1);
        assert_eq!(ChunkEvent::Ready(id).node(), id);
    }
}
