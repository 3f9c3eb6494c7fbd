//! Per-worker inbound message queues.
//!
//! Each active worker has a bounded FIFO-with-priority queue: messages
//! that need a reply sit ahead of the rest, FIFO within each class. On
//! overflow the oldest non-priority entry is evicted first; only a queue
//! full of priority messages evicts one of those.
//!
//! Draining is atomic from the caller's point of view: the queue empties
//! in memory and the caller persists the post-drain state in the same
//! tick delta, so a crash cannot redeliver drained messages.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use cadre_types::{InboundMessage, MessageId, WorkerId};
use tracing::debug;

/// Bounded inbound queues for the active roster.
#[derive(Debug, Clone)]
pub struct WorkerRuntimeRegistry {
    capacity: usize,
    queues: BTreeMap<WorkerId, VecDeque<InboundMessage>>,
    /// Workers that received messages since their last plan.
    new_since_plan: BTreeSet<WorkerId>,
}

impl WorkerRuntimeRegistry {
    /// Create a registry with the given per-worker queue capacity.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: BTreeMap::new(),
            new_since_plan: BTreeSet::new(),
        }
    }

    /// Bring the queue set in line with the active roster. Idempotent:
    /// existing queues are kept, queues for departed workers are dropped.
    pub fn sync(&mut self, active: &[WorkerId]) {
        let keep: BTreeSet<WorkerId> = active.iter().copied().collect();
        self.queues.retain(|id, _| keep.contains(id));
        self.new_since_plan.retain(|id| keep.contains(id));
        for &id in active {
            self.queues.entry(id).or_default();
        }
    }

    /// Append a message to its recipient's queue, ahead of non-priority
    /// entries when it needs a reply.
    ///
    /// Messages for workers without a queue are dropped with a debug log;
    /// that only happens when the roster changed mid-tick.
    pub fn enqueue(&mut self, message: InboundMessage) {
        let Some(queue) = self.queues.get_mut(&message.recipient) else {
            debug!(recipient = %message.recipient, "dropping message for unknown queue");
            return;
        };

        if queue.len() >= self.capacity.max(1) {
            // Evict the oldest non-priority entry, or the oldest entry
            // outright when everything is priority.
            let victim = queue
                .iter()
                .position(|m| !m.needs_reply)
                .unwrap_or(0);
            queue.remove(victim);
        }

        self.new_since_plan.insert(message.recipient);
        if message.needs_reply {
            let insert_at = queue
                .iter()
                .position(|m| !m.needs_reply)
                .unwrap_or(queue.len());
            queue.insert(insert_at, message);
        } else {
            queue.push_back(message);
        }
    }

    /// Empty and return a worker's queue, priority entries first.
    pub fn drain(&mut self, worker_id: WorkerId) -> Vec<InboundMessage> {
        self.queues
            .get_mut(&worker_id)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// A read-only copy of a worker's queue, for snapshots.
    pub fn peek(&self, worker_id: WorkerId) -> Vec<InboundMessage> {
        self.queues
            .get(&worker_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record the tick a queued message was replied to, if it is still
    /// queued anywhere.
    pub fn mark_replied(&mut self, message_id: MessageId, tick: u64) {
        for queue in self.queues.values_mut() {
            for message in queue.iter_mut() {
                if message.message_id == message_id {
                    message.replied_tick = Some(tick);
                    message.needs_reply = false;
                }
            }
        }
    }

    /// Whether a worker received messages since their last plan.
    pub fn has_new_messages(&self, worker_id: WorkerId) -> bool {
        self.new_since_plan.contains(&worker_id)
    }

    /// Clear the new-message flag after a plan has been generated.
    pub fn clear_new_flag(&mut self, worker_id: WorkerId) {
        self.new_since_plan.remove(&worker_id);
    }

    /// The full queue state, for the persistence delta.
    pub fn snapshot(&self) -> BTreeMap<WorkerId, Vec<InboundMessage>> {
        self.queues
            .iter()
            .map(|(&id, q)| (id, q.iter().cloned().collect()))
            .collect()
    }

    /// Restore queue state from persistence.
    pub fn restore(&mut self, queues: BTreeMap<WorkerId, Vec<InboundMessage>>) {
        self.queues = queues
            .into_iter()
            .map(|(id, messages)| (id, messages.into_iter().collect()))
            .collect();
    }

    /// Drop every queue and flag.
    pub fn clear(&mut self) {
        self.queues.clear();
        self.new_since_plan.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use cadre_types::Channel;

    fn message(recipient: WorkerId, body: &str, needs_reply: bool) -> InboundMessage {
        InboundMessage {
            recipient,
            sender: WorkerId::new(),
            channel: Channel::Chat,
            message_id: MessageId::new(),
            subject: None,
            body: body.to_owned(),
            received_tick: 0,
            needs_reply,
            replied_tick: None,
        }
    }

    #[test]
    fn priority_messages_surface_first() {
        let worker = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(10);
        registry.sync(&[worker]);

        registry.enqueue(message(worker, "fyi one", false));
        registry.enqueue(message(worker, "question?", true));
        registry.enqueue(message(worker, "fyi two", false));

        let drained = registry.drain(worker);
        assert_eq!(drained[0].body, "question?");
        assert_eq!(drained[1].body, "fyi one");
        assert_eq!(drained[2].body, "fyi two");
    }

    #[test]
    fn drain_empties_the_queue() {
        let worker = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(10);
        registry.sync(&[worker]);
        registry.enqueue(message(worker, "hello", false));

        assert_eq!(registry.drain(worker).len(), 1);
        assert!(registry.drain(worker).is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_non_priority_first() {
        let worker = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(3);
        registry.sync(&[worker]);

        registry.enqueue(message(worker, "old fyi", false));
        registry.enqueue(message(worker, "urgent?", true));
        registry.enqueue(message(worker, "new fyi", false));
        registry.enqueue(message(worker, "newest fyi", false));

        let drained = registry.drain(worker);
        assert_eq!(drained.len(), 3);
        assert!(drained.iter().all(|m| m.body != "old fyi"));
        assert!(drained.iter().any(|m| m.body == "urgent?"));
    }

    #[test]
    fn sync_is_idempotent_and_prunes() {
        let a = WorkerId::new();
        let b = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(10);
        registry.sync(&[a, b]);
        registry.enqueue(message(a, "kept", false));

        registry.sync(&[a]);
        registry.sync(&[a]);
        assert_eq!(registry.peek(a).len(), 1);
        assert!(registry.peek(b).is_empty());
    }

    #[test]
    fn new_message_flag_tracks_enqueues() {
        let worker = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(10);
        registry.sync(&[worker]);
        assert!(!registry.has_new_messages(worker));

        registry.enqueue(message(worker, "hi", false));
        assert!(registry.has_new_messages(worker));

        registry.clear_new_flag(worker);
        assert!(!registry.has_new_messages(worker));
    }

    #[test]
    fn mark_replied_clears_priority() {
        let worker = WorkerId::new();
        let mut registry = WorkerRuntimeRegistry::new(10);
        registry.sync(&[worker]);
        let msg = message(worker, "question?", true);
        let id = msg.message_id;
        registry.enqueue(msg);

        registry.mark_replied(id, 77);
        let drained = registry.drain(worker);
        assert_eq!(drained[0].replied_tick, Some(77));
        assert!(!drained[0].needs_reply);
    }
}
