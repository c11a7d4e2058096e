use crate::{SimTime, app::FlowId, frame::Frame, medium::TxId, node::NodeId};
use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// Everything that can happen in a [`Simulator`] run.
///
/// [`Simulator`]: crate::Simulator
#[derive(Debug)]
pub(crate) enum Event {
    /// The application of a flow emits its next packet.
    AppSend { flow: FlowId },
    /// A node's backoff reached zero. Stale if the generation moved on.
    AccessGranted { node: NodeId, generation: u64 },
    /// A node puts a frame on the air without contending (responses and
    /// data after CTS).
    Transmit { node: NodeId, frame: Frame },
    TxEnd { tx: TxId },
    /// No CTS or ACK came back in time. Stale if the generation moved on.
    Timeout { node: NodeId, generation: u64 },
}

/// Min-heap of events keyed by time, then by insertion order.
///
/// Two events due at the same instant always pop in the order they were
/// pushed, which keeps a run reproducible.
pub(crate) struct EventQueue<T> {
    heap: BinaryHeap<Reverse<Scheduled<T>>>,
    sequence: u64,
}

struct Scheduled<T> {
    time: SimTime,
    sequence: u64,
    item: T,
}

impl<T> Scheduled<T> {
    fn key(&self) -> (SimTime, u64) {
        (self.time, self.sequence)
    }
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl<T> EventQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            sequence: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub(crate) fn next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|v| v.0.time)
    }

    pub(crate) fn push(&mut self, time: SimTime, item: T) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.heap.push(Reverse(Scheduled {
            time,
            sequence,
            item,
        }))
    }

    pub(crate) fn pop(&mut self) -> Option<(SimTime, T)> {
        self.heap.pop().map(|v| (v.0.time, v.0.item))
    }

    /// Pops the next item only if it is due at or before `time`.
    pub(crate) fn pop_until(&mut self, time: SimTime) -> Option<(SimTime, T)> {
        if self.next_time()? > time {
            return None;
        }
        self.pop()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let mut q = EventQueue::<()>::new();

        assert_eq!(q.len(), 0);
        assert!(q.pop().is_none());
        assert!(q.next_time().is_none());
        assert!(q.pop_until(SimTime::MAX).is_none());
    }

    #[test]
    fn ordered_by_time() {
        let mut q = EventQueue::new();
        q.push(SimTime::from_micros(30), 'c');
        q.push(SimTime::from_micros(10), 'a');
        q.push(SimTime::from_micros(20), 'b');

        assert_eq!(q.next_time(), Some(SimTime::from_micros(10)));
        let order: Vec<char> = std::iter::from_fn(|| q.pop().map(|(_, c)| c)).collect();
        assert_eq!(order, vec!['a', 'b', 'c']);
    }

    #[test]
    fn same_time_pops_in_insertion_order() {
        let mut q = EventQueue::new();
        let t = SimTime::from_millis(1);
        for i in 0..100 {
            q.push(t, i);
        }

        let order: Vec<i32> = std::iter::from_fn(|| q.pop().map(|(_, i)| i)).collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn pop_until_respects_bound() {
        let mut q = EventQueue::new();
        q.push(SimTime::from_secs(1), ());
        q.push(SimTime::from_secs(2), ());

        assert!(q.pop_until(SimTime::from_millis(999)).is_none());
        assert_eq!(
            q.pop_until(SimTime::from_secs(1)).map(|(t, _)| t),
            Some(SimTime::from_secs(1))
        );
        assert!(q.pop_until(SimTime::from_secs(1)).is_none());
        assert_eq!(q.len(), 1);

        q.clear();
        assert_eq!(q.len(), 0);
    }
}
