//! Priority queue (C2)
//!
//! Three FIFO lanes, one per [`Priority`](pondkeep_contracts::Priority),
//! drained strictly high-before-normal-before-low. Unlike the teacher's
//! Postgres-backed task queue (`SELECT ... FOR UPDATE SKIP LOCKED`), this is
//! a plain in-process structure — durability is an external broker's job
//! (spec §4.2).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use pondkeep_contracts::{Event, Priority};

use crate::error::EngineError;

struct Lanes {
    high: VecDeque<Event>,
    normal: VecDeque<Event>,
    low: VecDeque<Event>,
}

impl Lanes {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<Event> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}

/// The event buffer the dispatcher (C9) pulls from.
///
/// `enqueue` stamps `enqueued_at` from an internal monotonic counter —
/// see `DESIGN.md` on why this engine does not rely on wall-clock ordering
/// across producers.
pub struct EventQueue {
    lanes: Mutex<Lanes>,
    capacity: Option<usize>,
    sequence: AtomicU64,
}

impl EventQueue {
    /// `capacity = None` means unbounded (spec §6.4 default).
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            lanes: Mutex::new(Lanes::new()),
            capacity,
            sequence: AtomicU64::new(0),
        }
    }

    /// Enqueue one event, stamping `enqueued_at`. Fails with `BufferFull`
    /// if the queue is bounded and already at capacity.
    pub fn enqueue(&self, mut event: Event) -> Result<(), EngineError> {
        let mut lanes = self.lanes.lock();
        if let Some(capacity) = self.capacity {
            if lanes.len() >= capacity {
                return Err(EngineError::BufferFull(capacity));
            }
        }
        event.enqueued_at = self.sequence.fetch_add(1, Ordering::SeqCst);
        lanes.lane_mut(event.priority).push_back(event);
        Ok(())
    }

    /// Pop the earliest-enqueued event from the highest non-empty priority
    /// lane. Non-blocking: returns `None` when the queue is empty.
    pub fn dequeue(&self) -> Option<Event> {
        let mut lanes = self.lanes.lock();
        lanes
            .high
            .pop_front()
            .or_else(|| lanes.normal.pop_front())
            .or_else(|| lanes.low.pop_front())
    }

    /// Look at the next event to be dequeued without removing it.
    pub fn peek(&self) -> Option<Event> {
        let lanes = self.lanes.lock();
        lanes
            .high
            .front()
            .or(lanes.normal.front())
            .or(lanes.low.front())
            .cloned()
    }

    pub fn size(&self) -> usize {
        self.lanes.lock().len()
    }

    pub fn clear(&self) {
        let mut lanes = self.lanes.lock();
        lanes.high.clear();
        lanes.normal.clear();
        lanes.low.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(priority: Priority) -> Event {
        Event::new(pondkeep_contracts::EventKind::IssueCreated, json!({}), priority)
    }

    #[test]
    fn dequeue_drains_high_before_normal_before_low() {
        let queue = EventQueue::new(None);
        queue.enqueue(event(Priority::Low)).unwrap();
        queue.enqueue(event(Priority::Normal)).unwrap();
        queue.enqueue(event(Priority::High)).unwrap();

        assert_eq!(queue.dequeue().unwrap().priority, Priority::High);
        assert_eq!(queue.dequeue().unwrap().priority, Priority::Normal);
        assert_eq!(queue.dequeue().unwrap().priority, Priority::Low);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn same_priority_is_fifo() {
        let queue = EventQueue::new(None);
        let first = event(Priority::Normal);
        let second = event(Priority::Normal);
        let first_id = first.id;
        let second_id = second.id;
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        assert_eq!(queue.dequeue().unwrap().id, first_id);
        assert_eq!(queue.dequeue().unwrap().id, second_id);
    }

    #[test]
    fn bounded_queue_rejects_the_capacity_plus_one_enqueue() {
        let queue = EventQueue::new(Some(2));
        queue.enqueue(event(Priority::Normal)).unwrap();
        queue.enqueue(event(Priority::Normal)).unwrap();
        let result = queue.enqueue(event(Priority::Normal));
        assert!(matches!(result, Err(EngineError::BufferFull(2))));
    }

    #[test]
    fn enqueued_at_is_monotonic() {
        let queue = EventQueue::new(None);
        queue.enqueue(event(Priority::High)).unwrap();
        queue.enqueue(event(Priority::Low)).unwrap();
        let first = queue.dequeue().unwrap();
        let second = queue.dequeue().unwrap();
        assert!(first.enqueued_at < second.enqueued_at);
    }

    #[test]
    fn clear_empties_all_lanes() {
        let queue = EventQueue::new(None);
        queue.enqueue(event(Priority::High)).unwrap();
        queue.enqueue(event(Priority::Low)).unwrap();
        queue.clear();
        assert!(queue.is_empty());
    }
}
