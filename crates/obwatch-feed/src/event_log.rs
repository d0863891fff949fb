//! Bounded, newest-first event log.

use obwatch_core::OrderBookEvent;
use std::collections::VecDeque;

pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<OrderBookEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend an event, evicting the oldest one when full.
    pub fn push(&mut self, event: OrderBookEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_back();
        }
        self.events.push_front(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &OrderBookEvent> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<OrderBookEvent> {
        self.events.iter().cloned().collect()
    }
}
