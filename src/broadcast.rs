// src/broadcast.rs
//! Fan-out of events to connected observers.
//!
//! Delivery is fire-and-forget: each observer owns a bounded queue and an
//! event that does not fit is dropped for that observer only (drop-newest).
//! Observers whose receiver has gone away are pruned on the next publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use parking_lot::Mutex;

use crate::types::Event;

/// Outbound event surface.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: Event);
}

pub struct EventHub {
    observers: Mutex<Vec<SyncSender<Event>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = sync_channel(self.capacity);
        self.observers.lock().push(tx);
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Events discarded because an observer's queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Broadcaster for EventHub {
    fn publish(&self, event: Event) {
        let mut observers = self.observers.lock();
        observers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total.is_power_of_two() {
                    log::warn!("Observer queue full, {total} events dropped so far");
                }
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Observer disconnected");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PredictionKind;

    fn tick(n: u32) -> Event {
        Event::PredictionCaptureTick {
            kind: PredictionKind::Lactate,
            seconds_elapsed: n,
            seconds_total: 60,
        }
    }

    #[test]
    fn publish_without_observers_is_silent() {
        let hub = EventHub::new(4);
        hub.publish(tick(1));
        assert_eq!(hub.dropped(), 0);
    }

    #[test]
    fn every_observer_sees_events_in_order() {
        let hub = EventHub::new(8);
        let a = hub.subscribe();
        let b = hub.subscribe();
        for n in 1..=3 {
            hub.publish(tick(n));
        }
        for rx in [a, b] {
            let seen: Vec<Event> = rx.try_iter().collect();
            assert_eq!(seen, vec![tick(1), tick(2), tick(3)]);
        }
    }

    #[test]
    fn full_queue_drops_newest() {
        let hub = EventHub::new(2);
        let rx = hub.subscribe();
        for n in 1..=5 {
            hub.publish(tick(n));
        }
        let seen: Vec<Event> = rx.try_iter().collect();
        assert_eq!(seen, vec![tick(1), tick(2)]);
        assert_eq!(hub.dropped(), 3);
    }

    #[test]
    fn disconnected_observers_are_pruned() {
        let hub = EventHub::new(2);
        let rx = hub.subscribe();
        let _keep = hub.subscribe();
        drop(rx);
        hub.publish(tick(1));
        assert_eq!(hub.observer_count(), 1);
    }
}
