//! In-process event bus.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// The subscriber list lock was poisoned by a panicking thread.
    Poisoned,
}

/// Fan-out over `std::sync::mpsc` channels. Dead subscribers are pruned on publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_gets_every_message() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7).unwrap();
        bus.publish(8).unwrap();

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(a.try_recv().unwrap(), 8);
        assert_eq!(b.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 8);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(1).unwrap();
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
        assert_eq!(kept.try_recv().unwrap(), 1);
    }
}
