//! In-memory bus that remembers its latest value.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish failed due to internal lock poisoning.
    #[error("bus lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct State<M> {
    latest: M,
    subscribers: Vec<mpsc::Sender<M>>,
}

/// Pub/sub bus with replay-latest semantics.
///
/// - A new subscriber immediately receives the current value, then every
///   subsequent publish, never a backlog of older values.
/// - Publishing and subscribing share one lock, so a subscriber can neither
///   miss a value nor see one twice around its subscribe call.
/// - No IO / no async
#[derive(Debug)]
pub struct ReplayLatestBus<M> {
    state: Mutex<State<M>>,
}

impl<M: Clone> ReplayLatestBus<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: Mutex::new(State {
                latest: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// The latest published value (or the initial one).
    pub fn current(&self) -> Result<M, BusError> {
        let state = self.state.lock().map_err(|_| BusError::Poisoned)?;
        Ok(state.latest.clone())
    }

    /// Number of subscriptions that were alive at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }
}

impl<M: Clone + Default> Default for ReplayLatestBus<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M> EventBus<M> for ReplayLatestBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = BusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut state = self.state.lock().map_err(|_| BusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        let before = state.subscribers.len();
        state.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        let pruned = before - state.subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped closed subscriptions");
        }

        state.latest = message;
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned we still hand out a subscription; it just
        // never receives anything.
        if let Ok(mut state) = self.state.lock() {
            if tx.send(state.latest.clone()).is_ok() {
                state.subscribers.push(tx);
            }
        }

        Subscription::new(rx)
    }
}
