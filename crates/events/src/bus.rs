//! Publish/subscribe abstraction (mechanics only).
//!
//! A bus distributes values to every live subscriber. Delivery is push-based:
//! `publish` enqueues the value on each subscriber's channel before returning,
//! so a subscriber that drains after a `publish` call has returned is
//! guaranteed to observe it.
//!
//! ## Ordering
//!
//! Implementations serialize publishes; each subscriber sees values in the
//! order they were applied. Dropping a [`Subscription`] unsubscribes it, the
//! bus prunes dead channels on the next publish.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a value stream.
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = bus.subscribe();
///
/// // First delivery is the value current at subscribe time.
/// let initial = subscription.recv()?;
///
/// for change in subscription.drain() {
///     apply(change);
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Every message already delivered, in delivery order, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = M> + '_ {
        self.receiver.try_iter()
    }
}

/// Domain-agnostic pub/sub bus.
///
/// The trait requires `Send + Sync`, so one bus can be shared between the
/// request authorizer, the login entry points and any number of observers.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
