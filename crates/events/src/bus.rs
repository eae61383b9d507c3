//! Publish/subscribe contract used to fan committed events out to projections.
//!
//! Events are appended to the store before they are published, so the store
//! stays the source of truth. Delivery is at-least-once: consumers must
//! tolerate duplicates (projections track a per-stream cursor for this).

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// One consumer's view of the bus. Every subscription receives every message
/// published after it was created.
///
/// Meant to be drained by a single thread, typically a projection worker
/// polling with [`Subscription::recv_timeout`] so it can notice shutdown.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Broadcast bus shared between the command dispatcher (publisher) and the
/// projection workers (subscribers).
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
