//! Acknowledgement queue facade.
//!
//! Composes the ready queue, the in-flight tracker, the retry ledger and the
//! dead-letter sink behind one public surface, and owns the background
//! expiry reaper.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{AckQueueBuilder, TrackingMode};
use crate::delivery::{Delivery, DeliveryToken};
use crate::error::EnqueueError;
use crate::inflight::{InFlightEntry, InFlightTracker};
use crate::ledger::{RetryLedger, TrackingKey};
use crate::ready::{ReadyQueue, ReadySlot};
use crate::reaper;
use crate::sink::{DeadLetterSink, InMemoryDeadLetterSink};

/// Consumer verdict for a claimed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    /// Processed successfully; settle the delivery.
    Ack,
    /// Not processed; redeliver (or quarantine once retries are exhausted).
    Nack,
}

/// Point-in-time counters, for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub ready: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}

/// Everything mutable, behind one lock.
///
/// A single critical section covers the ready queue, the tracker and the
/// ledger, so the "consult ledger, then requeue or quarantine" decision can
/// never interleave for the same key.
pub(crate) struct QueueState<T> {
    pub(crate) ready: ReadyQueue<T>,
    pub(crate) inflight: InFlightTracker<T>,
    pub(crate) ledger: RetryLedger<T>,
    pub(crate) closed: bool,
}

/// State shared between the facade and the reaper task.
pub(crate) struct Shared<T> {
    pub(crate) state: Mutex<QueueState<T>>,
    /// An element became claimable.
    pub(crate) ready_notify: Notify,
    /// A capacity slot was freed.
    pub(crate) space_notify: Notify,
    /// A new in-flight deadline was armed; the reaper may need to wake
    /// earlier than it planned.
    pub(crate) armed_notify: Notify,
    pub(crate) sink: Arc<dyn DeadLetterSink<T>>,
    pub(crate) tracking: TrackingMode,
    pub(crate) ack_timeout: Duration,
}

/// Where a failed (expired or NACKed) delivery went.
pub(crate) enum Routed<T> {
    Requeued,
    DeadLettered(T),
}

/// The single redelivery decision path, shared by explicit NACKs and the
/// expiry reaper. Must run under the state lock; the entry has already been
/// removed from the tracker, so the decision happens exactly once per claim.
///
/// The dead-letter push itself is left to the caller so the sink is never
/// awaited while the lock is held.
pub(crate) fn route_failed<T>(state: &mut QueueState<T>, entry: InFlightEntry<T>) -> Routed<T>
where
    T: Clone + Eq + Hash,
{
    if state.ledger.record_attempt(&entry.key) {
        state.ready.push_redelivery(entry.element, entry.token);
        Routed::Requeued
    } else {
        state.ledger.clear(&entry.key);
        Routed::DeadLettered(entry.element)
    }
}

enum Claimed<T> {
    Delivery(Delivery<T>),
    Empty,
    Closed,
}

/// A FIFO queue whose consumers must acknowledge every claimed element
/// within a bounded time window.
///
/// Claimed elements that are neither acknowledged nor rejected in time are
/// redelivered at the tail of the queue; elements redelivered beyond the
/// configured retry limit are quarantined in the dead-letter sink. This
/// yields at-least-once delivery on top of an in-memory queue.
///
/// All methods take `&self`; share the queue across producer and consumer
/// tasks with an [`Arc`]. One background reaper task per queue handles
/// expiry and lives until [`close`](AckQueue::close) or drop.
pub struct AckQueue<T> {
    shared: Arc<Shared<T>>,
    shutdown_tx: watch::Sender<bool>,
    reaper: JoinHandle<()>,
}

impl<T> AckQueue<T>
where
    T: Clone + Eq + Hash + Debug + Send + 'static,
{
    /// Start configuring a queue. `ack_timeout` is the window a consumer has
    /// to acknowledge a claim before it expires.
    pub fn builder(ack_timeout: Duration) -> AckQueueBuilder<T> {
        AckQueueBuilder::new(ack_timeout)
    }

    /// A queue with all defaults: unbounded capacity, unbounded retries,
    /// token tracking, internal dead-letter sink.
    pub fn new(ack_timeout: Duration) -> Result<Self, crate::config::BuildError> {
        Self::builder(ack_timeout).build()
    }

    pub(crate) fn from_builder(builder: AckQueueBuilder<T>) -> Self {
        let sink = builder
            .sink
            .unwrap_or_else(|| Arc::new(InMemoryDeadLetterSink::new()));

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                ready: ReadyQueue::with_capacity(builder.capacity),
                inflight: InFlightTracker::new(),
                ledger: RetryLedger::new(builder.retry_limit),
                closed: false,
            }),
            ready_notify: Notify::new(),
            space_notify: Notify::new(),
            armed_notify: Notify::new(),
            sink,
            tracking: builder.tracking,
            ack_timeout: builder.ack_timeout,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = reaper::spawn(Arc::clone(&shared), shutdown_rx);

        Self {
            shared,
            shutdown_tx,
            reaper,
        }
    }

    // ---- producer side -------------------------------------------------

    /// Enqueue without waiting. Fails with [`EnqueueError::Full`] when the
    /// queue is at capacity.
    pub async fn try_enqueue(&self, element: T) -> Result<(), EnqueueError<T>> {
        let result = {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return Err(EnqueueError::Closed(element));
            }
            state.ready.push_fresh(element)
        };
        match result {
            Ok(()) => {
                self.shared.ready_notify.notify_one();
                Ok(())
            }
            Err(element) => Err(EnqueueError::Full(element)),
        }
    }

    /// Enqueue, waiting for a capacity slot if necessary. Fails only when
    /// the queue is closed.
    pub async fn enqueue(&self, element: T) -> Result<(), EnqueueError<T>> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut element = element;
        loop {
            match self.try_enqueue(element).await {
                Ok(()) => {
                    // Another producer may be waiting on a slot we did not
                    // consume; a spurious wake is harmless.
                    self.shared.space_notify.notify_one();
                    return Ok(());
                }
                Err(EnqueueError::Full(e)) => element = e,
                Err(closed) => return Err(closed),
            }
            tokio::select! {
                _ = self.shared.space_notify.notified() => {}
                _ = shutdown_rx.changed() => {}
            }
        }
    }

    /// Enqueue, waiting for a capacity slot for at most `timeout`. Hands the
    /// element back inside [`EnqueueError::Full`] when the window closes.
    pub async fn enqueue_timeout(
        &self,
        element: T,
        timeout: Duration,
    ) -> Result<(), EnqueueError<T>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut element = element;
        loop {
            match self.try_enqueue(element).await {
                Ok(()) => {
                    self.shared.space_notify.notify_one();
                    return Ok(());
                }
                Err(EnqueueError::Full(e)) => element = e,
                Err(closed) => return Err(closed),
            }
            tokio::select! {
                _ = self.shared.space_notify.notified() => {}
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(EnqueueError::Full(element));
                }
            }
        }
    }

    // ---- consumer side -------------------------------------------------

    /// Claim without waiting. `None` when nothing is ready or the queue is
    /// closed.
    pub async fn try_claim(&self) -> Option<Delivery<T>> {
        match self.claim_inner().await {
            Claimed::Delivery(delivery) => Some(delivery),
            Claimed::Empty | Claimed::Closed => None,
        }
    }

    /// Claim, waiting until an element is available. Returns `None` only
    /// once the queue is closed.
    pub async fn claim(&self) -> Option<Delivery<T>> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            match self.claim_inner().await {
                Claimed::Delivery(delivery) => return Some(delivery),
                Claimed::Closed => return None,
                Claimed::Empty => {}
            }
            tokio::select! {
                _ = self.shared.ready_notify.notified() => {}
                _ = shutdown_rx.changed() => {}
            }
        }
    }

    /// Claim, waiting for at most `timeout`.
    pub async fn claim_timeout(&self, timeout: Duration) -> Option<Delivery<T>> {
        tokio::time::timeout(timeout, self.claim()).await.ok()?
    }

    async fn claim_inner(&self) -> Claimed<T> {
        let (delivery, more_ready) = {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return Claimed::Closed;
            }
            let Some(slot) = state.ready.pop() else {
                return Claimed::Empty;
            };
            let delivery = self.arm_slot(&mut state, slot);
            (delivery, !state.ready.is_empty())
        };

        if more_ready {
            // Hand the wakeup on so a second claimer is not left sleeping
            // behind a single stored notify permit.
            self.shared.ready_notify.notify_one();
        }
        self.shared.space_notify.notify_one();
        self.shared.armed_notify.notify_one();
        Claimed::Delivery(delivery)
    }

    /// Move a ready slot into the in-flight tracker and build the claim
    /// handle. Redeliveries keep the token of their first claim.
    fn arm_slot(&self, state: &mut QueueState<T>, slot: ReadySlot<T>) -> Delivery<T> {
        let token = slot.token.unwrap_or_else(DeliveryToken::generate);
        let key = self.key_for(&slot.element, token);
        let now = Instant::now();
        state.inflight.arm(
            key,
            token,
            slot.element.clone(),
            now,
            self.shared.ack_timeout,
        );
        Delivery::new(token, slot.element, now)
    }

    fn key_for(&self, element: &T, token: DeliveryToken) -> TrackingKey<T> {
        match self.shared.tracking {
            TrackingMode::ByToken => TrackingKey::Token(token),
            TrackingMode::ByValue => TrackingKey::Value(element.clone()),
        }
    }

    /// Settle a claimed delivery.
    ///
    /// Disarms the in-flight entry first in either case. `Ack` clears the
    /// retry ledger; `Nack` runs the same redelivery decision the reaper
    /// uses on expiry.
    ///
    /// Returns whether an in-flight entry was actually settled. `false`
    /// means the delivery had already expired (the reaper owned the
    /// decision) or, under value tracking, an equal-valued claim was settled
    /// before this one; late acknowledgements are a no-op by design.
    pub async fn acknowledge(&self, delivery: Delivery<T>, ack: Acknowledgement) -> bool {
        let token = delivery.token();
        let key = self.key_for(delivery.element(), token);

        let routed = {
            let mut state = self.shared.state.lock().await;
            let Some(entry) = state.inflight.disarm(&key) else {
                debug!(token = %token, "acknowledge found no in-flight entry; ignoring");
                return false;
            };
            match ack {
                Acknowledgement::Ack => {
                    state.ledger.clear(&key);
                    None
                }
                Acknowledgement::Nack => Some(route_failed(&mut state, entry)),
            }
        };

        match routed {
            Some(Routed::Requeued) => {
                debug!(token = %token, "rejected element requeued");
                self.shared.ready_notify.notify_one();
            }
            Some(Routed::DeadLettered(element)) => {
                debug!(token = %token, "rejected element exhausted retries; dead-lettering");
                self.shared.sink.push(element).await;
            }
            None => {}
        }
        true
    }

    // ---- introspection -------------------------------------------------

    /// Number of claimed elements still waiting for an acknowledgement.
    pub async fn pending_ack_count(&self) -> usize {
        self.shared.state.lock().await.inflight.len()
    }

    /// Number of elements ready to be claimed. Excludes in-flight elements.
    pub async fn len(&self) -> usize {
        self.shared.state.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.state.lock().await.ready.is_empty()
    }

    pub async fn remaining_capacity(&self) -> usize {
        self.shared.state.lock().await.ready.remaining_capacity()
    }

    /// The element a claim would return next, if any.
    pub async fn peek(&self) -> Option<T> {
        self.shared.state.lock().await.ready.peek().cloned()
    }

    pub async fn contains(&self, element: &T) -> bool {
        self.shared.state.lock().await.ready.contains(element)
    }

    pub async fn stats(&self) -> QueueStats {
        let (ready, in_flight) = {
            let state = self.shared.state.lock().await;
            (state.ready.len(), state.inflight.len())
        };
        QueueStats {
            ready,
            in_flight,
            dead_lettered: self.shared.sink.len().await,
        }
    }

    /// Handle to the dead-letter sink, for inspecting or draining
    /// quarantined elements.
    pub fn dead_letters(&self) -> Arc<dyn DeadLetterSink<T>> {
        Arc::clone(&self.shared.sink)
    }

    // ---- lifecycle -----------------------------------------------------

    /// Stop the queue: the reaper terminates, blocked enqueues fail with
    /// [`EnqueueError::Closed`], and blocked claims return `None`. In-flight
    /// entries are abandoned, not flushed to the dead-letter sink.
    pub async fn close(&self) {
        {
            let mut state = self.shared.state.lock().await;
            state.closed = true;
        }
        let _ = self.shutdown_tx.send(true);
        self.shared.ready_notify.notify_waiters();
        self.shared.space_notify.notify_waiters();
        self.shared.armed_notify.notify_waiters();
    }
}

impl<T> Drop for AckQueue<T> {
    fn drop(&mut self) {
        // Receivers may already be gone; either way the reaper must not
        // outlive the queue.
        let _ = self.shutdown_tx.send(true);
        self.reaper.abort();
    }
}
