//! Queue configuration and the fail-fast builder.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::AckQueue;
use crate::sink::DeadLetterSink;

/// How the ledger and the in-flight tracker identify a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    /// Per-claim identity. Each first claim mints a token that survives
    /// redeliveries, so equal-valued elements in flight at the same time are
    /// tracked and retried independently.
    #[default]
    ByToken,

    /// Equality-keyed, matching the behaviour of value-keyed broker queues:
    /// concurrently in-flight elements that compare equal share one tracker
    /// and ledger identity, so acknowledging one may settle "an" equal
    /// element rather than a specific instance.
    ByValue,
}

/// Rejected configuration, reported at build time rather than as misbehaviour
/// later.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("acknowledgement timeout must be greater than zero")]
    ZeroAckTimeout,

    #[error("capacity must be greater than zero")]
    ZeroCapacity,
}

/// Builder for [`AckQueue`]. Obtained via [`AckQueue::builder`].
///
/// Defaults: unbounded capacity, unbounded retries, token tracking, internal
/// in-memory dead-letter sink.
pub struct AckQueueBuilder<T> {
    pub(crate) ack_timeout: Duration,
    pub(crate) capacity: Option<usize>,
    pub(crate) retry_limit: Option<u32>,
    pub(crate) tracking: TrackingMode,
    pub(crate) sink: Option<Arc<dyn DeadLetterSink<T>>>,
}

impl<T> AckQueueBuilder<T>
where
    T: Clone + Eq + Hash + Debug + Send + 'static,
{
    pub(crate) fn new(ack_timeout: Duration) -> Self {
        Self {
            ack_timeout,
            capacity: None,
            retry_limit: None,
            tracking: TrackingMode::default(),
            sink: None,
        }
    }

    /// Bound the ready queue. Elements beyond this are rejected at enqueue
    /// time; redeliveries are exempt.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Maximum number of redeliveries before an element is quarantined. A
    /// limit of `n` makes an element claimable `n + 1` times in total. Zero
    /// is valid: the first expiry or NACK dead-letters immediately.
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    pub fn tracking(mut self, mode: TrackingMode) -> Self {
        self.tracking = mode;
        self
    }

    /// Route quarantined elements to a caller-owned sink instead of the
    /// internal one.
    pub fn dead_letter_sink(mut self, sink: Arc<dyn DeadLetterSink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<AckQueue<T>, BuildError> {
        if self.ack_timeout.is_zero() {
            return Err(BuildError::ZeroAckTimeout);
        }
        if self.capacity == Some(0) {
            return Err(BuildError::ZeroCapacity);
        }
        Ok(AckQueue::from_builder(self))
    }
}
