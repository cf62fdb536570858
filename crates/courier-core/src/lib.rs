//! courier-core
//!
//! An acknowledgement-tracked delivery queue: FIFO hand-off where every
//! claimed element must be acknowledged within a bounded time window.
//! Unacknowledged or rejected elements are redelivered at the tail of the
//! queue; elements redelivered past a configurable retry limit are
//! quarantined in a dead-letter sink. At-least-once delivery semantics on an
//! in-memory queue, with no external broker.
//!
//! # Module map
//! - **queue**: the [`AckQueue`] facade (enqueue/claim/acknowledge) and the
//!   shared redelivery decision
//! - **config**: [`AckQueueBuilder`] and [`TrackingMode`]
//! - **delivery**: [`DeliveryToken`] and the [`Delivery`] claim handle
//! - **sink**: the [`DeadLetterSink`] port and the default in-memory sink
//! - **error**: [`EnqueueError`]
//! - internal: ready queue state, in-flight deadline tracker, retry ledger,
//!   expiry reaper
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use courier_core::{AckQueue, Acknowledgement};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue: AckQueue<String> = AckQueue::builder(Duration::from_millis(200))
//!     .capacity(16)
//!     .retry_limit(3)
//!     .build()
//!     .unwrap();
//!
//! queue.try_enqueue("job".to_string()).await.unwrap();
//! let delivery = queue.claim().await.unwrap();
//! assert_eq!(delivery.element(), "job");
//! queue.acknowledge(delivery, Acknowledgement::Ack).await;
//! # }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod queue;
pub mod sink;

mod inflight;
mod ledger;
mod ready;
mod reaper;

pub use self::config::{AckQueueBuilder, BuildError, TrackingMode};
pub use self::delivery::{Delivery, DeliveryToken};
pub use self::error::EnqueueError;
pub use self::queue::{AckQueue, Acknowledgement, QueueStats};
pub use self::sink::{DeadLetterSink, InMemoryDeadLetterSink};
