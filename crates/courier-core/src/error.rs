//! Error types for the queue facade.

use std::fmt;

use thiserror::Error;

/// Failure to enqueue. The rejected element rides inside the error so the
/// caller never loses it.
#[derive(Debug, Error)]
pub enum EnqueueError<T: fmt::Debug> {
    /// The queue is at capacity (or stayed at capacity for the whole timeout
    /// of a timed enqueue).
    #[error("queue is full")]
    Full(T),

    /// The queue has been closed and accepts no new elements.
    #[error("queue is closed")]
    Closed(T),
}

impl<T: fmt::Debug> EnqueueError<T> {
    /// Recover the element that could not be enqueued.
    pub fn into_element(self) -> T {
        match self {
            Self::Full(element) | Self::Closed(element) => element,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_is_recoverable() {
        let err = EnqueueError::Full("payload");
        assert_eq!(err.to_string(), "queue is full");
        assert_eq!(err.into_element(), "payload");

        let err = EnqueueError::Closed(42);
        assert_eq!(err.to_string(), "queue is closed");
        assert_eq!(err.into_element(), 42);
    }
}
