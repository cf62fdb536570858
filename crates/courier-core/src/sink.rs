//! Dead-letter sink port and the default in-memory sink.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Where elements go once they exhaust their retries.
///
/// The sink is append-only and unbounded as far as the queue is concerned;
/// inspection and draining are left to whoever owns the sink. Callers may
/// supply their own implementation at build time.
#[async_trait]
pub trait DeadLetterSink<T: Send>: Send + Sync {
    /// Append a quarantined element.
    async fn push(&self, element: T);

    /// Number of quarantined elements currently held.
    async fn len(&self) -> usize;

    /// Remove and return everything held, oldest first.
    async fn drain(&self) -> Vec<T>;
}

/// Default sink: an unbounded FIFO guarded by its own lock.
pub struct InMemoryDeadLetterSink<T> {
    elements: Mutex<VecDeque<T>>,
}

impl<T> InMemoryDeadLetterSink<T> {
    pub fn new() -> Self {
        Self {
            elements: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Default for InMemoryDeadLetterSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send> DeadLetterSink<T> for InMemoryDeadLetterSink<T> {
    async fn push(&self, element: T) {
        self.elements.lock().await.push_back(element);
    }

    async fn len(&self) -> usize {
        self.elements.lock().await.len()
    }

    async fn drain(&self) -> Vec<T> {
        self.elements.lock().await.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_len_drain() {
        let sink = InMemoryDeadLetterSink::new();
        sink.push("a").await;
        sink.push("b").await;

        assert_eq!(sink.len().await, 2);
        assert_eq!(sink.drain().await, vec!["a", "b"]);
        assert_eq!(sink.len().await, 0);
    }
}
