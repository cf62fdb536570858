//! Demo: a producer, a flaky consumer and a poison element.
//!
//! Order 2 fails twice before succeeding and rides its retry budget; order 4
//! never succeeds and ends up in the dead-letter sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use courier_core::{AckQueue, Acknowledgement, BuildError};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Order {
    id: u32,
}

/// Pretend to process an order; some attempts fail.
fn process(order: &Order, attempt: u32) -> Result<(), String> {
    match order.id {
        2 if attempt < 3 => Err(format!("transient failure (attempt {attempt})")),
        4 => Err("permanently broken".to_string()),
        _ => Ok(()),
    }
}

/// Claim and process until the queue stays quiet for a while.
async fn consume(queue: Arc<AckQueue<Order>>) {
    let mut attempts: HashMap<Order, u32> = HashMap::new();
    while let Some(delivery) = queue.claim_timeout(Duration::from_secs(2)).await {
        let order = delivery.element().clone();
        let attempt = attempts.entry(order.clone()).or_insert(0);
        *attempt += 1;

        match process(&order, *attempt) {
            Ok(()) => {
                info!(order = order.id, attempt = *attempt, "processed");
                queue.acknowledge(delivery, Acknowledgement::Ack).await;
            }
            Err(reason) => {
                info!(order = order.id, attempt = *attempt, %reason, "rejected");
                queue.acknowledge(delivery, Acknowledgement::Nack).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BuildError> {
    tracing_subscriber::fmt::init();

    let queue: Arc<AckQueue<Order>> = Arc::new(
        AckQueue::builder(Duration::from_millis(500))
            .capacity(16)
            .retry_limit(2)
            .build()?,
    );

    let consumer = tokio::spawn(consume(Arc::clone(&queue)));

    for id in 1..=5 {
        queue.enqueue(Order { id }).await.expect("queue is open");
    }

    consumer.await.expect("consumer panicked");

    let stats = queue.stats().await;
    info!(?stats, "queue settled");
    for order in queue.dead_letters().drain().await {
        info!(order = order.id, "dead-lettered");
    }

    queue.close().await;
    Ok(())
}
