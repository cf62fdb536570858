//! Expiry reaper: the background task that recovers expired claims.
//!
//! One reaper runs per queue for the queue's whole lifetime. It sleeps until
//! the earliest in-flight deadline, consumes whatever has expired and routes
//! each entry through the shared redelivery decision: back to the ready
//! queue tail, or to the dead-letter sink once retries are exhausted.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::queue::{Routed, Shared, route_failed};

pub(crate) fn spawn<T>(shared: Arc<Shared<T>>, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    tokio::spawn(run(shared, shutdown_rx))
}

async fn run<T>(shared: Arc<Shared<T>>, mut shutdown_rx: watch::Receiver<bool>)
where
    T: Clone + Eq + Hash + Send + 'static,
{
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Consume one expired entry, or learn when the next one is due.
        let (routed, next_deadline) = {
            let mut state = shared.state.lock().await;
            match state.inflight.pop_expired(Instant::now()) {
                Some(entry) => {
                    let token = entry.token;
                    (Some((token, route_failed(&mut state, entry))), None)
                }
                None => (None, state.inflight.next_deadline()),
            }
        };

        match routed {
            Some((token, Routed::Requeued)) => {
                debug!(token = %token, "expired element requeued");
                shared.ready_notify.notify_one();
                // Keep draining; more entries may already be expired.
                continue;
            }
            Some((token, Routed::DeadLettered(element))) => {
                debug!(token = %token, "expired element exhausted retries; dead-lettering");
                // Pushed outside the state lock; the entry was consumed under
                // the lock, so the element reaches the sink exactly once.
                shared.sink.push(element).await;
                continue;
            }
            None => {}
        }

        match next_deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = shared.armed_notify.notified() => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = shared.armed_notify.notified() => {}
                }
            }
        }
    }

    debug!("expiry reaper stopped");
}
