//! In-flight tracker: claimed entries ordered by acknowledgement deadline.

use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::delivery::DeliveryToken;
use crate::ledger::TrackingKey;

/// One claimed, not-yet-acknowledged element.
#[derive(Debug)]
pub(crate) struct InFlightEntry<T> {
    pub(crate) key: TrackingKey<T>,
    pub(crate) token: DeliveryToken,
    pub(crate) element: T,
    pub(crate) claimed_at: Instant,
    pub(crate) deadline: Instant,
}

/// Heap slot for deadline ordering.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest deadline
/// first). Ties break on the sequence number, which is arbitrary as far as
/// the contract goes.
#[derive(Debug, PartialEq, Eq)]
struct DeadlineSlot {
    deadline: Instant,
    seq: u64,
}

impl PartialOrd for DeadlineSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeadlineSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Holds claimed elements until they are acknowledged or expire.
///
/// Pure state: it lives inside the facade's single state lock and has no
/// concurrency logic of its own. Removal by key uses lazy deletion; the heap
/// keeps a slot for every arm, and slots whose sequence number is no longer
/// live are skipped when the heap is inspected.
pub(crate) struct InFlightTracker<T> {
    heap: BinaryHeap<DeadlineSlot>,
    live: HashMap<u64, InFlightEntry<T>>,
    by_key: HashMap<TrackingKey<T>, Vec<u64>>,
    next_seq: u64,
}

impl<T> InFlightTracker<T>
where
    T: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            by_key: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Insert an entry expiring `ttl` from `now`.
    pub(crate) fn arm(
        &mut self,
        key: TrackingKey<T>,
        token: DeliveryToken,
        element: T,
        now: Instant,
        ttl: Duration,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let deadline = now + ttl;
        self.by_key.entry(key.clone()).or_default().push(seq);
        self.live.insert(
            seq,
            InFlightEntry {
                key,
                token,
                element,
                claimed_at: now,
                deadline,
            },
        );
        self.heap.push(DeadlineSlot { deadline, seq });
    }

    /// Remove one entry matching `key`, if any. Which of several equal-keyed
    /// entries is removed is unspecified. Returns `None` when nothing
    /// matches, so late or duplicate acknowledgements are a graceful no-op.
    pub(crate) fn disarm(&mut self, key: &TrackingKey<T>) -> Option<InFlightEntry<T>> {
        let seqs = self.by_key.get_mut(key)?;
        let seq = seqs.pop()?;
        if seqs.is_empty() {
            self.by_key.remove(key);
        }
        // The heap slot stays behind and is skipped lazily.
        self.live.remove(&seq)
    }

    /// Remove and return the earliest entry whose deadline is at or before
    /// `now`, if one exists.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Option<InFlightEntry<T>> {
        loop {
            let (deadline, seq) = {
                let slot = self.heap.peek()?;
                (slot.deadline, slot.seq)
            };
            if !self.live.contains_key(&seq) {
                // Disarmed earlier; drop the stale slot.
                self.heap.pop();
                continue;
            }
            if deadline > now {
                return None;
            }

            self.heap.pop();
            let entry = self.live.remove(&seq)?;
            if let Some(seqs) = self.by_key.get_mut(&entry.key) {
                seqs.retain(|s| *s != seq);
                if seqs.is_empty() {
                    self.by_key.remove(&entry.key);
                }
            }
            return Some(entry);
        }
    }

    /// Deadline of the earliest live entry, for the reaper's timed wait.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        loop {
            let slot = self.heap.peek()?;
            if self.live.contains_key(&slot.seq) {
                return Some(slot.deadline);
            }
            self.heap.pop();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> InFlightTracker<String> {
        InFlightTracker::new()
    }

    fn arm(t: &mut InFlightTracker<String>, element: &str, now: Instant, ttl_ms: u64) {
        let token = DeliveryToken::generate();
        t.arm(
            TrackingKey::Value(element.to_string()),
            token,
            element.to_string(),
            now,
            Duration::from_millis(ttl_ms),
        );
    }

    #[test]
    fn pop_expired_respects_deadlines() {
        let mut t = tracker();
        let now = Instant::now();
        arm(&mut t, "a", now, 50);

        assert!(t.pop_expired(now).is_none());
        assert!(t.pop_expired(now + Duration::from_millis(49)).is_none());

        let entry = t
            .pop_expired(now + Duration::from_millis(50))
            .expect("deadline has passed");
        assert_eq!(entry.element, "a");
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn earliest_deadline_pops_first() {
        let mut t = tracker();
        let now = Instant::now();
        arm(&mut t, "late", now, 200);
        arm(&mut t, "early", now, 10);

        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(10)));

        let entry = t.pop_expired(now + Duration::from_secs(1)).unwrap();
        assert_eq!(entry.element, "early");
        let entry = t.pop_expired(now + Duration::from_secs(1)).unwrap();
        assert_eq!(entry.element, "late");
    }

    #[test]
    fn disarm_removes_one_entry_and_is_noop_when_absent() {
        let mut t = tracker();
        let now = Instant::now();
        arm(&mut t, "a", now, 50);
        arm(&mut t, "a", now, 50);

        let key = TrackingKey::Value("a".to_string());
        assert!(t.disarm(&key).is_some());
        assert_eq!(t.len(), 1);
        assert!(t.disarm(&key).is_some());
        assert_eq!(t.len(), 0);
        assert!(t.disarm(&key).is_none());
    }

    #[test]
    fn disarmed_entries_are_skipped_lazily() {
        let mut t = tracker();
        let now = Instant::now();
        arm(&mut t, "a", now, 10);
        arm(&mut t, "b", now, 20);

        t.disarm(&TrackingKey::Value("a".to_string()));

        // "a" still occupies a heap slot but must not surface.
        assert_eq!(t.next_deadline(), Some(now + Duration::from_millis(20)));
        let entry = t.pop_expired(now + Duration::from_secs(1)).unwrap();
        assert_eq!(entry.element, "b");
        assert!(t.pop_expired(now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn next_deadline_is_none_when_empty() {
        let mut t = tracker();
        assert!(t.next_deadline().is_none());

        let now = Instant::now();
        arm(&mut t, "a", now, 10);
        t.disarm(&TrackingKey::Value("a".to_string()));
        assert!(t.next_deadline().is_none());
    }
}
