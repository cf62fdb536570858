//! Retry ledger: per-key delivery counts and the redelivery decision.

use std::collections::HashMap;
use std::hash::Hash;

use crate::delivery::DeliveryToken;

/// Identity under which the ledger and the in-flight tracker recognise a
/// claim. Which variant is used depends on the queue's
/// [`TrackingMode`](crate::TrackingMode).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TrackingKey<T> {
    /// Equality-keyed: concurrently in-flight elements that compare equal
    /// share one identity.
    Value(T),
    /// Per-claim identity that survives redeliveries.
    Token(DeliveryToken),
}

/// Tracks how many times each key has been delivered and decides whether
/// another attempt is allowed. Pure data; the facade serialises access.
///
/// Counts store *deliveries*: the original claim is attempt 1, so the first
/// redelivery decision records a count of 2. With a limit of `n`, exactly `n`
/// redeliveries are granted and the element is claimable `n + 1` times in
/// total before it is routed to the dead-letter sink.
pub(crate) struct RetryLedger<T> {
    counts: HashMap<TrackingKey<T>, u32>,
    limit: Option<u32>,
}

impl<T> RetryLedger<T>
where
    T: Clone + Eq + Hash,
{
    /// `limit = None` means redeliver forever.
    pub(crate) fn new(limit: Option<u32>) -> Self {
        Self {
            counts: HashMap::new(),
            limit,
        }
    }

    /// Record one redelivery decision for `key`. Returns whether the element
    /// is still eligible for redelivery; once it returns `false` the caller
    /// must route the element to the dead-letter sink and [`clear`] the key.
    ///
    /// Not eligible means the count is left untouched, so repeated calls for
    /// an exhausted key keep answering `false`.
    ///
    /// [`clear`]: RetryLedger::clear
    pub(crate) fn record_attempt(&mut self, key: &TrackingKey<T>) -> bool {
        let count = self.counts.entry(key.clone()).or_insert(1);
        match self.limit {
            Some(limit) if *count > limit => false,
            _ => {
                *count += 1;
                true
            }
        }
    }

    /// Forget the key. Called on successful acknowledgement and on
    /// dead-letter routing.
    pub(crate) fn clear(&mut self, key: &TrackingKey<T>) {
        self.counts.remove(key);
    }

    /// Deliveries recorded for `key` so far (1 if the key has never been
    /// redelivered).
    #[cfg(test)]
    pub(crate) fn deliveries(&self, key: &TrackingKey<T>) -> u32 {
        self.counts.get(key).copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn key(s: &str) -> TrackingKey<String> {
        TrackingKey::Value(s.to_string())
    }

    #[test]
    fn first_decision_records_count_of_two() {
        let mut ledger = RetryLedger::new(Some(5));
        let k = key("a");

        assert!(ledger.record_attempt(&k));
        assert_eq!(ledger.deliveries(&k), 2);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(3, 3)]
    #[case(10, 10)]
    fn limit_grants_exactly_that_many_redeliveries(
        #[case] limit: u32,
        #[case] expected_grants: u32,
    ) {
        let mut ledger = RetryLedger::new(Some(limit));
        let k = key("a");

        let mut granted = 0;
        while ledger.record_attempt(&k) {
            granted += 1;
            assert!(granted <= expected_grants, "granted more than the limit");
        }
        assert_eq!(granted, expected_grants);

        // Exhausted keys stay exhausted.
        assert!(!ledger.record_attempt(&k));
        assert!(!ledger.record_attempt(&k));
    }

    #[test]
    fn no_limit_never_exhausts() {
        let mut ledger = RetryLedger::new(None);
        let k = key("a");

        for _ in 0..100 {
            assert!(ledger.record_attempt(&k));
        }
        assert_eq!(ledger.deliveries(&k), 101);
    }

    #[test]
    fn clear_resets_the_count() {
        let mut ledger = RetryLedger::new(Some(1));
        let k = key("a");

        assert!(ledger.record_attempt(&k));
        assert!(!ledger.record_attempt(&k));

        ledger.clear(&k);
        assert!(ledger.record_attempt(&k));
    }

    #[test]
    fn keys_are_tracked_independently() {
        let mut ledger = RetryLedger::new(Some(1));
        let a = key("a");
        let b = key("b");

        assert!(ledger.record_attempt(&a));
        assert!(!ledger.record_attempt(&a));
        assert!(ledger.record_attempt(&b));
    }

    #[test]
    fn token_and_value_keys_do_not_collide() {
        let mut ledger: RetryLedger<String> = RetryLedger::new(Some(1));
        let by_value = key("a");
        let by_token = TrackingKey::Token(crate::delivery::DeliveryToken::generate());

        assert!(ledger.record_attempt(&by_value));
        assert!(!ledger.record_attempt(&by_value));
        assert!(ledger.record_attempt(&by_token));
    }
}
