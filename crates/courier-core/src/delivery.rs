//! Delivery tokens and the claim handle handed to consumers.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity of one delivery chain.
///
/// A token is generated when an element is first claimed and travels with the
/// element through every redelivery, so retry accounting can follow a single
/// chain even when equal-valued elements are in flight at the same time.
///
/// ULIDs are used so tokens sort by claim time and can be generated without
/// coordination.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryToken(Ulid);

impl DeliveryToken {
    pub(crate) fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery-{}", self.0)
    }
}

/// A claimed element awaiting acknowledgement.
///
/// The consumer owns this handle and passes it back (by value) to
/// [`AckQueue::acknowledge`](crate::AckQueue::acknowledge), so a delivery
/// cannot be acknowledged twice.
#[derive(Debug)]
pub struct Delivery<T> {
    token: DeliveryToken,
    element: T,
    claimed_at: Instant,
}

impl<T> Delivery<T> {
    pub(crate) fn new(token: DeliveryToken, element: T, claimed_at: Instant) -> Self {
        Self {
            token,
            element,
            claimed_at,
        }
    }

    pub fn token(&self) -> DeliveryToken {
        self.token
    }

    pub fn element(&self) -> &T {
        &self.element
    }

    pub fn claimed_at(&self) -> Instant {
        self.claimed_at
    }

    /// Consume the handle, keeping the element but giving up the ability to
    /// acknowledge it. The delivery will expire and be redelivered as usual.
    pub fn into_element(self) -> T {
        self.element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_sortable() {
        let a = DeliveryToken::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = DeliveryToken::generate();

        assert_ne!(a, b);
        assert!(a < b);
        assert!(a.to_string().starts_with("delivery-"));
    }

    #[test]
    fn tokens_round_trip_through_serde() {
        let token = DeliveryToken::generate();
        let json = serde_json::to_string(&token).unwrap();
        let back: DeliveryToken = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);
    }

    #[test]
    fn delivery_exposes_element_and_token() {
        let token = DeliveryToken::generate();
        let delivery = Delivery::new(token, "payload", Instant::now());

        assert_eq!(delivery.token(), token);
        assert_eq!(*delivery.element(), "payload");
        assert_eq!(delivery.into_element(), "payload");
    }
}
