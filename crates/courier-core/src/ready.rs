//! Ready queue: bounded FIFO of elements available to be claimed.

use std::collections::VecDeque;

use crate::delivery::DeliveryToken;

/// One deliverable element.
///
/// Redeliveries carry the token of their original claim so the retry chain
/// stays intact; fresh enqueues have no token yet.
#[derive(Debug)]
pub(crate) struct ReadySlot<T> {
    pub(crate) element: T,
    pub(crate) token: Option<DeliveryToken>,
}

/// Pure FIFO state behind the facade's lock. Blocking and notification live
/// in the facade; this type only enforces capacity and order.
pub(crate) struct ReadyQueue<T> {
    slots: VecDeque<ReadySlot<T>>,
    capacity: usize,
}

impl<T> ReadyQueue<T> {
    /// `capacity = None` means effectively unbounded.
    pub(crate) fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            slots: VecDeque::new(),
            capacity: capacity.unwrap_or(usize::MAX),
        }
    }

    /// Producer-side push. Hands the element back when the queue is full.
    pub(crate) fn push_fresh(&mut self, element: T) -> Result<(), T> {
        if self.slots.len() >= self.capacity {
            return Err(element);
        }
        self.slots.push_back(ReadySlot {
            element,
            token: None,
        });
        Ok(())
    }

    /// Requeue after NACK or expiry. Appends at the tail and bypasses the
    /// capacity bound: the element re-enters the space its own claim vacated,
    /// and the redelivery path must never drop elements.
    pub(crate) fn push_redelivery(&mut self, element: T, token: DeliveryToken) {
        self.slots.push_back(ReadySlot {
            element,
            token: Some(token),
        });
    }

    pub(crate) fn pop(&mut self) -> Option<ReadySlot<T>> {
        self.slots.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.slots.len())
    }

    pub(crate) fn peek(&self) -> Option<&T> {
        self.slots.front().map(|slot| &slot.element)
    }

    pub(crate) fn contains(&self, element: &T) -> bool
    where
        T: PartialEq,
    {
        self.slots.iter().any(|slot| slot.element == *element)
    }
}
