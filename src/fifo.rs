//! Bounded per-QoS FIFO of encapsulation contexts.
//!
//! The ring is generic over its element type so the same fine-grained-lock
//! discipline can back both the encapsulator's context queue and any future
//! caller-defined queueing need, though today [`crate::encap::Encapsulator`]
//! is the only user.
//!
//! `parking_lot::Mutex` rather than `std::sync::Mutex`: a single producer
//! (`receive_pdu`) and a single consumer (`get_packet`) per QoS hand work off
//! through this lock on every call, so lock/unlock cost dominates;
//! `parking_lot` avoids `std`'s poisoning overhead and is noticeably cheaper
//! uncontended.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::Error;

/// A fixed-capacity, lock-guarded ring buffer.
///
/// All operations acquire the internal lock for their whole duration; there
/// is no lock-free fast path. Concurrent producers or concurrent consumers
/// on the *same* FIFO are still the caller's responsibility to serialize —
/// this only makes a single producer and a single consumer safe to run
/// concurrently with each other.
#[derive(Debug)]
pub struct Fifo<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

impl<T> Fifo<T> {
    /// Creates an empty FIFO of the given capacity.
    ///
    /// # Errors
    ///
    /// [`Error::FifoZeroSize`] if `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::FifoZeroSize);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// This FIFO's fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements currently queued.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Inserts `value` at the tail.
    ///
    /// # Errors
    ///
    /// [`Error::FifoFull`] if the ring is already at capacity.
    pub fn push(&self, value: T) -> Result<(), Error> {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity {
            return Err(Error::FifoFull);
        }
        guard.push_back(value);
        Ok(())
    }

    /// Removes and returns the head element.
    ///
    /// # Errors
    ///
    /// [`Error::FifoEmpty`] if the ring has no elements.
    pub fn pop(&self) -> Result<T, Error> {
        self.inner.lock().pop_front().ok_or(Error::FifoEmpty)
    }

    /// Calls `f` with a mutable reference to the head element, without
    /// removing it, while holding the lock.
    ///
    /// # Errors
    ///
    /// [`Error::FifoEmpty`] if the ring has no elements.
    pub fn with_head_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, Error> {
        let mut guard = self.inner.lock();
        let head = guard.front_mut().ok_or(Error::FifoEmpty)?;
        Ok(f(head))
    }

    /// Removes every element, running `drop` on each: releasing the FIFO
    /// frees every stored context's Virtual Fragment.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(Error::FifoZeroSize, Fifo::<u32>::new(0).unwrap_err());
    }

    #[test]
    fn push_pop_respects_order_and_capacity() {
        let fifo = Fifo::new(2).unwrap();
        fifo.push(1).unwrap();
        fifo.push(2).unwrap();
        assert_eq!(Error::FifoFull, fifo.push(3).unwrap_err());
        assert_eq!(1, fifo.pop().unwrap());
        assert_eq!(2, fifo.pop().unwrap());
        assert_eq!(Error::FifoEmpty, fifo.pop().unwrap_err());
    }

    #[test]
    fn with_head_mut_mutates_without_removing() {
        let fifo = Fifo::new(4).unwrap();
        fifo.push(10).unwrap();
        fifo.with_head_mut(|v| *v += 1).unwrap();
        assert_eq!(1, fifo.count());
        assert_eq!(11, fifo.pop().unwrap());
    }

    #[test]
    fn with_head_mut_on_empty_fails() {
        let fifo = Fifo::<u32>::new(1).unwrap();
        assert_eq!(Error::FifoEmpty, fifo.with_head_mut(|_| ()).unwrap_err());
    }

    #[test]
    fn clear_empties_ring() {
        let fifo = Fifo::new(4).unwrap();
        fifo.push(1).unwrap();
        fifo.push(2).unwrap();
        fifo.clear();
        assert_eq!(0, fifo.count());
    }
}
