//! Mutex decorator for sharing a gate between threads
//!
//! [`RateGate`](super::RateGate) holds no locks so that the single-owner hot
//! path stays cheap. Callers that do need one gate across threads wrap it in
//! a [`SharedGate`], which serializes every call through a
//! [`parking_lot::Mutex`].

use super::rate_gate::{EventGate, SplitGate};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable, thread-safe handle to a gate
///
/// Clones share the same gate. Each call takes the lock for exactly one
/// gate operation; use [`with_gate`](SharedGate::with_gate) to run several
/// operations under one lock.
///
/// # Example
///
/// ```
/// use rategate::{RateGate, SharedGate};
/// use std::time::Duration;
///
/// let gate = SharedGate::new(RateGate::new(100, Duration::from_secs(1)).unwrap());
/// let worker = gate.clone();
///
/// std::thread::spawn(move || worker.decide()).join().unwrap();
/// ```
#[derive(Debug)]
pub struct SharedGate<G> {
    inner: Arc<Mutex<G>>,
}

impl<G> Clone for SharedGate<G> {
    fn clone(&self) -> Self {
        SharedGate {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> SharedGate<G> {
    /// Wrap a gate.
    pub fn new(gate: G) -> Self {
        SharedGate {
            inner: Arc::new(Mutex::new(gate)),
        }
    }

    /// Run `f` with exclusive access to the gate.
    pub fn with_gate<R>(&self, f: impl FnOnce(&mut G) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<G: EventGate> SharedGate<G> {
    /// See [`EventGate::decide`].
    pub fn decide(&self) -> bool {
        self.inner.lock().decide()
    }

    /// See [`EventGate::reset`].
    pub fn reset(&self) {
        self.inner.lock().reset();
    }
}

impl<G: SplitGate> SharedGate<G> {
    /// See [`SplitGate::open`].
    pub fn open(&self) -> bool {
        self.inner.lock().open()
    }

    /// See [`SplitGate::register`].
    pub fn register(&self) {
        self.inner.lock().register();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Granularity, ManualClock, RateGate};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shared_gate_admits_allowance_across_threads() {
        let clock = ManualClock::frozen(0);
        // 16 events per 20 ms sub-period
        let gate = SharedGate::new(
            RateGate::with_clock(800, Duration::from_secs(1), Granularity::Auto, clock).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || (0..100).filter(|_| gate.decide()).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 16);
    }

    #[test]
    fn test_shared_gate_reset_and_inspect() {
        let clock = ManualClock::frozen(0);
        let gate = SharedGate::new(
            RateGate::with_clock(1, Duration::from_secs(1), Granularity::Auto, clock.clone())
                .unwrap(),
        );

        assert!(gate.decide());
        assert!(!gate.open());

        gate.reset();
        assert!(gate.open());
        assert_eq!(gate.with_gate(|g| g.deadline_ns()), 0);

        gate.register();
        assert!(!gate.open());
        clock.advance_by(1000);
        assert!(gate.open());
    }
}
