//! Lock-guarded stream for owners that hand a stream across threads.

use crate::error::Result;
use crate::stream::{StateStream, StreamConfig};
use crate::types::{State, Tick};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A [`StateStream`] behind a mutex.
///
/// The cursor is part of the stream, so a multi-step walk must hold the
/// guard from [`lock`](Self::lock) for its whole length.
pub struct SharedStateStream<P> {
    inner: Arc<Mutex<StateStream<P>>>,
}

impl<P> SharedStateStream<P> {
    pub fn new(stream: StateStream<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self::new(StateStream::with_config(config))
    }

    /// Exclusive access for compound operations.
    pub fn lock(&self) -> MutexGuard<'_, StateStream<P>> {
        self.inner.lock()
    }

    pub fn get_state(&self, tick: impl Into<Tick>) -> State {
        self.inner.lock().get_state(tick)
    }

    pub fn completed_prefix(&self) -> Tick {
        self.inner.lock().completed_prefix()
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().is_poisoned()
    }
}

impl<P: Clone> SharedStateStream<P> {
    pub fn write_range(
        &self,
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
        payload: Option<P>,
        error_check: bool,
    ) -> Result<bool> {
        self.inner
            .lock()
            .write_range(state, start, end, payload, error_check)
    }

    pub fn write_value_range(&self, tick: impl Into<Tick>, payload: Option<P>) -> Result<bool> {
        self.inner.lock().write_value_range(tick, payload)
    }

    pub fn set_completed_prefix(&self, prefix: impl Into<Tick>) -> Result<bool> {
        self.inner.lock().set_completed_prefix(prefix)
    }
}

impl<P> Clone for SharedStateStream<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> Default for SharedStateStream<P> {
    fn default() -> Self {
        Self::new(StateStream::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_writers_on_several_threads() {
        let shared = SharedStateStream::<u64>::default();

        let handles: Vec<_> = (0..4u64)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..50u64 {
                        let tick = 1 + worker * 50 + i;
                        shared.write_value_range(tick, Some(tick)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut stream = shared.lock();
        for tick in 1..=200u64 {
            assert_eq!(stream.get_state(tick), State::Value);
            assert_eq!(stream.get_range(tick).payload(), Some(&tick));
        }
        stream.verify().unwrap();
    }

    #[test]
    fn test_prefix_through_shared_handle() {
        let shared = SharedStateStream::<()>::default();
        assert!(shared.set_completed_prefix(99).unwrap());
        assert_eq!(shared.completed_prefix(), Tick(99));
        assert_eq!(shared.get_state(100), State::Unknown);
        assert!(!shared.is_poisoned());
    }
}
