//! Single-flight coordination
//!
//! The first caller for a key starts the work on its own task. Every caller,
//! that first one included, parks a oneshot sender in the waiter list and
//! receives a clone of the result. A caller that stops waiting only drops its
//! receiver; the shared work keeps running for everyone else.

use crate::error::FetchError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

type Waiters<V> = Vec<oneshot::Sender<Result<V, FetchError>>>;

/// In-flight table keyed by `K`, producing values of type `V`
pub(crate) struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Waiters<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` unless an identical key is already in flight, in which case
    /// wait for that result instead.
    ///
    /// `work` runs detached from the caller, so cancelling this future (or
    /// wrapping it in a timeout that expires) never cancels the shared fetch.
    /// `reference` only labels the error returned when the work panics.
    pub(crate) async fn run<F, Fut>(
        self: &Arc<Self>,
        key: K,
        reference: &str,
        work: F,
    ) -> Result<V, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if let Some(guard) = self.join(key, tx) {
            let fut = work();
            tokio::spawn(async move {
                let outcome = fut.await;
                guard.complete(outcome);
            });
        }
        rx.await.unwrap_or_else(|_| {
            Err(FetchError::Abandoned {
                reference: reference.to_string(),
            })
        })
    }

    /// Number of keys currently in flight
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Register `waiter` under `key`. Returns a guard when the caller is the
    /// first one and must start the work.
    fn join(
        self: &Arc<Self>,
        key: K,
        waiter: oneshot::Sender<Result<V, FetchError>>,
    ) -> Option<FlightGuard<K, V>> {
        let mut inflight = self.inflight.lock();
        if let Some(waiters) = inflight.get_mut(&key) {
            debug!(key = ?key, "Joining in-flight fetch");
            waiters.push(waiter);
            return None;
        }
        inflight.insert(key.clone(), vec![waiter]);
        Some(FlightGuard {
            flight: Arc::clone(self),
            key: Some(key),
        })
    }
}

/// Owned by the task doing the work. Dropping it without calling `complete`
/// (the work panicked) releases the key and closes every waiter's channel.
struct FlightGuard<K: Eq + Hash, V> {
    flight: Arc<SingleFlight<K, V>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V: Clone> FlightGuard<K, V> {
    fn complete(mut self, outcome: Result<V, FetchError>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let waiters = self.flight.inflight.lock().remove(&key).unwrap_or_default();
        for tx in waiters {
            // A waiter that gave up has dropped its receiver; nothing to do
            let _ = tx.send(outcome.clone());
        }
    }
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flight.inflight.lock().remove(&key);
        }
    }
}
