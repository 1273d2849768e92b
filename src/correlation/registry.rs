//! Pending-request registry with shared-future deduplication.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::config::CorrelationConfig;
use super::error::CorrelationError;
use crate::cache::ResponseCache;

/// Response value carried through a correlation registry.
///
/// `has_payload` marks values that are present in the domain sense (e.g.
/// coordinates actually found); only those are written through to the cache.
pub trait Correlated: Clone + Send + Sync + 'static {
    fn has_payload(&self) -> bool {
        true
    }
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, CorrelationError>>>;
type Settler<T> = Arc<Mutex<Option<oneshot::Sender<Result<T, CorrelationError>>>>>;

struct PendingRequest<T: Correlated> {
    shared: SharedOutcome<T>,
    settler: Settler<T>,
    deadline: tokio::task::JoinHandle<()>,
    opened_at: DateTime<Utc>,
}

impl<T: Correlated> PendingRequest<T> {
    fn settle(&self, outcome: Result<T, CorrelationError>) {
        self.deadline.abort();
        if let Some(sender) = self.settler.lock().take() {
            // Every waiter may already be gone; nothing left to notify then.
            let _ = sender.send(outcome);
        }
    }
}

/// Parks, resolves, and times out single-value futures keyed by a
/// correlation key.
///
/// At most one pending request exists per key; concurrent waiters on the
/// same key share one future and one eventual outcome. Settling — by
/// response, by error, or by deadline — removes the entry, so a later
/// `wait_for` on the same key starts a fresh request.
///
/// The registry never publishes outbound requests itself: the caller of
/// [`wait_for`](Self::wait_for) does, exactly once per key, when
/// [`ResponseFuture::is_first`] reports that the call created the pending
/// entry.
pub struct CorrelationRegistry<T: Correlated> {
    kind: &'static str,
    wait: Duration,
    pending: Arc<DashMap<String, PendingRequest<T>>>,
    cache: Option<Arc<dyn ResponseCache<T>>>,
}

impl<T: Correlated> CorrelationRegistry<T> {
    /// `kind` names the lookup in logs (e.g. `"coordinates"`, `"weather"`).
    pub fn new(kind: &'static str, config: &CorrelationConfig) -> Self {
        Self {
            kind,
            wait: config.wait(),
            pending: Arc::new(DashMap::new()),
            cache: None,
        }
    }

    /// Attach a write-through cache for resolved values with a payload.
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache<T>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Park a future for `key`, or join the one already pending.
    pub fn wait_for(&self, key: &str) -> ResponseFuture<T> {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                debug!(kind = self.kind, %key, "joining pending request");
                ResponseFuture {
                    shared: entry.get().shared.clone(),
                    first: false,
                }
            }
            Entry::Vacant(slot) => {
                info!(kind = self.kind, %key, "waiting for response");
                let (sender, receiver) = oneshot::channel::<Result<T, CorrelationError>>();
                let dropped = CorrelationError::Timeout {
                    key: key.to_string(),
                };
                let shared: SharedOutcome<T> = receiver
                    .map(move |received| match received {
                        Ok(outcome) => outcome,
                        // Sender dropped without settling; treat as expiry.
                        Err(_) => Err(dropped),
                    })
                    .boxed()
                    .shared();

                let settler: Settler<T> = Arc::new(Mutex::new(Some(sender)));
                let deadline = self.arm_deadline(key.to_string(), Arc::clone(&settler));
                slot.insert(PendingRequest {
                    shared: shared.clone(),
                    settler,
                    deadline,
                    opened_at: Utc::now(),
                });

                ResponseFuture {
                    shared,
                    first: true,
                }
            }
        }
    }

    /// Spawn the expiry task for one pending request. Settlement aborts the
    /// task; an expired task only evicts the exact request it was armed
    /// for, so it can never remove a newer request under the same key.
    fn arm_deadline(&self, key: String, settler: Settler<T>) -> tokio::task::JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let wait = self.wait;
        let kind = self.kind;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let expired = pending.remove_if(&key, |_, request| {
                Arc::ptr_eq(&request.settler, &settler)
            });
            if let Some((_, request)) = expired {
                let waited_ms = (Utc::now() - request.opened_at).num_milliseconds();
                warn!(kind, %key, waited_ms, "timed out waiting for response");
                request.settle(Err(CorrelationError::Timeout { key: key.clone() }));
            }
        })
    }

    /// Settle the pending request for `key` with a response.
    ///
    /// A response for a key nobody is waiting on (late arrival, cache warm
    /// push) is a silent no-op. Values with a payload are written through to
    /// the cache best-effort, off the settlement path.
    pub fn resolve(&self, key: &str, value: T) {
        if value.has_payload() {
            if let Some(cache) = &self.cache {
                let cache = Arc::clone(cache);
                let cache_key = key.to_string();
                let cached = value.clone();
                tokio::spawn(async move {
                    if let Err(error) = cache.put(&cache_key, cached).await {
                        warn!(key = %cache_key, %error, "write-through cache update failed");
                    }
                });
            }
        }

        match self.pending.remove(key) {
            Some((_, request)) => {
                request.settle(Ok(value));
                info!(kind = self.kind, %key, "resolved pending request");
            }
            None => debug!(kind = self.kind, %key, "no pending request for response"),
        }
    }

    /// Settle the pending request for `key` with a translated upstream
    /// error. A no-op when nothing is pending.
    pub fn resolve_error(&self, key: &str, cause: impl std::fmt::Display) {
        if let Some((_, request)) = self.pending.remove(key) {
            warn!(kind = self.kind, %key, cause = %cause, "abandoning wait after upstream error");
            request.settle(Err(CorrelationError::Upstream {
                key: key.to_string(),
                message: cause.to_string(),
            }));
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Future handle for one correlated wait.
///
/// Clonable; every clone for the same key settles to the same outcome.
pub struct ResponseFuture<T: Correlated> {
    shared: SharedOutcome<T>,
    first: bool,
}

impl<T: Correlated> ResponseFuture<T> {
    /// Whether this `wait_for` call created the pending entry. The caller
    /// that observes `true` is responsible for publishing the outbound
    /// request.
    pub fn is_first(&self) -> bool {
        self.first
    }
}

impl<T: Correlated> Clone for ResponseFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            first: false,
        }
    }
}

impl<T: Correlated> Future for ResponseFuture<T> {
    type Output = Result<T, CorrelationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().shared.poll_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Correlated for u32 {}

    #[tokio::test]
    async fn test_second_waiter_joins_without_new_entry() {
        let registry: CorrelationRegistry<u32> =
            CorrelationRegistry::new("test", &CorrelationConfig::default());

        let first = registry.wait_for("K");
        let second = registry.wait_for("K");
        assert!(first.is_first());
        assert!(!second.is_first());
        assert_eq!(registry.pending_len(), 1);

        registry.resolve("K", 7);
        assert_eq!(first.await, Ok(7));
        assert_eq!(second.await, Ok(7));
        assert!(!registry.is_pending("K"));
    }

    #[tokio::test]
    async fn test_future_stays_pending_until_resolved() {
        let registry: CorrelationRegistry<u32> =
            CorrelationRegistry::new("test", &CorrelationConfig::default());

        let mut waiter = tokio_test::task::spawn(registry.wait_for("K"));
        tokio_test::assert_pending!(waiter.poll());

        registry.resolve("K", 9);
        assert_eq!(tokio_test::assert_ready!(waiter.poll()), Ok(9));
    }

    #[tokio::test]
    async fn test_clone_of_future_is_not_first() {
        let registry: CorrelationRegistry<u32> =
            CorrelationRegistry::new("test", &CorrelationConfig::default());
        let first = registry.wait_for("K");
        assert!(!first.clone().is_first());
        registry.resolve("K", 1);
    }
}
