//! TTL cache with in-flight coalescing.
//!
//! The orchestrator status query is expensive (a subprocess), so reads
//! go through this cache: a fresh entry is cloned out immediately, and
//! when a refresh is due the first caller becomes the leader and runs
//! the query while every concurrent caller awaits the same result. At
//! most one external call is outstanding at a time.
//!
//! Failure semantics: on refresh failure the previous value is served
//! when one exists (last-known-good) but its timestamp is NOT renewed,
//! so the next caller retries. With no previous value the error
//! propagates.

use metrics::counter;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use tracing::warn;

use crate::error::BridgeError;

struct Entry<T> {
    value: T,
    captured_at: Instant,
}

/// Result forwarded from the leader to waiting followers. Errors travel
/// as strings because [`BridgeError`] is not `Clone`.
type Shared<T> = Option<Result<T, String>>;

struct State<T> {
    entry: Option<Entry<T>>,
    inflight: Option<watch::Receiver<Shared<T>>>,
}

/// TTL + single-flight cache for one expensive value.
pub struct StatusCache<T: Clone> {
    ttl: Duration,
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + Sync> StatusCache<T> {
    /// Create a cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(State {
                entry: None,
                inflight: None,
            }),
        }
    }

    /// Return the cached value, refreshing it through `refresh` when
    /// stale. Concurrent callers coalesce onto one refresh.
    pub async fn fetch<F, Fut>(&self, refresh: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        enum Role<T> {
            Leader(watch::Sender<Shared<T>>),
            Follower(watch::Receiver<Shared<T>>),
        }

        let role = {
            let mut state = self.state.lock().await;
            if let Some(entry) = &state.entry
                && entry.captured_at.elapsed() < self.ttl
            {
                counter!("status_cache_hits_total").increment(1);
                return Ok(entry.value.clone());
            }
            counter!("status_cache_misses_total").increment(1);
            if let Some(rx) = &state.inflight {
                Role::Follower(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                state.inflight = Some(rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Leader(tx) => {
                let result = refresh().await;
                let mut state = self.state.lock().await;
                state.inflight = None;
                match result {
                    Ok(value) => {
                        state.entry = Some(Entry {
                            value: value.clone(),
                            captured_at: Instant::now(),
                        });
                        let _ = tx.send(Some(Ok(value.clone())));
                        Ok(value)
                    }
                    Err(error) => {
                        let _ = tx.send(Some(Err(error.to_string())));
                        // Stale entry kept un-stamped so the next caller
                        // retries the refresh.
                        if let Some(entry) = &state.entry {
                            warn!(%error, "status refresh failed, serving last known good");
                            counter!("status_cache_stale_served_total").increment(1);
                            Ok(entry.value.clone())
                        } else {
                            Err(error)
                        }
                    }
                }
            }
            Role::Follower(mut rx) => {
                loop {
                    // Clone out before awaiting: the watch guard must not
                    // live across a suspension point.
                    let current = rx.borrow().clone();
                    if let Some(result) = current {
                        return match result {
                            Ok(value) => Ok(value),
                            Err(message) => {
                                let state = self.state.lock().await;
                                match &state.entry {
                                    Some(entry) => Ok(entry.value.clone()),
                                    None => Err(BridgeError::Unavailable(message)),
                                }
                            }
                        };
                    }
                    if rx.changed().await.is_err() {
                        // Leader dropped without sending; treat as failure.
                        return Err(BridgeError::Unavailable("refresh abandoned".into()));
                    }
                }
            }
        }
    }
}
