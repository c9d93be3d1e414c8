use std::{future::Future, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

/// A lazily computed value that is cached for `max_age`.
///
/// Nothing is computed at construction; the first [`ExpiringValue::value`] call does it, and later calls reuse the cached copy until it expires.
/// Refreshes are serialised: concurrent callers wait for the one in progress and then see its result.
///
/// Every successful refresh bumps a generation number, so a caller that found a value stale can ask for a refresh
/// that only happens if nobody else refreshed in the meantime ([`ExpiringValue::refresh_after`]).
#[derive(Debug)]
pub struct ExpiringValue<T> {
    max_age: Duration,
    slot: Mutex<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    cached: Option<(T, Instant)>,
    generation: u64,
}

impl<T: Clone> ExpiringValue<T> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            slot: Mutex::new(Slot {
                cached: None,
                generation: 0,
            }),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Return the cached value, or compute it with `refresh_fn` when missing, expired or `refresh` is set.
    ///
    /// A failed refresh leaves the previous value in place (it may still be used by a caller that does not force a refresh and finds it unexpired).
    pub async fn value<F, Fut, E>(&self, refresh: bool, refresh_fn: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.load(|_| refresh, refresh_fn).await.map(|(value, _)| value)
    }

    /// Like [`ExpiringValue::value`] without forcing, also returning the generation the value belongs to.
    pub async fn stamped<F, Fut, E>(&self, refresh_fn: F) -> Result<(T, u64), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.load(|_| false, refresh_fn).await
    }

    /// Refresh only if the cached value is still the one from generation `seen`.
    ///
    /// When another caller already replaced it, the newer value is returned without running `refresh_fn`.
    pub async fn refresh_after<F, Fut, E>(&self, seen: u64, refresh_fn: F) -> Result<(T, u64), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.load(|generation| generation == seen, refresh_fn).await
    }

    async fn load<S, F, Fut, E>(&self, discard: S, refresh_fn: F) -> Result<(T, u64), E>
    where
        S: FnOnce(u64) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if !discard(slot.generation)
            && let Some((value, expiry)) = slot.cached.as_ref()
            && Instant::now() < *expiry
        {
            debug!(generation = slot.generation, "loading value from cache");
            return Ok((value.clone(), slot.generation));
        }

        let value = refresh_fn().await?;
        slot.cached = Some((value.clone(), Instant::now() + self.max_age));
        slot.generation += 1;
        debug!(
            generation = slot.generation,
            max_age_ms = self.max_age.as_millis() as u64,
            "refreshed value"
        );
        Ok((value, slot.generation))
    }

    /// Drop the cached value; the next call recomputes it.
    pub async fn invalidate(&self) {
        self.slot.lock().await.cached = None;
    }

    pub async fn is_expired(&self) -> bool {
        match self.slot.lock().await.cached.as_ref() {
            Some((_, expiry)) => Instant::now() >= *expiry,
            None => true,
        }
    }
}
