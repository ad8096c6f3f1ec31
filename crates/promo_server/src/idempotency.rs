//! Replay cache keyed by client event identifiers.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
struct CachedResponse<R> {
    created_at: DateTime<Utc>,
    response: R,
}

/// Remembers the response produced for each event id for `ttl`.
#[derive(Debug)]
pub struct IdempotencyCache<R> {
    entries: HashMap<String, CachedResponse<R>>,
    ttl: TimeDelta,
}

impl<R: Clone> IdempotencyCache<R> {
    /// Creates an empty cache.
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Runs `compute` at most once per live event id.
    ///
    /// Without an event id `compute` always runs. A cached response is
    /// returned as-is. Errors are not cached, so a retry runs `compute` again.
    #[instrument(skip(self, compute))]
    pub fn with_idempotency<E>(
        &mut self,
        event_id: Option<&str>,
        now: DateTime<Utc>,
        compute: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, E> {
        let Some(event_id) = event_id else {
            return compute();
        };

        if let Some(entry) = self.entries.get(event_id)
            && now - entry.created_at < self.ttl
        {
            debug!("Replaying cached response");
            return Ok(entry.response.clone());
        }

        let response = compute()?;
        self.entries.insert(
            event_id.to_owned(),
            CachedResponse {
                created_at: now,
                response: response.clone(),
            },
        );
        Ok(response)
    }

    /// Deletes entries older than the TTL.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.created_at < ttl);
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
