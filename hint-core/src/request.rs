//! Outstanding-request bookkeeping for a single node value.
//!
//! Every value a node can take has one [`RequestGroup`] holding all hint
//! types currently asking for that value, each with its own expiration.
//! Expired entries are pruned lazily whenever the nearest deadline is
//! queried, so no timer bookkeeping happens outside the update cycle.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Absolute expiration of a request.
///
/// `Never` is the representation of an indefinite request. It compares later
/// than every finite deadline and absorbs arithmetic that would overflow
/// `Instant`, so `now + timeout` can never wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    At(Instant),
    Never,
}

impl Deadline {
    /// Deadline `timeout` from `now`.
    ///
    /// A zero timeout means the request never expires on its own. A sum that
    /// does not fit the time representation saturates to `Never`.
    pub fn after(now: Instant, timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Deadline::Never;
        }
        match now.checked_add(timeout) {
            Some(at) => Deadline::At(at),
            None => Deadline::Never,
        }
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Deadline::At(at) => *at <= now,
            Deadline::Never => false,
        }
    }

    /// The later of two deadlines.
    pub fn later(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::Never, _) | (_, Deadline::Never) => Deadline::Never,
            (Deadline::At(a), Deadline::At(b)) => Deadline::At(a.max(b)),
        }
    }

    /// The earlier of two deadlines.
    pub fn earlier(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::Never, d) | (d, Deadline::Never) => d,
            (Deadline::At(a), Deadline::At(b)) => Deadline::At(a.min(b)),
        }
    }

    /// Time remaining from `now`, `None` when the deadline never fires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            Deadline::At(at) => Some(at.saturating_duration_since(now)),
            Deadline::Never => None,
        }
    }
}

/// All outstanding requests asking the owning node to take one value.
///
/// Each hint type appears at most once; re-requesting only ever extends the
/// expiration, so a later, shorter request cannot truncate an earlier longer
/// one. Only removal or natural expiration ends a request early.
#[derive(Debug)]
pub struct RequestGroup {
    value: String,
    requests: HashMap<String, Deadline>,
}

impl RequestGroup {
    /// Create an empty group for `value`. The value is fixed for the life of
    /// the group.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            requests: HashMap::new(),
        }
    }

    /// Admit or extend a request.
    ///
    /// Returns true when `hint_type` was not already present. An existing
    /// entry keeps the later of its current deadline and `deadline`.
    pub fn add(&mut self, hint_type: &str, deadline: Deadline) -> bool {
        match self.requests.get_mut(hint_type) {
            Some(current) => {
                *current = current.later(deadline);
                false
            }
            None => {
                self.requests.insert(hint_type.to_owned(), deadline);
                true
            }
        }
    }

    /// Drop the entry for `hint_type`, reporting whether it was present.
    pub fn remove(&mut self, hint_type: &str) -> bool {
        self.requests.remove(hint_type).is_some()
    }

    /// Prune entries expired by `now` and report the nearest surviving
    /// deadline.
    ///
    /// Returns `None` when no request remains active, `Some(Deadline::Never)`
    /// when only indefinite requests survive.
    pub fn active_deadline(&mut self, now: Instant) -> Option<Deadline> {
        self.requests.retain(|_, deadline| !deadline.is_expired(now));
        self.requests
            .values()
            .copied()
            .reduce(Deadline::earlier)
    }

    /// The value this group represents.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Number of outstanding entries, expired ones included until the next
    /// [`active_deadline`](Self::active_deadline) call.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
