//! Bounded idempotency key set with FIFO batch-trim eviction.
//!
//! Admitted keys are kept in insertion order. When an admission pushes the
//! set past its capacity, the oldest `evict_batch` keys are dropped in a
//! single compaction. Lookups never refresh an entry: this is admission
//! control, not a recency cache.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ErrorValue, Result};

/// Default ceiling on the number of retained keys.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default number of oldest keys dropped per compaction.
pub const DEFAULT_EVICT_BATCH: usize = 500;

/// Composite key identifying one emitted response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    method: String,
    path: String,
    request_id: String,
}

impl IdempotencyKey {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            request_id: request_id.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.method, self.path, self.request_id)
    }
}

/// Size limits for an [`IdempotencyKeySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetConfig {
    /// Hard ceiling on retained keys
    pub capacity: usize,
    /// Oldest keys removed when the ceiling is exceeded
    pub evict_batch: usize,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            evict_batch: DEFAULT_EVICT_BATCH,
        }
    }
}

impl KeySetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ErrorValue::bad_request("Key set capacity must be positive"));
        }
        if self.evict_batch == 0 || self.evict_batch > self.capacity {
            return Err(ErrorValue::bad_request(format!(
                "Eviction batch must be between 1 and {} (got {})",
                self.capacity, self.evict_batch
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Entries {
    members: HashSet<IdempotencyKey>,
    order: VecDeque<IdempotencyKey>,
}

/// Process-wide set of admitted idempotency keys.
///
/// Shared behind an `Arc`; all mutation happens under one lock so that
/// admit-and-evict is a single atomic step.
pub struct IdempotencyKeySet {
    entries: Mutex<Entries>,
    config: KeySetConfig,
}

impl Default for IdempotencyKeySet {
    fn default() -> Self {
        Self {
            entries: Mutex::default(),
            config: KeySetConfig::default(),
        }
    }
}

impl IdempotencyKeySet {
    /// Create an empty set with default limits (1000 / 500).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with custom limits.
    pub fn with_config(config: KeySetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: Mutex::default(),
            config,
        })
    }

    // The critical sections below never leave `members` and `order` out of
    // step, so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        self.lock().members.contains(key)
    }

    /// Admit `key`, returning `false` if it was already present.
    ///
    /// On overflow the oldest `evict_batch` keys are removed before the lock
    /// is released, so no caller ever observes more than `capacity` keys.
    pub fn admit(&self, key: IdempotencyKey) -> bool {
        let mut entries = self.lock();
        if entries.members.contains(&key) {
            return false;
        }
        entries.members.insert(key.clone());
        entries.order.push_back(key);

        if entries.order.len() > self.config.capacity {
            let batch = self.config.evict_batch.min(entries.order.len());
            let Entries { members, order } = &mut *entries;
            for evicted in order.drain(..batch) {
                members.remove(&evicted);
            }
            tracing::debug!(
                evicted = batch,
                retained = order.len(),
                "Compacted idempotency key set"
            );
        }
        true
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn evict_batch(&self) -> usize {
        self.config.evict_batch
    }
}

impl fmt::Debug for IdempotencyKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyKeySet")
            .field("len", &self.len())
            .field("capacity", &self.config.capacity)
            .field("evict_batch", &self.config.evict_batch)
            .finish()
    }
}
