//! In-memory queue store
//!
//! Single-process implementation of [`QueueStore`]. Key expiry follows the
//! injected [`Clock`], so tests can age entries without sleeping. It can also
//! be switched "offline" to exercise infrastructure failure paths.

use crate::error::{MatchmakingError, Result};
use crate::queue::clock::{Clock, SystemClock};
use crate::store::provider::{resolve_rank_range, QueueStore, StoreBatch, StoreOp};
use crate::types::TimestampMs;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct Ranked {
    score: i64,
    seq: u64,
}

#[derive(Debug, Default)]
struct OrderedSet {
    members: HashMap<String, Ranked>,
}

impl OrderedSet {
    fn sorted(&self) -> Vec<(&String, &Ranked)> {
        let mut entries: Vec<_> = self.members.iter().collect();
        entries.sort_by(|(_, a), (_, b)| a.score.cmp(&b.score).then(a.seq.cmp(&b.seq)));
        entries
    }
}

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Option<TimestampMs>,
}

#[derive(Debug, Default)]
struct StoreState {
    sets: HashMap<String, OrderedSet>,
    values: HashMap<String, StoredValue>,
    next_seq: u64,
}

impl StoreState {
    fn apply(&mut self, op: StoreOp, now: TimestampMs) -> usize {
        match op {
            StoreOp::OrderedInsert { key, score, member } => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.sets
                    .entry(key)
                    .or_default()
                    .members
                    .insert(member, Ranked { score, seq });
                1
            }
            StoreOp::OrderedRemove { key, members } => {
                let Some(set) = self.sets.get_mut(&key) else {
                    return 0;
                };
                let removed = members
                    .iter()
                    .filter(|member| set.members.remove(*member).is_some())
                    .count();
                if set.members.is_empty() {
                    self.sets.remove(&key);
                }
                removed
            }
            StoreOp::PutWithExpiry { key, value, ttl } => {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                self.values.insert(
                    key,
                    StoredValue {
                        value,
                        expires_at: Some(now.saturating_add(ttl_ms)),
                    },
                );
                1
            }
            StoreOp::Delete { key } => usize::from(self.values.remove(&key).is_some()),
        }
    }

    /// Drop values whose expiry has passed
    fn purge_expired(&mut self, now: TimestampMs) -> usize {
        let before = self.values.len();
        self.values
            .retain(|_, stored| stored.expires_at.map_or(true, |at| now < at));
        before - self.values.len()
    }

    fn get(&self, key: &str, now: TimestampMs) -> Option<String> {
        self.values
            .get(key)
            .filter(|stored| stored.expires_at.map_or(true, |at| now < at))
            .map(|stored| stored.value.clone())
    }
}

/// Queue store kept in process memory
pub struct MemoryQueueStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
    online: AtomicBool,
    mutations: AtomicU64,
}

impl MemoryQueueStore {
    /// Create a store driven by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose key expiry follows `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock,
            online: AtomicBool::new(true),
            mutations: AtomicU64::new(0),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of write operations applied so far
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Score of a member, if present (for testing)
    pub fn score_of(&self, key: &str, member: &str) -> Option<i64> {
        let state = self.state.read().ok()?;
        state
            .sets
            .get(key)
            .and_then(|set| set.members.get(member))
            .map(|ranked| ranked.score)
    }

    /// All members of an ordered set in rank order (for testing)
    pub fn members(&self, key: &str) -> Vec<String> {
        self.state
            .read()
            .map(|state| {
                state
                    .sets
                    .get(key)
                    .map(|set| set.sorted().into_iter().map(|(m, _)| m.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of values held, expired or not (for testing)
    pub fn value_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.values.len())
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MatchmakingError::Infrastructure {
                message: "in-memory store is offline".to_string(),
            }
            .into())
        }
    }

    fn apply_ops(&self, ops: Vec<StoreOp>) -> Result<usize> {
        self.ensure_online()?;
        let now = self.clock.now_ms();
        let mut state = self
            .state
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;

        let count = ops.len() as u64;
        let affected = ops.into_iter().map(|op| state.apply(op, now)).sum();
        self.mutations.fetch_add(count, Ordering::SeqCst);

        let purged = state.purge_expired(now);
        if purged > 0 {
            debug!("Purged {} expired values from in-memory store", purged);
        }
        Ok(affected)
    }

    fn read_state<T>(&self, read: impl FnOnce(&StoreState, TimestampMs) -> T) -> Result<T> {
        self.ensure_online()?;
        let now = self.clock.now_ms();
        let state = self
            .state
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;
        Ok(read(&state, now))
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<()> {
        self.apply_ops(vec![StoreOp::OrderedInsert {
            key: key.to_string(),
            score,
            member: member.to_string(),
        }])?;
        Ok(())
    }

    async fn ordered_remove(&self, key: &str, members: &[String]) -> Result<usize> {
        self.apply_ops(vec![StoreOp::OrderedRemove {
            key: key.to_string(),
            members: members.to_vec(),
        }])
    }

    async fn ordered_range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        self.read_state(|state, _| {
            let Some(set) = state.sets.get(key) else {
                return Vec::new();
            };
            let sorted = set.sorted();
            match resolve_rank_range(sorted.len(), start, stop) {
                Some((from, to)) => sorted[from..=to]
                    .iter()
                    .map(|(member, _)| (*member).clone())
                    .collect(),
                None => Vec::new(),
            }
        })
    }

    async fn ordered_count(&self, key: &str) -> Result<u64> {
        self.read_state(|state, _| {
            state
                .sets
                .get(key)
                .map_or(0, |set| set.members.len() as u64)
        })
    }

    async fn put_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.apply_ops(vec![StoreOp::PutWithExpiry {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        }])?;
        Ok(())
    }

    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        self.read_state(|state, now| keys.iter().map(|key| state.get(key, now)).collect())
    }

    async fn execute(&self, batch: StoreBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.apply_ops(batch.into_ops())?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_online()
    }
}
