//! Queue store interface
//!
//! The coordinator keeps no state of its own. Everything it knows about the
//! waiting pool lives behind [`QueueStore`], which models the small subset of
//! a shared key-value store the matchmaking flow relies on: a score-ordered
//! set, expiring string values and batched writes.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A single write inside a [`StoreBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Upsert `member` into the ordered set at `key` with `score`
    OrderedInsert {
        key: String,
        score: i64,
        member: String,
    },
    /// Remove `members` from the ordered set at `key`
    OrderedRemove { key: String, members: Vec<String> },
    /// Set `key` to `value`, expiring after `ttl`
    PutWithExpiry {
        key: String,
        value: String,
        ttl: Duration,
    },
    /// Delete `key`
    Delete { key: String },
}

/// Writes grouped for single round-trip execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBatch {
    ops: Vec<StoreOp>,
}

impl StoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered_insert(mut self, key: &str, score: i64, member: &str) -> Self {
        self.ops.push(StoreOp::OrderedInsert {
            key: key.to_string(),
            score,
            member: member.to_string(),
        });
        self
    }

    pub fn ordered_remove(mut self, key: &str, members: Vec<String>) -> Self {
        self.ops.push(StoreOp::OrderedRemove {
            key: key.to_string(),
            members,
        });
        self
    }

    pub fn put_with_expiry(mut self, key: &str, value: String, ttl: Duration) -> Self {
        self.ops.push(StoreOp::PutWithExpiry {
            key: key.to_string(),
            value,
            ttl,
        });
        self
    }

    pub fn delete(mut self, key: &str) -> Self {
        self.ops.push(StoreOp::Delete {
            key: key.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<StoreOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Trait for the shared store holding the waiting pool
///
/// Implementations report unreachable backends as
/// [`MatchmakingError::Infrastructure`](crate::error::MatchmakingError::Infrastructure).
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Upsert a member into an ordered set
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<()>;

    /// Remove members from an ordered set, returning how many were present
    async fn ordered_remove(&self, key: &str, members: &[String]) -> Result<usize>;

    /// Members ranked `start..=stop` by ascending score; negative indices count from the end
    async fn ordered_range_by_rank(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>>;

    /// Number of members in an ordered set
    async fn ordered_count(&self, key: &str) -> Result<u64>;

    /// Store a value that expires after `ttl`
    async fn put_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Fetch several values, one slot per key in request order
    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Execute a batch of writes in one round trip
    async fn execute(&self, batch: StoreBatch) -> Result<()>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()>;
}

/// Resolve Redis-style rank bounds against a set of `len` members.
///
/// Returns `None` when the range selects nothing.
pub fn resolve_rank_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder_preserves_order() {
        let batch = StoreBatch::new()
            .ordered_remove("pool", vec!["a".to_string()])
            .delete("meta:a")
            .ordered_insert("pool", 10, "a")
            .put_with_expiry("meta:a", "{}".to_string(), Duration::from_secs(300));

        assert_eq!(batch.len(), 4);
        assert!(matches!(batch.ops()[0], StoreOp::OrderedRemove { .. }));
        assert!(matches!(batch.ops()[1], StoreOp::Delete { .. }));
        assert!(matches!(batch.ops()[2], StoreOp::OrderedInsert { score: 10, .. }));
        assert!(matches!(batch.ops()[3], StoreOp::PutWithExpiry { .. }));
        assert!(StoreBatch::new().is_empty());
    }

    #[test]
    fn test_resolve_rank_range() {
        assert_eq!(resolve_rank_range(0, 0, 1), None);
        assert_eq!(resolve_rank_range(1, 0, 1), Some((0, 0)));
        assert_eq!(resolve_rank_range(5, 0, 1), Some((0, 1)));
        assert_eq!(resolve_rank_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_rank_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_rank_range(5, 3, 1), None);
        assert_eq!(resolve_rank_range(5, 7, 9), None);
    }
}
