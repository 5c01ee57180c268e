//! Optional memoisation of recomputed balances.
//!
//! Balances are always derivable from history; this cache only saves the
//! recomputation. Entries are tagged with the group's write revision (any
//! monotonically increasing counter the repository bumps on every expense or
//! settlement write), and a revision mismatch always recomputes.

use std::collections::HashMap;
use std::sync::RwLock;

use splitledger_core::GroupId;

use crate::balances::NetBalances;

#[derive(Debug, Clone)]
struct CachedBalances {
    revision: u64,
    balances: NetBalances,
}

/// Per-group balance cache. `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct BalanceCache {
    entries: RwLock<HashMap<GroupId, CachedBalances>>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return balances for `group` at `revision`, computing them if the cached
    /// entry is missing or stale.
    pub fn get_or_compute(
        &self,
        group: GroupId,
        revision: u64,
        compute: impl FnOnce() -> NetBalances,
    ) -> NetBalances {
        if let Ok(entries) = self.entries.read() {
            if let Some(cached) = entries.get(&group) {
                if cached.revision == revision {
                    tracing::debug!(%group, revision, "balance cache hit");
                    return cached.balances.clone();
                }
            }
        }

        let balances = compute();
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                group,
                CachedBalances {
                    revision,
                    balances: balances.clone(),
                },
            );
        }
        balances
    }

    /// Drop the cached entry for `group`; call on every write.
    pub fn invalidate(&self, group: GroupId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&group);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use splitledger_core::{Money, UserId};

    fn sample() -> NetBalances {
        let (a, b) = (UserId::new(), UserId::new());
        [(a, Money::from_cents(10)), (b, Money::from_cents(-10))]
            .into_iter()
            .collect()
    }

    #[test]
    fn same_revision_is_served_from_cache() {
        let cache = BalanceCache::new();
        let group = GroupId::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            sample()
        };

        let first = cache.get_or_compute(group, 1, compute);
        let second = cache.get_or_compute(group, 1, || unreachable!("should be cached"));
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn new_revision_or_invalidation_recomputes() {
        let cache = BalanceCache::new();
        let group = GroupId::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            NetBalances::new()
        };

        cache.get_or_compute(group, 1, compute);
        cache.get_or_compute(group, 2, compute);
        cache.invalidate(group);
        cache.get_or_compute(group, 2, compute);
        assert_eq!(calls.get(), 3);
    }
}
