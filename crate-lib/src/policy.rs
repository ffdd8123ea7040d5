use std::cmp::Ordering;

use crate::{
    config::Budget,
    error::ArchiveError,
    scan::{Entry, Snapshot, Usage},
};

impl Budget {
    /// Check if admitting a file of `incoming_len` bytes would break the budget
    ///
    /// The byte check is `usage.bytes + incoming_len >= max_bytes`: landing exactly on the
    /// ceiling still counts as exceeded. The count check is `usage.entries + 1 > max_count`,
    /// the `+ 1` standing for the incoming file.
    pub fn is_exceeded(&self, usage: Usage, incoming_len: u64) -> bool {
        usage.entries.saturating_add(1) > self.max_count
            || usage.bytes.saturating_add(incoming_len) >= self.max_bytes
    }
}

/// Order entries from the most to the least evictable
///
/// Oldest modification time first, ties broken by name.
pub fn eviction_order(a: &Entry, b: &Entry) -> Ordering {
    a.modified
        .cmp(&b.modified)
        .then_with(|| a.name.cmp(&b.name))
}

/// Pick the entry to evict next, if any
pub fn pick_victim(entries: &[Entry]) -> Option<&Entry> {
    entries.iter().min_by(|a, b| eviction_order(a, b))
}

/// Simulate the eviction loop on a single snapshot
///
/// Returns the entries that would be evicted, in eviction order.
pub fn plan_evictions(
    budget: &Budget,
    snapshot: &Snapshot,
    incoming_len: u64,
) -> Result<Vec<Entry>, ArchiveError> {
    let mut candidates = snapshot.entries.clone();
    candidates.sort_by(eviction_order);

    let mut candidates = candidates.into_iter();
    let mut usage = snapshot.usage;
    let mut evicted = vec![];

    while budget.is_exceeded(usage, incoming_len) {
        let Some(victim) = candidates.next() else {
            return Err(ArchiveError::EmptyArchiveExhausted {
                incoming_len,
                usage,
                budget: *budget,
                evicted: vec![],
            });
        };

        usage.entries = usage.entries.saturating_sub(1);
        usage.bytes = usage.bytes.saturating_sub(victim.len);

        evicted.push(victim);
    }

    Ok(evicted)
}
