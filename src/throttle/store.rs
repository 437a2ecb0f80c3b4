//! Per-IP record storage behind a pluggable backend.
//!
//! The throttling components keep one small record per client IP. The
//! [`RecordStore`] trait abstracts the backing map so the in-memory
//! implementation can later be swapped for a shared external store in
//! multi-instance deployments; as shipped, state is process-local and
//! enforcement is per-process only.

use dashmap::DashMap;

/// Backing store for per-IP throttle records.
pub trait RecordStore<V: Clone + Send + Sync>: Send + Sync {
    /// Fetch a copy of the record for `ip`, if one exists.
    fn get(&self, ip: &str) -> Option<V>;

    /// Insert or replace the record for `ip`.
    fn set(&self, ip: &str, value: V);

    /// Remove the record for `ip`.
    fn remove(&self, ip: &str);

    /// Atomically read-modify-write the record for `ip`. The closure
    /// receives the current record (if any) and returns the replacement;
    /// `None` removes the entry. No other access to `ip` interleaves with
    /// the closure.
    fn update(&self, ip: &str, apply: &mut dyn FnMut(Option<&V>) -> Option<V>);

    /// Keep only the records for which `keep` returns `true`.
    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool);

    /// Number of records currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store backed by a concurrent hash map.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> RecordStore<V> for MemoryStore<V> {
    fn get(&self, ip: &str) -> Option<V> {
        self.entries.get(ip).map(|entry| entry.value().clone())
    }

    fn set(&self, ip: &str, value: V) {
        self.entries.insert(ip.to_string(), value);
    }

    fn remove(&self, ip: &str) {
        self.entries.remove(ip);
    }

    fn update(&self, ip: &str, apply: &mut dyn FnMut(Option<&V>) -> Option<V>) {
        // The entry API holds the shard lock for the duration of the
        // closure, which gives callers their atomic read-and-increment.
        match self.entries.entry(ip.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                match apply(Some(occupied.get())) {
                    Some(next) => {
                        occupied.insert(next);
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                if let Some(next) = apply(None) {
                    vacant.insert(next);
                }
            }
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) {
        self.entries.retain(|ip, value| keep(ip, value));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
