use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use uuid::Uuid;

use super::snapshot::ContextSnapshot;

/// Append-only, size-bounded log of observed snapshots. Oldest evicted first.
#[derive(Debug)]
pub struct ContextStore {
    entries: VecDeque<ContextSnapshot>,
    ids: HashSet<Uuid>,
    capacity: usize,
}

impl ContextStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends unless a snapshot with the same id is already retained.
    pub fn append(&mut self, snapshot: ContextSnapshot) -> bool {
        if self.ids.contains(&snapshot.id) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
        self.ids.insert(snapshot.id);
        self.entries.push_back(snapshot);
        true
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&ContextSnapshot> {
        self.entries.back()
    }

    /// The latest snapshot plus up to `k` before it, oldest first.
    pub fn window(&self, k: usize) -> Vec<ContextSnapshot> {
        let skip = self.entries.len().saturating_sub(k + 1);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ContextSnapshot> {
        self.entries.iter()
    }

    /// Apps the user moved to right after `app` (normalized), most frequent first.
    /// Only real switches count; staying in the same app is not a transition.
    pub fn transitions_from(&self, app: &str) -> Vec<(String, u32)> {
        let mut counts: HashMap<String, (String, u32)> = HashMap::new();
        let mut previous: Option<String> = None;

        for snapshot in &self.entries {
            let current = snapshot.normalized_app();
            if let Some(prev) = previous.as_deref() {
                if prev == app && current != prev && !current.is_empty() {
                    counts
                        .entry(current.clone())
                        .or_insert_with(|| (snapshot.app_name(), 0))
                        .1 += 1;
                }
            }
            previous = Some(current);
        }

        let mut ranked: Vec<(String, u32)> = counts.into_values().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Files seen while `app` (normalized) was focused, most frequent first.
    pub fn frequent_files_with_app(&self, app: &str) -> Vec<(PathBuf, u32)> {
        let mut counts: HashMap<&PathBuf, u32> = HashMap::new();
        for snapshot in self.entries.iter().filter(|s| s.normalized_app() == app) {
            for file in &snapshot.recent_files {
                *counts.entry(file).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(PathBuf, u32)> =
            counts.into_iter().map(|(p, c)| (p.clone(), c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: i64, class: &str) -> ContextSnapshot {
        ContextSnapshot::builder(ts).class(class).build()
    }

    #[test]
    fn fifo_eviction_and_dedupe() {
        let mut store = ContextStore::new(2);
        let a = snap(1, "a");
        let b = snap(2, "b");
        let c = snap(3, "c");

        assert!(store.append(a.clone()));
        assert!(!store.append(a.clone()));
        assert!(store.append(b));
        assert!(store.append(c.clone()));

        assert_eq!(store.len(), 2);
        assert!(!store.contains(&a.id));
        assert_eq!(store.latest().map(|s| s.id), Some(c.id));
    }

    #[test]
    fn window_is_oldest_first() {
        let mut store = ContextStore::new(10);
        for ts in 0..5 {
            store.append(snap(ts, "x"));
        }
        let window: Vec<i64> = store.window(2).iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(window, vec![2, 3, 4]);
        assert_eq!(store.window(50).len(), 5);
    }

    #[test]
    fn transitions_count_switches_only() {
        let mut store = ContextStore::new(32);
        for (i, app) in ["Code", "Code", "Firefox", "Code", "Firefox", "Code", "Slack"]
            .iter()
            .enumerate()
        {
            store.append(snap(i as i64, app));
        }
        let ranked = store.transitions_from("code");
        assert_eq!(ranked[0], ("Firefox".to_string(), 2));
        assert_eq!(ranked[1], ("Slack".to_string(), 1));
    }
}
