//! Generation-checked storage for one resource kind.

use slotmap::{Key, SlotMap};

use crate::error::{GraphicsError, GraphicsResult};

/// Whether a pool entry may still be used by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liveness {
    Live,
    /// Marked for destruction; waiting for its last use to retire.
    Disposing,
}

/// Result of marking a handle for disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkOutcome {
    Marked,
    AlreadyDisposing,
    /// The handle does not name an entry (reclaimed, or never issued).
    Stale,
}

#[derive(Debug)]
struct Entry<R> {
    record: R,
    liveness: Liveness,
    last_use: u64,
}

/// Storage for one kind of resource, keyed by `slotmap` handles.
///
/// Removing an entry bumps its slot's generation, so a reclaimed handle can
/// never resolve to a later resource that reuses the slot. Slots are only
/// freed by [`Pool::reclaim`], never while an entry is disposing.
#[derive(Debug)]
pub struct Pool<K: Key, R> {
    kind: &'static str,
    entries: SlotMap<K, Entry<R>>,
    disposing: usize,
}

impl<K: Key, R> Pool<K, R> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: SlotMap::with_key(),
            disposing: 0,
        }
    }

    /// Register a live record.
    pub fn insert(&mut self, record: R) -> K {
        self.entries.insert(Entry {
            record,
            liveness: Liveness::Live,
            last_use: 0,
        })
    }

    fn entry(&self, key: K) -> GraphicsResult<&Entry<R>> {
        match self.entries.get(key) {
            Some(entry) if entry.liveness == Liveness::Live => Ok(entry),
            Some(_) => Err(GraphicsError::PreconditionViolation(format!(
                "{} {:?} used after dispose",
                self.kind, key
            ))),
            None => Err(GraphicsError::PreconditionViolation(format!(
                "{} {:?} is not a valid handle",
                self.kind, key
            ))),
        }
    }

    /// The record behind a live handle.
    pub fn get(&self, key: K) -> GraphicsResult<&R> {
        self.entry(key).map(|e| &e.record)
    }

    pub fn get_mut(&mut self, key: K) -> GraphicsResult<&mut R> {
        self.entry(key)?;
        self.entries
            .get_mut(key)
            .map(|e| &mut e.record)
            .ok_or_else(|| GraphicsError::PreconditionViolation(format!("{} {:?}", self.kind, key)))
    }

    /// Returns true if `key` names a live entry.
    pub fn is_live(&self, key: K) -> bool {
        self.entry(key).is_ok()
    }

    /// Record that a command in frame `serial` references the entry.
    pub fn touch(&mut self, key: K, serial: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_use = entry.last_use.max(serial);
        }
    }

    /// Serial of the newest frame that referenced the entry.
    pub fn last_use(&self, key: K) -> Option<u64> {
        self.entries.get(key).map(|e| e.last_use)
    }

    /// Mark a live entry for deferred destruction.
    pub fn mark_disposing(&mut self, key: K) -> MarkOutcome {
        match self.entries.get_mut(key) {
            Some(entry) if entry.liveness == Liveness::Live => {
                entry.liveness = Liveness::Disposing;
                self.disposing += 1;
                MarkOutcome::Marked
            }
            Some(_) => MarkOutcome::AlreadyDisposing,
            None => MarkOutcome::Stale,
        }
    }

    /// Remove every disposing entry whose last use is at or before
    /// `completed`, handing each record to `destroy`. Returns how many were
    /// removed.
    pub fn reclaim(&mut self, completed: u64, mut destroy: impl FnMut(K, R)) -> usize {
        if self.disposing == 0 {
            return 0;
        }
        let ready: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.liveness == Liveness::Disposing && e.last_use <= completed)
            .map(|(k, _)| k)
            .collect();
        for key in &ready {
            if let Some(entry) = self.entries.remove(*key) {
                destroy(*key, entry.record);
            }
        }
        self.disposing -= ready.len();
        ready.len()
    }

    /// Remove every entry regardless of state.
    pub fn drain_all(&mut self, mut destroy: impl FnMut(K, R)) -> usize {
        let count = self.entries.len();
        for (key, entry) in self.entries.drain() {
            destroy(key, entry.record);
        }
        self.disposing = 0;
        count
    }

    pub fn live_count(&self) -> usize {
        self.entries.len() - self.disposing
    }

    pub fn disposing_count(&self) -> usize {
        self.disposing
    }

    /// Live records with their handles.
    pub fn iter_live(&self) -> impl Iterator<Item = (K, &R)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.liveness == Liveness::Live)
            .map(|(k, e)| (k, &e.record))
    }

    pub fn iter_live_mut(&mut self) -> impl Iterator<Item = (K, &mut R)> {
        self.entries
            .iter_mut()
            .filter(|(_, e)| e.liveness == Liveness::Live)
            .map(|(k, e)| (k, &mut e.record))
    }
}
