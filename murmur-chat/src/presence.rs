//! Presence registry: who is connected right now.
//!
//! ## Update rules
//!
//! ```text
//! roster snapshot ──► apply_roster_snapshot()   (replace everything)
//! join event      ──► join()                    (insert / replace one)
//! leave event     ──► leave()                   (remove one)
//! ```
//!
//! There is no liveness tracking: an entry only disappears when a fresh
//! snapshot omits it or a leave event names it.

use std::collections::HashMap;

use crate::protocol::{Identity, PresenceEntry};
use crate::ui::RosterView;

/// Connected participants keyed by identity, in roster order.
#[derive(Debug, Clone, Default)]
pub struct PresenceRegistry {
    /// Entries in display order
    entries: Vec<PresenceEntry>,
    /// identity → position in `entries`
    index: HashMap<Identity, usize>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster.
    ///
    /// The new set is built aside and swapped in, so readers never see a
    /// mix of old and new entries. A repeated identity keeps its last entry.
    pub fn apply_roster_snapshot(&mut self, snapshot: Vec<PresenceEntry>) {
        let mut entries: Vec<PresenceEntry> = Vec::with_capacity(snapshot.len());
        let mut index = HashMap::with_capacity(snapshot.len());

        for entry in snapshot {
            match index.get(&entry.identity) {
                Some(&pos) => entries[pos] = entry,
                None => {
                    index.insert(entry.identity.clone(), entries.len());
                    entries.push(entry);
                }
            }
        }

        self.entries = entries;
        self.index = index;
    }

    /// Add a participant, or refresh its connection id.
    pub fn join(&mut self, entry: PresenceEntry) {
        match self.index.get(&entry.identity) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(entry.identity.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Remove a participant. Returns the removed entry, if any.
    pub fn leave(&mut self, identity: &Identity) -> Option<PresenceEntry> {
        let pos = self.index.remove(identity)?;
        let removed = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Display rows with `me` labelled as the local user. Does not mutate.
    pub fn mark_self(&self, me: Option<&Identity>) -> Vec<RosterView> {
        self.entries
            .iter()
            .map(|entry| RosterView::new(entry, me))
            .collect()
    }

    /// Get all entries in roster order.
    pub fn entries(&self) -> &[PresenceEntry] {
        &self.entries
    }

    /// Get the entry for `identity`.
    pub fn get(&self, identity: &Identity) -> Option<&PresenceEntry> {
        self.index.get(identity).map(|&pos| &self.entries[pos])
    }

    /// Whether `identity` is online.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    /// Identities in roster order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.iter().map(|e| &e.identity)
    }

    /// Number of connected participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
