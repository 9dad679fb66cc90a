//! Insertion-ordered keyed storage for tools, resources and templates.

use std::collections::HashMap;

use tracing::warn;

/// Key-unique map that lists entries in first-registration order.
///
/// Re-registering a key replaces the entry in place and reports the overwrite.
#[derive(Debug)]
pub struct Registry<V> {
    kind: &'static str,
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Registry<V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns true when an existing entry was overwritten.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        if let Some(&position) = self.index.get(&key) {
            warn!(kind = self.kind, key = %key, "registry entry is being redefined");
            self.entries[position].1 = value;
            return true;
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        false
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get(position))
            .map(|(_, value)| value)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
