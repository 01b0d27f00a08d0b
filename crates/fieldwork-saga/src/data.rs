use indexmap::IndexMap;

/// Named values flowing into and out of tasks.
///
/// Keeps insertion order so logs and summaries list keys the way tasks
/// produced them. Every task instance and collection owns its own map.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskData<V> {
    entries: IndexMap<&'static str, V>,
}

impl<V> Default for TaskData<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> TaskData<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: V) -> Self {
        self.entries.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &'static str, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Remove a value, marking the effect that produced it as undone.
    pub fn release(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// First key of `keys` with no value, if any.
    #[must_use]
    pub fn first_missing(&self, keys: &[&'static str]) -> Option<&'static str> {
        keys.iter().copied().find(|key| !self.contains(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &V)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> TaskData<V> {
    /// Overwrite entries with those of `other`.
    pub fn merge(&mut self, other: &TaskData<V>) {
        for (key, value) in &other.entries {
            self.entries.insert(*key, value.clone());
        }
    }
}

impl<V> FromIterator<(&'static str, V)> for TaskData<V> {
    fn from_iter<I: IntoIterator<Item = (&'static str, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
